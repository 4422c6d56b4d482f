use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{ReportError, Result};
use crate::form::{FormSubmission, Market, NormalizedScores, Workstyle};
use crate::scoring::{DerivedProfile, DominantSkillSet};

pub const SYSTEM_INSTRUCTION_VERSION: &str = "imagineer-v2";

const SYSTEM_INSTRUCTION: &str = r#"You are "The Persuasion Imagineer"—a strategic advisor that converts a person's skills, interests, and constraints into realistic, high-leverage market opportunities. Your outputs must be specific, feasible, and action-oriented. You are confident, warm, conversational, and direct. You avoid vague pep-talks and hype.

OBJECTIVE:
Given the user's data, produce a complete diagnostic report.

PROCESS:
1.  **Adopt Persona Tone**: Generate the entire response in the voice of a trusted strategic advisor. Be clear, direct, and encouraging.
2.  **Analyze Strengths**: Use the top strengths to frame the entire report.
3.  **Generate Opportunities**: Create 3-5 opportunity plays that are a strong fit for the user's persona, strengths, chosen markets, workstyle, and constraints.
4.  **Apply Feasibility Filters**:
    - **Age/Physical Realism**: Do not suggest physically demanding roles for older age brackets or roles that contradict constraints. Propose adjacent, realistic roles (e.g., coach instead of player).
    - **Budget/Time**: Favor low-friction, digital-first ideas for low budgets and limited time.
    - **Speed-to-Revenue**: Ensure at least one opportunity is viable within 30 days.
    - **Authenticity**: Opportunities must align with user's strengths and wildcards.
5.  **Structure Output**: Generate the report according to the JSON schema provided.

You MUST return a single, valid JSON object that strictly follows the provided schema. Do not include any text, markdown, or explanations outside of the JSON object."#;

/// Top-level report fields every response schema must declare and require.
pub const REQUIRED_REPORT_FIELDS: [&str; 9] = [
    "personaTitle",
    "identityParagraph",
    "topStrengths",
    "opportunityMap",
    "quickWins",
    "buildPlan",
    "guardrails",
    "tools",
    "starterPrompts",
];

const STRENGTH_FIELDS: [&str; 2] = ["strength", "reason"];
const OPPORTUNITY_FIELDS: [&str; 6] = ["what", "whyFit", "audience", "offer", "channel", "speedPlan"];
const STARTER_PROMPT_FIELDS: [&str; 2] = ["title", "prompt"];

pub fn system_instruction() -> &'static str {
    SYSTEM_INSTRUCTION
}

/// The payload for one report generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub system_instruction: String,
    pub user_content: String,
    pub schema: Value,
}

#[derive(Debug, Clone)]
pub struct ReportRequestBuilder {
    schema: Value,
}

impl Default for ReportRequestBuilder {
    fn default() -> Self {
        Self {
            schema: report_schema(),
        }
    }
}

impl ReportRequestBuilder {
    pub fn with_schema(schema: Value) -> Self {
        Self { schema }
    }

    pub fn build(&self, form: &FormSubmission, profile: &DerivedProfile) -> Result<ReportRequest> {
        validate_schema(&self.schema)?;
        Ok(ReportRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_content: user_content(
                form,
                &profile.persona,
                &profile.dominant,
                &profile.normalized,
            )?,
            schema: self.schema.clone(),
        })
    }
}

/// Serializes the submission facts for the model. Same input, same bytes.
pub fn user_content(
    form: &FormSubmission,
    persona: &str,
    dominant: &DominantSkillSet,
    normalized: &NormalizedScores,
) -> Result<String> {
    let scores = serde_json::to_string(normalized)
        .map_err(|err| ReportError::Validation(format!("scores could not be encoded: {}", err)))?;
    let mut lines = Vec::with_capacity(12);
    lines.push("USER DATA:".to_string());
    lines.push(format!("- Name: {}", form.name.trim()));
    lines.push(format!("- Scores (0-100): {}", scores));
    lines.push(format!("- Top Strengths: {}", dominant.keys().join(", ")));
    lines.push(format!("- Chosen Persona: {}", persona));
    lines.push(format!("- Markets: {}", or_placeholder(&join_markets(&form.markets), "Not specified")));
    lines.push(format!(
        "- Workstyle: {}",
        or_placeholder(&join_workstyles(&form.workstyle), "Not specified")
    ));
    lines.push(format!("- Time per week: {} hours", form.time_per_week_hours));
    lines.push(format!("- Budget: {}", form.budget_level.key()));
    lines.push(format!("- Age Bracket: {}", form.age_bracket.label()));
    lines.push(format!(
        "- Wildcards (hobbies, interests, past careers): {}",
        or_placeholder(form.wildcards.trim(), "None")
    ));
    lines.push(format!(
        "- Constraints: {}",
        or_placeholder(form.constraints.trim(), "None")
    ));
    Ok(lines.join("\n"))
}

fn join_markets(markets: &[Market]) -> String {
    markets
        .iter()
        .map(|market| market.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_workstyles(workstyles: &[Workstyle]) -> String {
    workstyles
        .iter()
        .map(|style| style.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

/// Structured-output schema in the generative backend's type vocabulary.
pub fn report_schema() -> Value {
    let string = || json!({ "type": "STRING" });
    let string_list = |min: u32, max: u32, description: &str| {
        json!({
            "type": "ARRAY",
            "description": description,
            "items": { "type": "STRING" },
            "minItems": min,
            "maxItems": max,
        })
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "personaTitle": {
                "type": "STRING",
                "description": "A creative, 2-3 word title for the user's persona based on their skills and preferences."
            },
            "identityParagraph": {
                "type": "STRING",
                "description": "A 3-4 sentence paragraph describing the user's core identity, encouraging and insightful."
            },
            "topStrengths": {
                "type": "ARRAY",
                "description": "The user's top 2-3 strengths, derived from their highest scores.",
                "minItems": 2,
                "maxItems": 3,
                "items": {
                    "type": "OBJECT",
                    "properties": { "strength": string(), "reason": string() },
                    "required": STRENGTH_FIELDS,
                }
            },
            "opportunityMap": {
                "type": "ARRAY",
                "description": "3-5 distinct, actionable opportunities tailored to the user's persona and inputs.",
                "minItems": 3,
                "maxItems": 5,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "what": string(),
                        "whyFit": string(),
                        "audience": string(),
                        "offer": string(),
                        "channel": string(),
                        "speedPlan": { "type": "STRING", "description": "A concrete 30-day action plan." }
                    },
                    "required": OPPORTUNITY_FIELDS,
                }
            },
            "quickWins": string_list(3, 5, "Immediate, easy actions for this week."),
            "buildPlan": string_list(3, 5, "Strategic actions for the next 90 days."),
            "guardrails": string_list(3, 3, "Potential pitfalls to avoid based on the profile."),
            "tools": string_list(5, 7, "Recommended tools that align with the opportunities."),
            "starterPrompts": {
                "type": "ARRAY",
                "description": "Two detailed prompts for brainstorming the top opportunity with an AI assistant.",
                "minItems": 2,
                "maxItems": 2,
                "items": {
                    "type": "OBJECT",
                    "properties": { "title": string(), "prompt": string() },
                    "required": STARTER_PROMPT_FIELDS,
                }
            }
        },
        "required": REQUIRED_REPORT_FIELDS,
    })
}

/// Rejects a schema that would let the model omit any report field.
pub fn validate_schema(schema: &Value) -> Result<()> {
    check_object(schema, &REQUIRED_REPORT_FIELDS, "")?;
    let properties = &schema["properties"];
    check_object(&properties["topStrengths"]["items"], &STRENGTH_FIELDS, "topStrengths.")?;
    check_object(
        &properties["opportunityMap"]["items"],
        &OPPORTUNITY_FIELDS,
        "opportunityMap.",
    )?;
    check_object(
        &properties["starterPrompts"]["items"],
        &STARTER_PROMPT_FIELDS,
        "starterPrompts.",
    )?;
    Ok(())
}

fn check_object(node: &Value, fields: &[&str], prefix: &str) -> Result<()> {
    let properties = node.get("properties").and_then(Value::as_object);
    let required: Vec<&str> = node
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for field in fields {
        let declared = properties.map_or(false, |props| props.contains_key(*field));
        if !declared || !required.contains(field) {
            return Err(ReportError::InvalidSchema(format!("{}{}", prefix, field)));
        }
    }
    Ok(())
}
