use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReportError, Result};
use crate::form::{FormSubmission, Market, NormalizedScores};
use crate::scoring::{DerivedProfile, DominantSkillSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strength {
    pub strength: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub what: String,
    pub why_fit: String,
    pub audience: String,
    pub offer: String,
    pub channel: String,
    /// 30-day plan to get the opportunity moving.
    pub speed_plan: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterPrompt {
    pub title: String,
    pub prompt: String,
}

/// The model's half of a report. Every field is required on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReport {
    persona_title: String,
    identity_paragraph: String,
    top_strengths: Vec<Strength>,
    opportunity_map: Vec<Opportunity>,
    quick_wins: Vec<String>,
    build_plan: Vec<String>,
    guardrails: Vec<String>,
    tools: Vec<String>,
    starter_prompts: Vec<StarterPrompt>,
}

/// Deterministically derived facts embedded in every report.
///
/// `persona` is the resolver's label, not the model's creative title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub name: String,
    pub email: String,
    pub persona: String,
    pub top_skills: DominantSkillSet,
    pub markets: Vec<Market>,
    pub scores: NormalizedScores,
    pub consent: bool,
}

impl ReportSnapshot {
    pub fn new(form: &FormSubmission, profile: &DerivedProfile) -> Self {
        Self {
            name: form.name.trim().to_string(),
            email: form.email.trim().to_string(),
            persona: profile.persona.clone(),
            top_skills: profile.dominant.clone(),
            markets: form.markets.clone(),
            scores: profile.normalized,
            consent: form.consent,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ReportError::MalformedResponse(format!("snapshot encode failed: {}", err)))
    }

    pub fn from_json(data: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub persona_title: String,
    pub identity_paragraph: String,
    pub top_strengths: Vec<Strength>,
    pub opportunity_map: Vec<Opportunity>,
    pub quick_wins: Vec<String>,
    pub build_plan: Vec<String>,
    pub guardrails: Vec<String>,
    pub tools: Vec<String>,
    pub starter_prompts: Vec<StarterPrompt>,
    /// Pretty-printed [`ReportSnapshot`].
    pub json_data: String,
}

impl Report {
    pub fn snapshot(&self) -> std::result::Result<ReportSnapshot, serde_json::Error> {
        ReportSnapshot::from_json(&self.json_data)
    }
}

/// Merges the model's structured response with the locally derived snapshot.
pub fn assemble(raw: &str, snapshot: &ReportSnapshot) -> Result<Report> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| ReportError::MalformedResponse(format!("response is not JSON: {}", err)))?;
    assemble_value(value, snapshot)
}

pub fn assemble_value(value: Value, snapshot: &ReportSnapshot) -> Result<Report> {
    if !value.is_object() {
        return Err(ReportError::MalformedResponse(
            "response is not a JSON object".to_string(),
        ));
    }
    let model: ModelReport = serde_json::from_value(value)
        .map_err(|err| ReportError::MalformedResponse(err.to_string()))?;

    Ok(Report {
        persona_title: model.persona_title,
        identity_paragraph: model.identity_paragraph,
        top_strengths: model.top_strengths,
        opportunity_map: model.opportunity_map,
        quick_wins: model.quick_wins,
        build_plan: model.build_plan,
        guardrails: model.guardrails,
        tools: model.tools,
        starter_prompts: model.starter_prompts,
        json_data: snapshot.to_json()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Skill;
    use serde_json::json;

    fn snapshot() -> ReportSnapshot {
        ReportSnapshot {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            persona: "Narrative Architect".to_string(),
            top_skills: DominantSkillSet::from(vec![Skill::Communication, Skill::Strategy]),
            markets: vec![Market::Education],
            scores: NormalizedScores {
                communication: 90,
                creative: 40,
                strategy: 80,
                technical: 30,
                eq: 50,
                learning: 60,
            },
            consent: true,
        }
    }

    fn response() -> Value {
        json!({
            "personaTitle": "The Plot Whisperer",
            "identityParagraph": "You see the story before anyone else does.",
            "topStrengths": [
                { "strength": "Framing", "reason": "You make ideas land." },
                { "strength": "Planning", "reason": "You map the route." }
            ],
            "opportunityMap": [
                { "what": "Course", "whyFit": "Teaching fits", "audience": "Teachers",
                  "offer": "Cohort", "channel": "Newsletter", "speedPlan": "Week 1: outline" }
            ],
            "quickWins": ["Post once"],
            "buildPlan": ["Ship a pilot"],
            "guardrails": ["Don't overbuild"],
            "tools": ["Notion"],
            "starterPrompts": [{ "title": "Outline", "prompt": "Draft a syllabus" }]
        })
    }

    #[test]
    fn embeds_resolved_persona_not_model_title() {
        let report = assemble(&response().to_string(), &snapshot()).unwrap();
        assert_eq!(report.persona_title, "The Plot Whisperer");
        let embedded = report.snapshot().unwrap();
        assert_eq!(embedded.persona, "Narrative Architect");
        assert_eq!(embedded, snapshot());
    }

    #[test]
    fn missing_top_strengths_is_malformed() {
        let mut value = response();
        value.as_object_mut().unwrap().remove("topStrengths");
        let err = assemble(&value.to_string(), &snapshot()).unwrap_err();
        match err {
            ReportError::MalformedResponse(message) => assert!(message.contains("topStrengths")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn opportunity_missing_field_is_malformed() {
        let mut value = response();
        value["opportunityMap"][0]
            .as_object_mut()
            .unwrap()
            .remove("speedPlan");
        assert!(matches!(
            assemble_value(value, &snapshot()),
            Err(ReportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn null_list_is_not_replaced_with_empty() {
        let mut value = response();
        value["tools"] = Value::Null;
        assert!(matches!(
            assemble_value(value, &snapshot()),
            Err(ReportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_json_text_is_malformed() {
        assert!(matches!(
            assemble("Sure! Here is your report:", &snapshot()),
            Err(ReportError::MalformedResponse(_))
        ));
        assert!(matches!(
            assemble("[1, 2, 3]", &snapshot()),
            Err(ReportError::MalformedResponse(_))
        ));
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let value: Value = serde_json::from_str(&snapshot().to_json().unwrap()).unwrap();
        assert_eq!(value["topSkills"], json!(["communication", "strategy"]));
        assert_eq!(value["scores"]["communication"], 90);
        assert_eq!(value["consent"], true);
    }
}
