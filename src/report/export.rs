use crate::error::{ReportError, Result};
use crate::report::Report;

impl Report {
    /// Plain-text rendering in display order, suitable for the clipboard.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n\n{}\n", self.persona_title, self.identity_paragraph));

        section(&mut out, "Your Top Strengths");
        for strength in &self.top_strengths {
            out.push_str(&format!("- {}: {}\n", strength.strength, strength.reason));
        }

        section(&mut out, "Opportunity Map");
        for (index, opportunity) in self.opportunity_map.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", index + 1, opportunity.what));
            out.push_str(&format!("   Why it fits: {}\n", opportunity.why_fit));
            out.push_str(&format!("   Audience: {}\n", opportunity.audience));
            out.push_str(&format!("   Offer: {}\n", opportunity.offer));
            out.push_str(&format!("   Channel: {}\n", opportunity.channel));
            out.push_str(&format!("   30-day plan: {}\n", opportunity.speed_plan));
        }

        bullet_section(&mut out, "Quick Wins (This Week)", &self.quick_wins);
        bullet_section(&mut out, "90-Day Build Plan", &self.build_plan);
        bullet_section(&mut out, "Guardrails", &self.guardrails);
        bullet_section(&mut out, "Recommended Tools", &self.tools);

        section(&mut out, "Starter Prompts");
        for prompt in &self.starter_prompts {
            out.push_str(&format!("{}\n{}\n", prompt.title, prompt.prompt));
        }
        out
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n{}\n", self.persona_title, self.identity_paragraph);

        out.push_str("\n## Your Top Strengths\n\n");
        for strength in &self.top_strengths {
            out.push_str(&format!("- **{}**: {}\n", strength.strength, strength.reason));
        }

        out.push_str("\n## Opportunity Map\n");
        for opportunity in &self.opportunity_map {
            out.push_str(&format!("\n### {}\n\n", opportunity.what));
            out.push_str(&format!("- **Why it fits:** {}\n", opportunity.why_fit));
            out.push_str(&format!("- **Audience:** {}\n", opportunity.audience));
            out.push_str(&format!("- **Offer:** {}\n", opportunity.offer));
            out.push_str(&format!("- **Channel:** {}\n", opportunity.channel));
            out.push_str(&format!("- **30-day plan:** {}\n", opportunity.speed_plan));
        }

        for (title, items) in [
            ("Quick Wins (This Week)", &self.quick_wins),
            ("90-Day Build Plan", &self.build_plan),
            ("Guardrails", &self.guardrails),
            ("Recommended Tools", &self.tools),
        ] {
            out.push_str(&format!("\n## {}\n\n", title));
            for item in items {
                out.push_str(&format!("- {}\n", item));
            }
        }

        out.push_str("\n## Starter Prompts\n");
        for prompt in &self.starter_prompts {
            out.push_str(&format!("\n**{}**\n\n```\n{}\n```\n", prompt.title, prompt.prompt));
        }
        out
    }

    /// Full JSON export, including the embedded snapshot.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ReportError::MalformedResponse(format!("report encode failed: {}", err)))
    }
}

fn section(out: &mut String, title: &str) {
    out.push_str(&format!("\n{}\n", title));
}

fn bullet_section(out: &mut String, title: &str, items: &[String]) {
    section(out, title);
    for item in items {
        out.push_str(&format!("- {}\n", item));
    }
}

#[cfg(test)]
mod tests {
    use crate::report::{Opportunity, Report, StarterPrompt, Strength};

    fn report() -> Report {
        Report {
            persona_title: "Signal Smith".to_string(),
            identity_paragraph: "You turn noise into plans.".to_string(),
            top_strengths: vec![Strength {
                strength: "Synthesis".to_string(),
                reason: "You connect dots fast.".to_string(),
            }],
            opportunity_map: vec![Opportunity {
                what: "Research digest".to_string(),
                why_fit: "Curiosity".to_string(),
                audience: "Founders".to_string(),
                offer: "Weekly brief".to_string(),
                channel: "Email".to_string(),
                speed_plan: "Publish issue one".to_string(),
            }],
            quick_wins: vec!["Pick a niche".to_string()],
            build_plan: vec!["Reach 100 readers".to_string()],
            guardrails: vec!["Avoid scope creep".to_string()],
            tools: vec!["Beehiiv".to_string()],
            starter_prompts: vec![StarterPrompt {
                title: "Angle finder".to_string(),
                prompt: "List ten angles".to_string(),
            }],
            json_data: "{}".to_string(),
        }
    }

    #[test]
    fn text_keeps_display_order() {
        let text = report().to_text();
        let strengths = text.find("Your Top Strengths").unwrap();
        let map = text.find("Opportunity Map").unwrap();
        let prompts = text.find("Starter Prompts").unwrap();
        assert!(text.starts_with("Signal Smith"));
        assert!(strengths < map && map < prompts);
        assert!(text.contains("30-day plan: Publish issue one"));
    }

    #[test]
    fn markdown_has_section_headings() {
        let markdown = report().to_markdown();
        assert!(markdown.starts_with("# Signal Smith"));
        assert!(markdown.contains("### Research digest"));
        assert!(markdown.contains("## Guardrails\n\n- Avoid scope creep"));
    }

    #[test]
    fn json_export_uses_wire_names() {
        let json = report().to_json_pretty().unwrap();
        assert!(json.contains("\"personaTitle\""));
        assert!(json.contains("\"speedPlan\""));
        assert!(json.contains("\"jsonData\""));
    }
}
