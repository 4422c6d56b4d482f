use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{ReportError, Result};

pub const MAX_RAW_SCORE: u8 = 10;
pub const MAX_WORKSTYLES: usize = 3;

/// The six self-assessed competencies, in their fixed enumeration order.
///
/// The declaration order is the tie-break order used by the top-skill
/// selector, so it must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Communication,
    Creative,
    Strategy,
    Technical,
    Eq,
    Learning,
}

impl Skill {
    pub const ALL: [Skill; 6] = [
        Skill::Communication,
        Skill::Creative,
        Skill::Strategy,
        Skill::Technical,
        Skill::Eq,
        Skill::Learning,
    ];

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "communication" | "comm" => Some(Skill::Communication),
            "creative" => Some(Skill::Creative),
            "strategy" => Some(Skill::Strategy),
            "technical" | "tech" => Some(Skill::Technical),
            "eq" => Some(Skill::Eq),
            "learning" => Some(Skill::Learning),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Skill::Communication => "communication",
            Skill::Creative => "creative",
            Skill::Strategy => "strategy",
            Skill::Technical => "technical",
            Skill::Eq => "eq",
            Skill::Learning => "learning",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Skill::Communication => "Communication",
            Skill::Creative => "Creative Expression",
            Skill::Strategy => "Strategic Thinking",
            Skill::Technical => "Technical Fluency",
            Skill::Eq => "Emotional Intelligence",
            Skill::Learning => "Learning Agility / Curiosity",
        }
    }

    /// Position in the fixed enumeration order.
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// Raw 0..=10 self ratings as entered on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillScores {
    pub communication: u8,
    pub creative: u8,
    pub strategy: u8,
    pub technical: u8,
    pub eq: u8,
    pub learning: u8,
}

impl Default for SkillScores {
    fn default() -> Self {
        Self::uniform(5)
    }
}

impl SkillScores {
    pub fn uniform(value: u8) -> Self {
        Self {
            communication: value,
            creative: value,
            strategy: value,
            technical: value,
            eq: value,
            learning: value,
        }
    }

    pub fn get(&self, skill: Skill) -> u8 {
        match skill {
            Skill::Communication => self.communication,
            Skill::Creative => self.creative,
            Skill::Strategy => self.strategy,
            Skill::Technical => self.technical,
            Skill::Eq => self.eq,
            Skill::Learning => self.learning,
        }
    }

    pub fn set(&mut self, skill: Skill, value: u8) {
        match skill {
            Skill::Communication => self.communication = value,
            Skill::Creative => self.creative = value,
            Skill::Strategy => self.strategy = value,
            Skill::Technical => self.technical = value,
            Skill::Eq => self.eq = value,
            Skill::Learning => self.learning = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Skill, u8)> + '_ {
        Skill::ALL.iter().map(move |skill| (*skill, self.get(*skill)))
    }

    /// Fails on the first rating above [`MAX_RAW_SCORE`].
    pub fn check_range(&self) -> Result<()> {
        match self.iter().find(|(_, value)| *value > MAX_RAW_SCORE) {
            Some((skill, value)) => Err(ReportError::Validation(format!(
                "score for {} out of range (0-{}): {}",
                skill.key(),
                MAX_RAW_SCORE,
                value
            ))),
            None => Ok(()),
        }
    }

    /// Parses `communication=9,creative=8,...`. Every skill must be named exactly once.
    pub fn parse_pairs(value: &str) -> std::result::Result<Self, String> {
        let mut scores = SkillScores::uniform(0);
        let mut seen = HashSet::new();
        for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected skill=value, got: {}", pair))?;
            let skill =
                Skill::from_str(key).ok_or_else(|| format!("unknown skill: {}", key.trim()))?;
            let rating: u8 = raw
                .trim()
                .parse()
                .map_err(|_| format!("invalid rating for {}: {}", skill.key(), raw.trim()))?;
            if rating > MAX_RAW_SCORE {
                return Err(format!(
                    "rating for {} out of range (0-{}): {}",
                    skill.key(),
                    MAX_RAW_SCORE,
                    rating
                ));
            }
            if !seen.insert(skill) {
                return Err(format!("duplicate skill: {}", skill.key()));
            }
            scores.set(skill, rating);
        }
        if let Some(missing) = Skill::ALL.iter().find(|skill| !seen.contains(*skill)) {
            return Err(format!("missing skill: {}", missing.key()));
        }
        Ok(scores)
    }
}

/// Ratings rescaled onto 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizedScores {
    pub communication: u8,
    pub creative: u8,
    pub strategy: u8,
    pub technical: u8,
    pub eq: u8,
    pub learning: u8,
}

impl NormalizedScores {
    pub fn get(&self, skill: Skill) -> u8 {
        match skill {
            Skill::Communication => self.communication,
            Skill::Creative => self.creative,
            Skill::Strategy => self.strategy,
            Skill::Technical => self.technical,
            Skill::Eq => self.eq,
            Skill::Learning => self.learning,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Skill, u8)> + '_ {
        Skill::ALL.iter().map(move |skill| (*skill, self.get(*skill)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workstyle {
    Create,
    Teach,
    Advise,
    Build,
    Lead,
}

impl Workstyle {
    pub const ALL: [Workstyle; 5] = [
        Workstyle::Create,
        Workstyle::Teach,
        Workstyle::Advise,
        Workstyle::Build,
        Workstyle::Lead,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Workstyle::Create => "Create",
            Workstyle::Teach => "Teach",
            Workstyle::Advise => "Advise",
            Workstyle::Build => "Build",
            Workstyle::Lead => "Lead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    Low,
    Medium,
    High,
}

impl Budget {
    pub fn key(self) -> &'static str {
        match self {
            Budget::Low => "low",
            Budget::Medium => "medium",
            Budget::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Budget::Low => "Low (<$100 mo)",
            Budget::Medium => "Medium ($100–500 mo)",
            Budget::High => "High (>$500 mo)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBracket {
    #[serde(rename = "18-29")]
    From18To29,
    #[serde(rename = "30-44")]
    From30To44,
    #[serde(rename = "45-59")]
    From45To59,
    #[serde(rename = "60+")]
    SixtyPlus,
}

impl AgeBracket {
    pub fn label(self) -> &'static str {
        match self {
            AgeBracket::From18To29 => "18-29",
            AgeBracket::From30To44 => "30-44",
            AgeBracket::From45To59 => "45-59",
            AgeBracket::SixtyPlus => "60+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "SMB")]
    Smb,
    Creators,
    #[serde(rename = "B2B SaaS")]
    B2bSaas,
    Healthcare,
    Education,
    Nonprofits,
    #[serde(rename = "Local Services")]
    LocalServices,
    #[serde(rename = "Professional Services")]
    ProfessionalServices,
    Ecommerce,
}

impl Market {
    pub fn label(self) -> &'static str {
        match self {
            Market::Smb => "SMB",
            Market::Creators => "Creators",
            Market::B2bSaas => "B2B SaaS",
            Market::Healthcare => "Healthcare",
            Market::Education => "Education",
            Market::Nonprofits => "Nonprofits",
            Market::LocalServices => "Local Services",
            Market::ProfessionalServices => "Professional Services",
            Market::Ecommerce => "Ecommerce",
        }
    }
}

/// A completed diagnostic form.
///
/// The form collaborator is expected to enforce the field rules before
/// handing the record over; [`FormSubmission::validate`] re-checks them so a
/// bad record fails fast instead of producing a meaningless persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub name: String,
    pub email: String,
    pub consent: bool,
    pub scores: SkillScores,
    pub workstyle: Vec<Workstyle>,
    pub time_per_week_hours: u32,
    pub budget_level: Budget,
    pub age_bracket: AgeBracket,
    pub markets: Vec<Market>,
    #[serde(default)]
    pub wildcards: String,
    #[serde(default)]
    pub constraints: String,
}

impl FormSubmission {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReportError::Validation("name is required".to_string()));
        }
        if self.email.trim().is_empty() {
            return Err(ReportError::Validation("email is required".to_string()));
        }
        if !email_pattern().is_match(self.email.trim()) {
            return Err(ReportError::Validation(format!(
                "email is invalid: {}",
                self.email.trim()
            )));
        }
        if !self.consent {
            return Err(ReportError::Validation(
                "consent is required to generate a report".to_string(),
            ));
        }
        self.scores.check_range()?;
        if self.workstyle.is_empty() {
            return Err(ReportError::Validation(
                "select at least one workstyle".to_string(),
            ));
        }
        if self.workstyle.len() > MAX_WORKSTYLES {
            return Err(ReportError::Validation(format!(
                "select at most {} workstyles",
                MAX_WORKSTYLES
            )));
        }
        if has_duplicates(&self.workstyle) {
            return Err(ReportError::Validation(
                "workstyle selected more than once".to_string(),
            ));
        }
        if self.markets.is_empty() {
            return Err(ReportError::Validation(
                "select at least one market".to_string(),
            ));
        }
        if has_duplicates(&self.markets) {
            return Err(ReportError::Validation(
                "market selected more than once".to_string(),
            ));
        }
        Ok(())
    }
}

fn has_duplicates<T: Eq + std::hash::Hash + Copy>(values: &[T]) -> bool {
    let mut seen = HashSet::new();
    values.iter().any(|value| !seen.insert(*value))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern compiles"))
}
