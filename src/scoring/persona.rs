use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::form::Skill;
use crate::scoring::DominantSkillSet;

pub const DEFAULT_PERSONA: &str = "Opportunity Synthesist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaRule {
    pub persona: String,
    pub skills: Vec<Skill>,
}

impl PersonaRule {
    pub fn new(persona: &str, skills: &[Skill]) -> Self {
        Self {
            persona: persona.to_string(),
            skills: skills.to_vec(),
        }
    }

    fn matched(&self, dominant: &DominantSkillSet) -> usize {
        self.skills
            .iter()
            .filter(|skill| dominant.contains(**skill))
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub default_persona: String,
    pub rules: Vec<PersonaRule>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        use Skill::*;
        Self {
            default_persona: DEFAULT_PERSONA.to_string(),
            rules: vec![
                PersonaRule::new("Narrative Architect", &[Communication, Strategy]),
                PersonaRule::new("System Builder", &[Technical, Strategy]),
                PersonaRule::new("Creator-Educator", &[Communication, Creative]),
                PersonaRule::new("Opportunity Synthesist", &[Learning, Strategy]),
                PersonaRule::new("Empathic Facilitator", &[Eq, Communication]),
                PersonaRule::new("Visual Storysmith", &[Creative, Communication]),
                PersonaRule::new("Operator-Automator", &[Technical, Communication]),
                PersonaRule::new("Community Catalyst", &[Eq, Strategy, Communication]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersonaMatch {
    /// Every required skill of the rule is dominant.
    Full,
    /// Best partial overlap when no rule matched fully.
    Partial { matched: usize },
    /// Nothing overlapped at all.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonaResolution {
    pub persona: String,
    #[serde(flatten)]
    pub matched_by: PersonaMatch,
}

/// Maps a dominant skill set onto exactly one persona label.
#[derive(Debug, Clone)]
pub struct PersonaResolver {
    rules: Vec<PersonaRule>,
    // Rule indices by required-set size, largest first; ties keep table order.
    evaluation_order: Vec<usize>,
    default_persona: String,
}

impl PersonaResolver {
    pub fn new(config: PersonaConfig) -> Self {
        let rules: Vec<PersonaRule> = config
            .rules
            .into_iter()
            .filter(|rule| !rule.skills.is_empty() && !rule.persona.trim().is_empty())
            .collect();
        let mut evaluation_order: Vec<usize> = (0..rules.len()).collect();
        evaluation_order.sort_by_key(|index| Reverse(rules[*index].skills.len()));

        let default_persona = if config.default_persona.trim().is_empty() {
            DEFAULT_PERSONA.to_string()
        } else {
            config.default_persona
        };

        Self {
            rules,
            evaluation_order,
            default_persona,
        }
    }

    pub fn resolve(&self, dominant: &DominantSkillSet) -> String {
        self.resolve_detailed(dominant).persona
    }

    pub fn resolve_detailed(&self, dominant: &DominantSkillSet) -> PersonaResolution {
        for index in &self.evaluation_order {
            let rule = &self.rules[*index];
            if rule.matched(dominant) == rule.skills.len() {
                return PersonaResolution {
                    persona: rule.persona.clone(),
                    matched_by: PersonaMatch::Full,
                };
            }
        }

        let mut best: Option<(&PersonaRule, usize)> = None;
        for rule in &self.rules {
            let matched = rule.matched(dominant);
            if matched == 0 {
                continue;
            }
            // Strictly greater: the first-listed rule wins ties.
            if best.map_or(true, |(_, current)| matched > current) {
                best = Some((rule, matched));
            }
        }

        match best {
            Some((rule, matched)) => PersonaResolution {
                persona: rule.persona.clone(),
                matched_by: PersonaMatch::Partial { matched },
            },
            None => PersonaResolution {
                persona: self.default_persona.clone(),
                matched_by: PersonaMatch::Default,
            },
        }
    }

    pub fn rules(&self) -> &[PersonaRule] {
        &self.rules
    }
}

impl Default for PersonaResolver {
    fn default() -> Self {
        Self::new(PersonaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Skill::*;

    fn resolve(skills: &[Skill]) -> PersonaResolution {
        PersonaResolver::default().resolve_detailed(&DominantSkillSet::from(skills.to_vec()))
    }

    #[test]
    fn three_skill_rule_beats_earlier_two_skill_rule() {
        let resolution = resolve(&[Communication, Strategy, Eq]);
        assert_eq!(resolution.persona, "Community Catalyst");
        assert_eq!(resolution.matched_by, PersonaMatch::Full);
    }

    #[test]
    fn first_listed_two_skill_rule_wins() {
        assert_eq!(
            resolve(&[Communication, Creative, Strategy]).persona,
            "Narrative Architect"
        );
        assert_eq!(resolve(&[Creative, Communication]).persona, "Creator-Educator");
    }

    #[test]
    fn partial_overlap_uses_first_listed_best_rule() {
        // Only `strategy` overlaps anything; Narrative Architect is listed first.
        let resolution = resolve(&[Strategy]);
        assert_eq!(resolution.persona, "Narrative Architect");
        assert_eq!(resolution.matched_by, PersonaMatch::Partial { matched: 1 });

        assert_eq!(resolve(&[Learning, Creative]).persona, "Creator-Educator");
    }

    #[test]
    fn falls_back_to_default_without_overlap() {
        let resolver = PersonaResolver::new(PersonaConfig {
            default_persona: "Integrated Imagineer".to_string(),
            rules: vec![PersonaRule::new("Narrative Architect", &[Communication, Strategy])],
        });
        let resolution = resolver.resolve_detailed(&DominantSkillSet::from(vec![Eq, Learning]));
        assert_eq!(resolution.persona, "Integrated Imagineer");
        assert_eq!(resolution.matched_by, PersonaMatch::Default);
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = PersonaResolver::default();
        let dominant = DominantSkillSet::from(vec![Technical, Eq]);
        let first = resolver.resolve(&dominant);
        for _ in 0..10 {
            assert_eq!(resolver.resolve(&dominant), first);
        }
    }
}
