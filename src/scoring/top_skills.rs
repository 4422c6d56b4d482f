use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::form::{NormalizedScores, Skill};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopSkillConfig {
    /// Normalized score at or above which a skill is always dominant.
    pub primary_threshold: u8,
    /// Skills within this many points of the top score are also dominant.
    pub secondary_margin: u8,
    pub min_dominant: usize,
    pub max_dominant: usize,
}

impl Default for TopSkillConfig {
    fn default() -> Self {
        Self {
            primary_threshold: 70,
            secondary_margin: 10,
            min_dominant: 2,
            max_dominant: 3,
        }
    }
}

/// 1..=3 skills ranked by normalized score, highest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DominantSkillSet(Vec<Skill>);

impl DominantSkillSet {
    pub fn as_slice(&self) -> &[Skill] {
        &self.0
    }

    pub fn contains(&self, skill: Skill) -> bool {
        self.0.contains(&skill)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.0.iter().map(|skill| skill.key()).collect()
    }
}

impl From<Vec<Skill>> for DominantSkillSet {
    fn from(skills: Vec<Skill>) -> Self {
        Self(skills)
    }
}

#[derive(Debug, Clone)]
pub struct TopSkillSelector {
    config: TopSkillConfig,
}

impl TopSkillSelector {
    pub fn new(config: TopSkillConfig) -> Self {
        let min_dominant = config.min_dominant.clamp(1, Skill::ALL.len());
        let max_dominant = config.max_dominant.clamp(min_dominant, Skill::ALL.len());
        Self {
            config: TopSkillConfig {
                min_dominant,
                max_dominant,
                ..config
            },
        }
    }

    pub fn select(&self, scores: &NormalizedScores) -> DominantSkillSet {
        // Stable sort: equal scores keep the fixed enumeration order.
        let mut ranked: Vec<Skill> = Skill::ALL.to_vec();
        ranked.sort_by_key(|skill| Reverse(scores.get(*skill)));

        let top_score = scores.get(ranked[0]);
        let secondary_floor = top_score.saturating_sub(self.config.secondary_margin);

        // Primary skills all outrank secondary ones, so one pass over the
        // ranking yields the union in descending order.
        let mut dominant: Vec<Skill> = ranked
            .iter()
            .copied()
            .filter(|skill| {
                let score = scores.get(*skill);
                score >= self.config.primary_threshold || score >= secondary_floor
            })
            .collect();

        if dominant.len() < self.config.min_dominant {
            dominant = ranked[..self.config.min_dominant].to_vec();
        }

        dominant.truncate(self.config.max_dominant);
        DominantSkillSet(dominant)
    }
}

impl Default for TopSkillSelector {
    fn default() -> Self {
        Self::new(TopSkillConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::SkillScores;
    use crate::scoring::normalize;

    fn select(raw: [u8; 6]) -> Vec<Skill> {
        let scores = SkillScores {
            communication: raw[0],
            creative: raw[1],
            strategy: raw[2],
            technical: raw[3],
            eq: raw[4],
            learning: raw[5],
        };
        TopSkillSelector::default()
            .select(&normalize(&scores))
            .as_slice()
            .to_vec()
    }

    #[test]
    fn primary_and_secondary_in_score_order() {
        assert_eq!(
            select([9, 8, 9, 3, 4, 5]),
            vec![Skill::Communication, Skill::Strategy, Skill::Creative]
        );
    }

    #[test]
    fn uniform_scores_fall_back_to_enumeration_order() {
        assert_eq!(
            select([5; 6]),
            vec![Skill::Communication, Skill::Creative, Skill::Strategy]
        );
    }

    #[test]
    fn lone_leader_is_paired_with_runner_up() {
        // No skill reaches 70 and the runner-up sits more than 10 below the top.
        assert_eq!(select([2, 6, 1, 3, 4, 1]), vec![Skill::Creative, Skill::Eq]);
    }

    #[test]
    fn single_primary_is_paired_with_runner_up() {
        assert_eq!(select([1, 1, 1, 9, 2, 5]), vec![Skill::Technical, Skill::Learning]);
    }

    #[test]
    fn second_primary_joins_leader() {
        assert_eq!(select([1, 1, 1, 9, 2, 7]), vec![Skill::Technical, Skill::Learning]);
    }

    #[test]
    fn tied_leaders_above_threshold_are_both_kept() {
        let skills = select([3, 3, 3, 8, 3, 8]);
        assert_eq!(skills, vec![Skill::Technical, Skill::Learning]);
    }

    #[test]
    fn never_more_than_three() {
        let skills = select([10, 9, 9, 8, 8, 7]);
        assert_eq!(
            skills,
            vec![Skill::Communication, Skill::Creative, Skill::Strategy]
        );
    }

    #[test]
    fn thresholds_are_configurable() {
        let selector = TopSkillSelector::new(TopSkillConfig {
            primary_threshold: 90,
            secondary_margin: 0,
            min_dominant: 1,
            max_dominant: 3,
        });
        let scores = normalize(&SkillScores {
            communication: 8,
            creative: 7,
            strategy: 6,
            technical: 5,
            eq: 4,
            learning: 3,
        });
        assert_eq!(selector.select(&scores).as_slice(), &[Skill::Communication]);
    }
}
