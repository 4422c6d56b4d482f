use crate::form::{NormalizedScores, SkillScores};

pub const NORMALIZATION_FACTOR: u8 = 10;

/// Rescales 0..=10 ratings onto 0..=100.
pub fn normalize(scores: &SkillScores) -> NormalizedScores {
    let scale = |value: u8| value.saturating_mul(NORMALIZATION_FACTOR);
    NormalizedScores {
        communication: scale(scores.communication),
        creative: scale(scores.creative),
        strategy: scale(scores.strategy),
        technical: scale(scores.technical),
        eq: scale(scores.eq),
        learning: scale(scores.learning),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Skill;

    #[test]
    fn multiplies_every_skill_by_ten() {
        for raw in 0..=10u8 {
            let mut scores = SkillScores::uniform(0);
            scores.set(Skill::Eq, raw);
            scores.set(Skill::Learning, 10 - raw);
            let normalized = normalize(&scores);
            for (skill, value) in normalized.iter() {
                assert_eq!(value, scores.get(skill) * 10);
            }
        }
    }
}
