use serde::Serialize;

use crate::config::AppConfig;
use crate::error::Result;
use crate::form::{NormalizedScores, SkillScores};
use crate::scoring::{
    normalize, DominantSkillSet, PersonaMatch, PersonaResolver, TopSkillSelector,
};

/// Everything derived locally from the raw ratings, before any model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedProfile {
    pub normalized: NormalizedScores,
    pub dominant: DominantSkillSet,
    pub persona: String,
    pub matched_by: PersonaMatch,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringPipeline {
    selector: TopSkillSelector,
    resolver: PersonaResolver,
}

impl ScoringPipeline {
    pub fn new(selector: TopSkillSelector, resolver: PersonaResolver) -> Self {
        Self { selector, resolver }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            TopSkillSelector::new(config.scoring.clone()),
            PersonaResolver::new(config.persona.clone()),
        )
    }

    /// Rejects ratings outside 0..=10 instead of scoring them.
    pub fn score(&self, scores: &SkillScores) -> Result<DerivedProfile> {
        scores.check_range()?;
        let normalized = normalize(scores);
        let dominant = self.selector.select(&normalized);
        let resolution = self.resolver.resolve_detailed(&dominant);
        Ok(DerivedProfile {
            normalized,
            dominant,
            persona: resolution.persona,
            matched_by: resolution.matched_by,
        })
    }
}
