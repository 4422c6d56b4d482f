pub mod normalize;
pub mod persona;
pub mod pipeline;
pub mod top_skills;

pub use normalize::{normalize, NORMALIZATION_FACTOR};
pub use persona::{
    PersonaConfig, PersonaMatch, PersonaResolution, PersonaResolver, PersonaRule, DEFAULT_PERSONA,
};
pub use pipeline::{DerivedProfile, ScoringPipeline};
pub use top_skills::{DominantSkillSet, TopSkillConfig, TopSkillSelector};
