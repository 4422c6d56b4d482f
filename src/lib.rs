pub mod config;
pub mod error;
pub mod form;
pub mod generator;
pub mod llm;
pub mod report;
pub mod scoring;
pub mod webhooks;

pub use config::AppConfig;
pub use error::{ReportError, Result};
pub use form::{
    AgeBracket, Budget, FormSubmission, Market, NormalizedScores, Skill, SkillScores, Workstyle,
};
pub use generator::{GeneratedReport, GenerationStage, ReportGenerator, SubmissionSlot};
pub use report::{Report, ReportRequest, ReportSnapshot};
pub use scoring::{DerivedProfile, DominantSkillSet, ScoringPipeline};

/// Scores a submission offline, without contacting the model.
pub fn derive_profile(form: &FormSubmission, config: &AppConfig) -> Result<DerivedProfile> {
    form.validate()?;
    ScoringPipeline::from_config(config).score(&form.scores)
}
