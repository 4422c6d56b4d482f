use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use persona_report::llm::RelayError;
use persona_report::scoring::PersonaMatch;
use persona_report::{
    DerivedProfile, FormSubmission, GeneratedReport, NormalizedScores, Report, ReportError,
    SkillScores,
};

/// Body of `POST /api/generate`. Fields are optional so a missing one can be
/// answered with the relay's own error message instead of a rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayGenerateRequest {
    pub form_data: Option<Value>,
    pub system_instruction: Option<String>,
    pub user_content: Option<String>,
    pub schema: Option<Value>,
}

pub struct RelayPayload {
    pub system_instruction: String,
    pub user_content: String,
    pub schema: Value,
}

impl RelayGenerateRequest {
    pub fn into_payload(self) -> Option<RelayPayload> {
        let present = |value: &Option<Value>| value.as_ref().map_or(false, |v| !v.is_null());
        if !present(&self.form_data) || !present(&self.schema) {
            return None;
        }
        let system_instruction = self.system_instruction.filter(|s| !s.trim().is_empty())?;
        let user_content = self.user_content.filter(|s| !s.trim().is_empty())?;
        Some(RelayPayload {
            system_instruction,
            user_content,
            schema: self.schema?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiPersonaRequest {
    pub scores: SkillScores,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPersonaResponse {
    pub scores: NormalizedScores,
    pub top_skills: Vec<&'static str>,
    pub persona: String,
    pub matched_by: PersonaMatch,
}

impl ApiPersonaResponse {
    pub fn from_profile(profile: DerivedProfile) -> Self {
        Self {
            scores: profile.normalized,
            top_skills: profile.dominant.keys(),
            persona: profile.persona,
            matched_by: profile.matched_by,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReportRequest {
    pub request_id: Option<String>,
    /// Submissions sharing a session id supersede each other.
    pub session_id: Option<String>,
    pub form_data: Value,
}

impl ApiReportRequest {
    pub fn form(&self) -> Result<FormSubmission, String> {
        serde_json::from_value(self.form_data.clone())
            .map_err(|err| format!("invalid form data: {}", err))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReportResponse {
    pub request_id: String,
    pub persona: String,
    pub top_skills: Vec<&'static str>,
    pub report: Report,
}

impl ApiReportResponse {
    pub fn from_generated(generated: GeneratedReport, request_id: String) -> Self {
        Self {
            request_id,
            persona: generated.profile.persona,
            top_skills: generated.profile.dominant.keys(),
            report: generated.report,
        }
    }
}

pub fn error_body(message: impl Into<String>) -> RelayError {
    RelayError {
        error: message.into(),
    }
}

pub fn error_status(err: &ReportError) -> StatusCode {
    match err {
        ReportError::Validation(_) => StatusCode::BAD_REQUEST,
        ReportError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ReportError::ModelRequestFailure(_) | ReportError::MalformedResponse(_) => {
            StatusCode::BAD_GATEWAY
        }
        ReportError::Superseded => StatusCode::CONFLICT,
        ReportError::InvalidSchema(_) | ReportError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
