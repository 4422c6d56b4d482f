use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("report generation timed out after {}ms", .0.as_millis())]
    GenerationTimeout(Duration),

    #[error("{0}")]
    ModelRequestFailure(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("report schema is missing required field: {0}")]
    InvalidSchema(String),

    #[error("submission superseded by a newer one")]
    Superseded,

    #[error("config error: {0}")]
    Config(String),
}

impl ReportError {
    /// Whether the caller should offer a plain "try again".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReportError::GenerationTimeout(_) | ReportError::ModelRequestFailure(_)
        )
    }
}

/// Webhook failures are logged and dropped, never returned to a submitter.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("webhook request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("webhook {endpoint} answered {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
