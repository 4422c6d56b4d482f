use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::config::ModelConfig;
use crate::error::{ReportError, Result};
use crate::form::FormSubmission;
use crate::report::ReportRequest;

/// Anything that can turn a [`ReportRequest`] into schema-shaped JSON text.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, form: &FormSubmission, request: &ReportRequest) -> Result<String>;
}

/// Calls the Gemini `generateContent` endpoint directly.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ReportError::Config(
                "API key is not configured: set the API_KEY environment variable".to_string(),
            )
        })?;
        Self::new(
            config.api_base.clone(),
            api_key,
            config.model.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn new(api_base: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ReportError::Config(format!("failed to build model client: {}", err)))?;
        Ok(Self {
            client,
            api_key,
            api_base,
            model,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_content(
        &self,
        system_instruction: &str,
        user_content: &str,
        schema: &Value,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.model)
        );
        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user_content }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let detail = api_error_message(&error_body).unwrap_or_else(|| error_body.trim().to_string());
            error!(%status, "model API returned an error");
            if detail.is_empty() {
                return Err(ReportError::ModelRequestFailure(format!(
                    "model API error: {}",
                    status
                )));
            }
            return Err(ReportError::ModelRequestFailure(friendly_error(&detail)));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|err| {
            ReportError::ModelRequestFailure(format!("model response parse failed: {}", err))
        })?;
        debug!(
            model = %self.model,
            latency_ms = started.elapsed().as_millis() as u64,
            "model responded"
        );

        if let Some(reason) = body
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            error!(block_reason = reason, "model blocked the prompt");
            return Err(ReportError::ModelRequestFailure(format!(
                "The AI service blocked the request due to content safety policies. Reason: {}. Please modify your input and try again.",
                reason
            )));
        }

        let text: String = body
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ReportError::ModelRequestFailure(
                "The AI service returned an empty response. This may be due to a content safety filter. Please check your inputs.".to_string(),
            ));
        }
        Ok(text)
    }

    fn transport_error(&self, err: reqwest::Error) -> ReportError {
        if err.is_timeout() {
            return ReportError::GenerationTimeout(self.timeout);
        }
        ReportError::ModelRequestFailure(format!("model request failed: {}", err))
    }
}

#[async_trait]
impl ReportBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, _form: &FormSubmission, request: &ReportRequest) -> Result<String> {
        self.generate_content(&request.system_instruction, &request.user_content, &request.schema)
            .await
    }
}

/// Sends the request through a credential-holding relay server.
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ReportError::Config(format!("failed to build relay client: {}", err)))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl ReportBackend for RelayClient {
    fn name(&self) -> &str {
        "relay"
    }

    async fn generate(&self, form: &FormSubmission, request: &ReportRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let body = RelayRequest {
            form_data: form,
            system_instruction: &request.system_instruction,
            user_content: &request.user_content,
            schema: &request.schema,
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ReportError::GenerationTimeout(self.timeout)
                } else {
                    ReportError::ModelRequestFailure(format!("relay request failed: {}", err))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| {
            ReportError::ModelRequestFailure(format!("relay response read failed: {}", err))
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<RelayError>(&text)
                .ok()
                .map(|body| body.error)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(ReportError::ModelRequestFailure(message));
        }
        Ok(text)
    }
}

/// Request body accepted by the relay's `/api/generate`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    form_data: &'a FormSubmission,
    system_instruction: &'a str,
    user_content: &'a str,
    schema: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayError {
    pub error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

fn friendly_error(message: &str) -> String {
    let lowered = message.to_lowercase();
    if lowered.contains("api key not valid") {
        "The API key configured on the server is invalid. Please check the API_KEY environment variable.".to_string()
    } else if lowered.contains("permission denied") {
        "The API key is missing necessary permissions, or the generative language API is not enabled for the project.".to_string()
    } else if lowered.contains("billing") {
        "There is a billing issue with the model provider account. Please ensure billing is enabled.".to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let message = api_error_message(body).unwrap();
        assert!(friendly_error(&message).contains("invalid"));
        assert!(api_error_message("upstream exploded").is_none());
    }

    #[test]
    fn passes_unknown_errors_through() {
        assert_eq!(friendly_error("quota exceeded"), "quota exceeded");
    }

    #[test]
    fn request_body_uses_generate_content_shape() {
        let schema = serde_json::json!({ "type": "OBJECT" });
        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: "sys" }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: "hi" }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &schema,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }
}
