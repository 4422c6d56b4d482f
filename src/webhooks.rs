use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;
use crate::error::{ReportError, Result, WebhookError};
use crate::report::ReportSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    SkippedPlaceholder,
    SkippedNoConsent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sheet: DeliveryStatus,
    pub email_list: DeliveryStatus,
}

#[derive(Serialize)]
struct Subscriber<'a> {
    email: &'a str,
    name: &'a str,
}

/// Best-effort forwarding of consented snapshots to the marketing endpoints.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    sheet_endpoint: String,
    email_list_endpoint: String,
}

impl WebhookDispatcher {
    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        Self::new(
            config.sheet_endpoint.clone(),
            config.email_list_endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn new(sheet_endpoint: String, email_list_endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ReportError::Config(format!("failed to build webhook client: {}", err)))?;
        Ok(Self {
            client,
            sheet_endpoint,
            email_list_endpoint,
        })
    }

    /// Spawns delivery and returns immediately. `None` when there is nothing to send.
    pub fn dispatch(&self, snapshot: ReportSnapshot) -> Option<JoinHandle<DeliveryReport>> {
        if !snapshot.consent {
            debug!("no consent, skipping webhooks");
            return None;
        }
        let dispatcher = self.clone();
        Some(tokio::spawn(async move { dispatcher.deliver(&snapshot).await }))
    }

    pub async fn deliver(&self, snapshot: &ReportSnapshot) -> DeliveryReport {
        if !snapshot.consent {
            return DeliveryReport {
                sheet: DeliveryStatus::SkippedNoConsent,
                email_list: DeliveryStatus::SkippedNoConsent,
            };
        }

        let subscriber = Subscriber {
            email: &snapshot.email,
            name: &snapshot.name,
        };
        let (sheet, email_list) = tokio::join!(
            self.post("sheet", &self.sheet_endpoint, snapshot),
            self.post("email list", &self.email_list_endpoint, &subscriber),
        );
        info!(
            subscriber = %subscriber_fingerprint(&snapshot.email),
            sheet = ?sheet,
            email_list = ?email_list,
            "webhook delivery finished"
        );
        DeliveryReport { sheet, email_list }
    }

    async fn post<T: Serialize + ?Sized>(&self, label: &str, endpoint: &str, payload: &T) -> DeliveryStatus {
        if is_placeholder(endpoint) {
            warn!(webhook = label, "endpoint is a placeholder, skipping");
            return DeliveryStatus::SkippedPlaceholder;
        }
        match self.send(endpoint, payload).await {
            Ok(()) => {
                info!(webhook = label, "webhook delivered");
                DeliveryStatus::Sent
            }
            Err(err) => {
                warn!(webhook = label, error = %err, "webhook delivery failed");
                DeliveryStatus::Failed(err.to_string())
            }
        }
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> std::result::Result<(), WebhookError> {
        let response = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|source| WebhookError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(WebhookError::Status {
                endpoint: endpoint.to_string(),
                status: response.status(),
            });
        }
        Ok(())
    }
}

/// Stable, non-reversible tag for correlating deliveries in logs without the address.
pub fn subscriber_fingerprint(email: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    format!("{:016x}", u64::from_be_bytes(bytes))
}

/// Unset or template URLs are never contacted.
pub fn is_placeholder(endpoint: &str) -> bool {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    lowered.contains("...")
        || lowered.contains("your.")
        || lowered.contains("your-")
        || lowered.contains("replace")
        || !(lowered.starts_with("http://") || lowered.starts_with("https://"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_placeholders() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("https://script.google.com/macros/s/AKfycby.../exec"));
        assert!(is_placeholder("https://your.aweber.integration.url"));
        assert!(is_placeholder("REPLACE_ME"));
        assert!(!is_placeholder("https://hook.us1.make.com/k71oy4mebyi2rhjukfe246y5nlcui6in"));
        assert!(!is_placeholder("http://127.0.0.1:9000/sheet"));
    }

    #[test]
    fn fingerprint_ignores_case_and_hides_address() {
        let tag = subscriber_fingerprint("Ada@Example.com ");
        assert_eq!(tag, subscriber_fingerprint("ada@example.com"));
        assert_eq!(tag.len(), 16);
        assert_ne!(tag, subscriber_fingerprint("grace@example.com"));
    }
}
