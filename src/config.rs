use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::scoring::{PersonaConfig, TopSkillConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_base: String,
    pub model: String,
    pub timeout_ms: u64,
    /// Only ever populated from the environment, never written to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout_ms: 60_000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of a relay server; when set, reports are generated through it.
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub sheet_endpoint: String,
    pub email_list_endpoint: String,
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            sheet_endpoint: "https://script.google.com/macros/s/.../exec".to_string(),
            email_list_endpoint: "https://your.aweber.integration.url".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub web_root: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            web_root: "dist".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: TopSkillConfig,
    pub persona: PersonaConfig,
    pub model: ModelConfig,
    pub relay: RelayConfig,
    pub webhooks: WebhookConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = path.or_else(default_config_path);
        let mut config = match config_path.as_ref() {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => AppConfig::default(),
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| ReportError::Config(format!("failed to read config: {}", err)))?;
        toml::from_str(&contents).map_err(|err| {
            ReportError::Config(format!("failed to parse {}: {}", path.display(), err))
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                ReportError::Config(format!("failed to create config dir: {}", err))
            })?;
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| ReportError::Config(format!("failed to serialize config: {}", err)))?;
        std::fs::write(path, payload)
            .map_err(|err| ReportError::Config(format!("failed to write config: {}", err)))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        let api_key = env::var("API_KEY").or_else(|_| env::var("GEMINI_API_KEY"));
        if let Ok(key) = api_key {
            if !key.trim().is_empty() {
                self.model.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(model) = env::var("MODEL_NAME") {
            if !model.trim().is_empty() {
                self.model.model = model;
            }
        }
        if let Ok(timeout) = env::var("MODEL_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.model.timeout_ms = value;
            }
        }
        if let Ok(endpoint) = env::var("RELAY_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.relay.endpoint = Some(endpoint);
            }
        }
        if let Ok(endpoint) = env::var("SHEET_WEBHOOK_URL") {
            if !endpoint.trim().is_empty() {
                self.webhooks.sheet_endpoint = endpoint;
            }
        }
        if let Ok(endpoint) = env::var("EMAIL_LIST_WEBHOOK_URL") {
            if !endpoint.trim().is_empty() {
                self.webhooks.email_list_endpoint = endpoint;
            }
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(value) = port.parse::<u16>() {
                self.server.port = value;
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("PERSONA_REPORT_CONFIG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/persona-report.toml")))
}
