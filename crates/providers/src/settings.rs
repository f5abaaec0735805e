use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the built-in capability providers.
///
/// Loaded from a TOML file when one exists, otherwise defaults; API keys
/// and the SMTP password fall back to environment variables so they stay
/// out of config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default = "EndpointSettings::summarizer_default")]
    pub summarizer: EndpointSettings,

    #[serde(default = "EndpointSettings::classifier_default")]
    pub classifier: EndpointSettings,

    #[serde(default)]
    pub smtp: SmtpSettings,
}

/// Shared HTTP client settings for the network-backed providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("pipeweld/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// A hosted model endpoint with optional bearer auth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl EndpointSettings {
    fn summarizer_default() -> Self {
        Self {
            url: "https://api-inference.huggingface.co/models/facebook/bart-large-cnn"
                .to_string(),
            api_key: None,
        }
    }

    fn classifier_default() -> Self {
        Self {
            url: "https://api-inference.huggingface.co/models/google/vit-base-patch16-224"
                .to_string(),
            api_key: None,
        }
    }
}

/// SMTP relay settings for the email provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Sender mailbox, e.g. `Pipeweld <noreply@example.com>`.
    #[serde(default)]
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: String::new(),
        }
    }
}

impl ProviderSettings {
    /// Load settings from a TOML file if it exists, otherwise use defaults,
    /// then fill secrets from the environment.
    pub fn load(config_path: &Path) -> Result<Self> {
        let mut settings: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read provider settings file")?;
            toml::from_str(&content).context("Failed to parse provider settings file")?
        } else {
            tracing::info!("provider settings file not found, using defaults");
            Self::defaults()
        };

        if settings.summarizer.api_key.is_none() {
            settings.summarizer.api_key = std::env::var("PIPEWELD_INFERENCE_API_KEY").ok();
        }
        if settings.classifier.api_key.is_none() {
            settings.classifier.api_key = std::env::var("PIPEWELD_INFERENCE_API_KEY").ok();
        }
        if settings.smtp.password.is_empty() {
            if let Ok(password) = std::env::var("PIPEWELD_SMTP_PASSWORD") {
                settings.smtp.password = password;
            }
        }

        Ok(settings)
    }

    /// Defaults with the hosted endpoints filled in.
    pub fn defaults() -> Self {
        Self {
            http: HttpSettings::default(),
            summarizer: EndpointSettings::summarizer_default(),
            classifier: EndpointSettings::classifier_default(),
            smtp: SmtpSettings::default(),
        }
    }
}
