// Built-in capability providers for Pipeweld task types

pub mod classify;
pub mod email;
pub mod scrape;
pub mod settings;
pub mod summarize;

pub use classify::ClassifyProvider;
pub use email::EmailProvider;
pub use scrape::ScrapeProvider;
pub use settings::ProviderSettings;
pub use summarize::SummarizeProvider;

use pipeweld_core::capability::CapabilityRegistry;
use pipeweld_core::error::CapabilityError;
use std::sync::Arc;
use std::time::Duration;

/// Build the capability registry wired with every built-in provider.
pub fn registry(settings: &ProviderSettings) -> Result<CapabilityRegistry, CapabilityError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(ScrapeProvider::new(&settings.http)?));
    registry.register(Arc::new(SummarizeProvider::new(
        settings.summarizer.clone(),
        &settings.http,
    )?));
    registry.register(Arc::new(ClassifyProvider::new(
        settings.classifier.clone(),
        &settings.http,
    )?));
    registry.register(Arc::new(EmailProvider::new(settings.smtp.clone())));
    Ok(registry)
}

pub(crate) fn http_client(
    http: &settings::HttpSettings,
) -> Result<reqwest::Client, CapabilityError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(http.timeout_secs))
        .user_agent(http.user_agent.clone())
        .build()
        .map_err(|e| CapabilityError::InvalidConfig(e.to_string()))
}

pub(crate) fn transport(error: reqwest::Error) -> CapabilityError {
    CapabilityError::Transport(error.to_string())
}
