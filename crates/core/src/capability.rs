//! Capability provider contract and registry.
//!
//! The engine never performs a task's actual work; it looks up a provider by
//! task type and invokes it through this interface. Providers are registered
//! once at startup, and an unregistered type is a typed error rather than a
//! lookup fault.

use crate::error::{CapabilityError, EngineError};
use crate::types::{TaskConfig, TaskType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One classification prediction, confidence already thresholded and rounded
/// by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Acknowledgement returned by the email capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub recipient: String,
    /// Transport-level acknowledgement, e.g. the SMTP reply code.
    pub response: String,
}

/// Type-specific output of one capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CapabilityOutput {
    /// Plain text (summarization).
    Text(String),
    /// Ranked predictions (classification), provider order preserved.
    Predictions(Vec<Prediction>),
    /// Matched element texts per selector (scraping).
    Elements(BTreeMap<String, Vec<String>>),
    /// Delivery acknowledgement (email).
    Delivery(DeliveryReceipt),
}

impl CapabilityOutput {
    /// JSON form used when routing this output into a downstream task's
    /// config. Text stays a plain string; structured outputs propagate
    /// verbatim as JSON values.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Predictions(predictions) => {
                serde_json::to_value(predictions).unwrap_or_default()
            }
            Self::Elements(elements) => serde_json::to_value(elements).unwrap_or_default(),
            Self::Delivery(receipt) => serde_json::to_value(receipt).unwrap_or_default(),
        }
    }

    /// Human-readable form used in execution log messages.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Delivery(receipt) => {
                format!("email accepted for {} ({})", receipt.recipient, receipt.response)
            }
            other => other.to_value().to_string(),
        }
    }
}

/// Performs the actual work for one task type.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// The task type this provider serves.
    fn task_type(&self) -> TaskType;

    /// Invoke the capability with a fully resolved task config.
    async fn invoke(&self, config: &TaskConfig) -> Result<CapabilityOutput, CapabilityError>;
}

/// Maps task types to capability providers, resolved once at startup.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    providers: HashMap<TaskType, Arc<dyn CapabilityProvider>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own task type, replacing any previous
    /// registration for that type.
    pub fn register(&mut self, provider: Arc<dyn CapabilityProvider>) {
        self.providers.insert(provider.task_type(), provider);
    }

    /// Look up the provider for a task type.
    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn CapabilityProvider>> {
        self.providers.get(&task_type)
    }

    /// Invoke the provider registered for `task_type`.
    pub async fn invoke(
        &self,
        task_type: TaskType,
        config: &TaskConfig,
    ) -> Result<CapabilityOutput, EngineError> {
        let provider = self
            .get(task_type)
            .ok_or(EngineError::UnsupportedTaskType { task_type })?;

        provider
            .invoke(config)
            .await
            .map_err(|source| EngineError::Capability { task_type, source })
    }
}
