//! Image classification capability backed by a hosted classifier model.

use crate::settings::{EndpointSettings, HttpSettings};
use crate::{http_client, transport};
use async_trait::async_trait;
use pipeweld_core::capability::{CapabilityOutput, CapabilityProvider, Prediction};
use pipeweld_core::error::CapabilityError;
use pipeweld_core::types::{TaskConfig, TaskType};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

pub struct ClassifyProvider {
    endpoint: EndpointSettings,
    client: reqwest::Client,
}

impl ClassifyProvider {
    pub fn new(endpoint: EndpointSettings, http: &HttpSettings) -> Result<Self, CapabilityError> {
        Ok(Self {
            endpoint,
            client: http_client(http)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

/// Prediction as the model endpoint reports it, before filtering.
#[derive(Debug, Deserialize)]
pub struct RawPrediction {
    pub label: String,
    pub score: f64,
}

/// Keep predictions at or above the threshold, round confidences to three
/// decimal places, and preserve the model's own ranking.
pub fn filter_predictions(raw: Vec<RawPrediction>, threshold: f64) -> Vec<Prediction> {
    raw.into_iter()
        .filter(|p| p.score >= threshold)
        .map(|p| Prediction {
            label: p.label,
            confidence: (p.score * 1000.0).round() / 1000.0,
        })
        .collect()
}

#[async_trait]
impl CapabilityProvider for ClassifyProvider {
    fn task_type(&self) -> TaskType {
        TaskType::Classification
    }

    async fn invoke(&self, config: &TaskConfig) -> Result<CapabilityOutput, CapabilityError> {
        let image_url = config
            .text("image_url")
            .filter(|u| !u.trim().is_empty())
            .ok_or(CapabilityError::EmptyInput { field: "image_url" })?;
        let threshold = config
            .number("confidence_threshold")
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);

        tracing::info!(%image_url, threshold, "classifying image");

        let mut builder = self
            .client
            .post(&self.endpoint.url)
            .json(&ClassifyRequest { inputs: &image_url });
        if let Some(api_key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let raw: Vec<RawPrediction> = response.json().await.map_err(transport)?;
        Ok(CapabilityOutput::Predictions(filter_predictions(
            raw, threshold,
        )))
    }
}
