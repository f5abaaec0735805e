//! Text summarization capability backed by a hosted summarization model.

use crate::settings::{EndpointSettings, HttpSettings};
use crate::{http_client, transport};
use async_trait::async_trait;
use pipeweld_core::capability::{CapabilityOutput, CapabilityProvider};
use pipeweld_core::error::CapabilityError;
use pipeweld_core::types::{TaskConfig, TaskType};
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_LENGTH: u64 = 130;
const DEFAULT_MIN_LENGTH: u64 = 30;

pub struct SummarizeProvider {
    endpoint: EndpointSettings,
    client: reqwest::Client,
}

impl SummarizeProvider {
    pub fn new(endpoint: EndpointSettings, http: &HttpSettings) -> Result<Self, CapabilityError> {
        Ok(Self {
            endpoint,
            client: http_client(http)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    inputs: &'a str,
    parameters: SummarizeParameters,
}

#[derive(Debug, Serialize)]
struct SummarizeParameters {
    max_length: u64,
    min_length: u64,
}

#[derive(Debug, Deserialize)]
struct SummaryCandidate {
    summary_text: String,
}

#[async_trait]
impl CapabilityProvider for SummarizeProvider {
    fn task_type(&self) -> TaskType {
        TaskType::Summarization
    }

    async fn invoke(&self, config: &TaskConfig) -> Result<CapabilityOutput, CapabilityError> {
        let input = config
            .text("input_text")
            .filter(|t| !t.trim().is_empty())
            .ok_or(CapabilityError::EmptyInput { field: "input_text" })?;

        let request = SummarizeRequest {
            inputs: &input,
            parameters: SummarizeParameters {
                max_length: config.integer("max_length").unwrap_or(DEFAULT_MAX_LENGTH),
                min_length: config.integer("min_length").unwrap_or(DEFAULT_MIN_LENGTH),
            },
        };

        tracing::info!(chars = input.len(), "summarizing text");

        let mut builder = self.client.post(&self.endpoint.url).json(&request);
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

        let candidates: Vec<SummaryCandidate> = response.json().await.map_err(transport)?;
        let summary = candidates
            .into_iter()
            .next()
            .map(|c| c.summary_text)
            .ok_or_else(|| {
                CapabilityError::UnexpectedResponse(
                    "summarization endpoint returned no candidates".to_string(),
                )
            })?;

        Ok(CapabilityOutput::Text(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(value: serde_json::Value) -> TaskConfig {
        serde_json::from_value(value).unwrap()
    }

    async fn provider_for(server: &MockServer) -> SummarizeProvider {
        SummarizeProvider::new(
            EndpointSettings {
                url: format!("{}/summarize", server.uri()),
                api_key: Some("test-key".to_string()),
            },
            &HttpSettings::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_summarize_sends_bounds_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "inputs": "a long article",
                "parameters": {"max_length": 70, "min_length": 5},
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"summary_text": "short version"}])),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let output = provider
            .invoke(&config(json!({
                "input_text": "a long article",
                "max_length": 70,
                "min_length": 5,
            })))
            .await
            .unwrap();

        assert_eq!(output, CapabilityOutput::Text("short version".to_string()));
    }

    #[tokio::test]
    async fn test_length_bounds_default_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "parameters": {"max_length": 130, "min_length": 30},
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"summary_text": "s"}])),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let output = provider
            .invoke(&config(json!({"input_text": "text"})))
            .await
            .unwrap();
        assert_eq!(output, CapabilityOutput::Text("s".to_string()));
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_any_request() {
        let server = MockServer::start().await;
        let provider = provider_for(&server).await;

        let err = provider
            .invoke(&config(json!({"input_text": "   "})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CapabilityError::EmptyInput { field: "input_text" }
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .invoke(&config(json!({"input_text": "text"})))
            .await
            .unwrap_err();

        match err {
            CapabilityError::Endpoint { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "model loading");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let provider = provider_for(&server).await;
        let err = provider
            .invoke(&config(json!({"input_text": "text"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::UnexpectedResponse(_)));
    }
}
