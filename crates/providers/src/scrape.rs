//! Web scraping capability: fetch a page and extract text per CSS selector.

use crate::settings::HttpSettings;
use crate::{http_client, transport};
use async_trait::async_trait;
use pipeweld_core::capability::{CapabilityOutput, CapabilityProvider};
use pipeweld_core::error::CapabilityError;
use pipeweld_core::types::{TaskConfig, TaskType};
use scraper::{Html, Selector};
use std::collections::BTreeMap;

pub struct ScrapeProvider {
    client: reqwest::Client,
}

impl ScrapeProvider {
    pub fn new(http: &HttpSettings) -> Result<Self, CapabilityError> {
        Ok(Self {
            client: http_client(http)?,
        })
    }
}

#[async_trait]
impl CapabilityProvider for ScrapeProvider {
    fn task_type(&self) -> TaskType {
        TaskType::Scraping
    }

    async fn invoke(&self, config: &TaskConfig) -> Result<CapabilityOutput, CapabilityError> {
        let url = config
            .text("url")
            .filter(|u| !u.trim().is_empty())
            .ok_or(CapabilityError::EmptyInput { field: "url" })?;
        let selectors = config.string_list("selectors");
        if selectors.is_empty() {
            return Err(CapabilityError::EmptyInput { field: "selectors" });
        }

        tracing::info!(%url, selector_count = selectors.len(), "scraping page");

        let response = self.client.get(&url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            // A non-2xx page is a failure, never a silent empty result.
            return Err(CapabilityError::Endpoint {
                status: status.as_u16(),
                message: format!("GET {url} failed"),
            });
        }

        let body = response.text().await.map_err(transport)?;
        let matches = extract_selectors(&body, &selectors)?;
        Ok(CapabilityOutput::Elements(matches))
    }
}

/// Extract the trimmed text of every element matching each selector.
fn extract_selectors(
    html: &str,
    selectors: &[String],
) -> Result<BTreeMap<String, Vec<String>>, CapabilityError> {
    let document = Html::parse_document(html);
    let mut matches = BTreeMap::new();

    for raw in selectors {
        let selector =
            Selector::parse(raw).map_err(|e| CapabilityError::InvalidSelector {
                selector: raw.clone(),
                message: e.to_string(),
            })?;
        let texts: Vec<String> = document
            .select(&selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect();
        matches.insert(raw.clone(), texts);
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><body>
            <h1>  Ocean  </h1>
            <p>First paragraph.</p>
            <p>Second <b>bold</b> paragraph.</p>
        </body></html>
    "#;

    fn config(value: serde_json::Value) -> TaskConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_trims_and_flattens_text() {
        let selectors = vec!["h1".to_string(), "p".to_string()];
        let matches = extract_selectors(PAGE, &selectors).unwrap();

        assert_eq!(matches["h1"], vec!["Ocean"]);
        assert_eq!(
            matches["p"],
            vec!["First paragraph.", "Second bold paragraph."]
        );
    }

    #[test]
    fn test_selector_without_matches_yields_empty_list() {
        let matches = extract_selectors(PAGE, &["table".to_string()]).unwrap();
        assert_eq!(matches["table"], Vec::<String>::new());
    }

    #[test]
    fn test_bad_selector_is_rejected() {
        let err = extract_selectors(PAGE, &["p[".to_string()]).unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidSelector { .. }));
    }

    #[tokio::test]
    async fn test_scrape_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let provider = ScrapeProvider::new(&HttpSettings::default()).unwrap();
        let output = provider
            .invoke(&config(json!({
                "url": format!("{}/article", server.uri()),
                "selectors": ["h1"],
            })))
            .await
            .unwrap();

        assert_eq!(
            output,
            CapabilityOutput::Elements(BTreeMap::from([(
                "h1".to_string(),
                vec!["Ocean".to_string()]
            )]))
        );
    }

    #[tokio::test]
    async fn test_non_2xx_response_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = ScrapeProvider::new(&HttpSettings::default()).unwrap();
        let err = provider
            .invoke(&config(json!({
                "url": format!("{}/missing", server.uri()),
                "selectors": ["h1"],
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, CapabilityError::Endpoint { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_blank_url_rejected_before_any_request() {
        let provider = ScrapeProvider::new(&HttpSettings::default()).unwrap();
        let err = provider
            .invoke(&config(json!({"url": " ", "selectors": ["h1"]})))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::EmptyInput { field: "url" }));
    }
}
