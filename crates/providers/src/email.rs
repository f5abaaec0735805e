//! Email delivery capability over SMTP.

use crate::settings::SmtpSettings;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pipeweld_core::capability::{CapabilityOutput, CapabilityProvider, DeliveryReceipt};
use pipeweld_core::error::CapabilityError;
use pipeweld_core::types::{TaskConfig, TaskType};

pub struct EmailProvider {
    settings: SmtpSettings,
}

impl EmailProvider {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, CapabilityError> {
        if self.settings.host.trim().is_empty() {
            return Err(CapabilityError::InvalidConfig(
                "smtp host is not configured".to_string(),
            ));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.host)
            .map_err(|e| CapabilityError::Delivery(e.to_string()))?
            .port(self.settings.port);

        if !self.settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl CapabilityProvider for EmailProvider {
    fn task_type(&self) -> TaskType {
        TaskType::Email
    }

    async fn invoke(&self, config: &TaskConfig) -> Result<CapabilityOutput, CapabilityError> {
        let recipient = config
            .text("recipient")
            .filter(|r| !r.trim().is_empty())
            .ok_or(CapabilityError::EmptyInput { field: "recipient" })?;
        let subject = config
            .text("subject")
            .filter(|s| !s.trim().is_empty())
            .ok_or(CapabilityError::EmptyInput { field: "subject" })?;
        let body = config
            .text("body")
            .filter(|b| !b.trim().is_empty())
            .ok_or(CapabilityError::EmptyInput { field: "body" })?;

        let from: Mailbox = self.settings.from.parse().map_err(|e| {
            CapabilityError::InvalidConfig(format!(
                "bad sender address {:?}: {e}",
                self.settings.from
            ))
        })?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| CapabilityError::InvalidAddress {
                address: recipient.clone(),
                message: format!("{e}"),
            })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject.clone())
            .body(body)
            .map_err(|e| CapabilityError::Delivery(e.to_string()))?;

        tracing::info!(%recipient, %subject, "sending email");

        // Transport failures (auth, connection) fail the task; no retry.
        let transport = self.build_transport()?;
        let response = transport
            .send(message)
            .await
            .map_err(|e| CapabilityError::Delivery(e.to_string()))?;

        Ok(CapabilityOutput::Delivery(DeliveryReceipt {
            recipient,
            response: response.code().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> TaskConfig {
        serde_json::from_value(value).unwrap()
    }

    fn provider() -> EmailProvider {
        EmailProvider::new(SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "secret".to_string(),
            from: "Pipeweld <noreply@example.com>".to_string(),
        })
    }

    #[tokio::test]
    async fn test_each_required_field_must_be_non_empty() {
        let provider = provider();

        for missing in ["recipient", "subject", "body"] {
            let mut full = config(json!({
                "recipient": "ops@example.com",
                "subject": "digest",
                "body": "text",
            }));
            full.insert(missing, json!(""));

            let err = provider.invoke(&full).await.unwrap_err();
            assert!(
                matches!(err, CapabilityError::EmptyInput { field } if field == missing),
                "expected EmptyInput for {missing}"
            );
        }
    }

    #[tokio::test]
    async fn test_unparseable_recipient_rejected_before_connecting() {
        let provider = provider();
        let err = provider
            .invoke(&config(json!({
                "recipient": "not an address",
                "subject": "digest",
                "body": "text",
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, CapabilityError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_missing_host_is_a_config_error() {
        let provider = EmailProvider::new(SmtpSettings {
            from: "Pipeweld <noreply@example.com>".to_string(),
            ..Default::default()
        });

        let err = provider
            .invoke(&config(json!({
                "recipient": "ops@example.com",
                "subject": "digest",
                "body": "text",
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidConfig(_)));
    }
}
