//! WhatsApp Cloud API adapter.
//!
//! Sends pre-approved template messages through the Graph API. Template
//! rendering happens on Meta's side; we reference the template by name
//! and pass the lead's display name as the body parameter.

use super::{ChannelAdapter, ChannelError, OutboundMessage};
use async_trait::async_trait;
use leadrelay_common::config::WhatsAppConfig;
use std::time::Duration;

pub struct WhatsAppAdapter {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppAdapter {
    pub fn new(config: WhatsAppConfig) -> leadrelay_common::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                leadrelay_common::Error::Channel(format!(
                    "Failed to build WhatsApp HTTP client: {e}"
                ))
            })?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppAdapter {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<String, ChannelError> {
        if self.config.access_token.is_empty() || self.config.phone_number_id.is_empty() {
            return Err(ChannelError::Permanent(
                "WhatsApp channel not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/{}/messages",
            self.config.api_base, self.config.phone_number_id
        );

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": message.to,
            "type": "template",
            "template": {
                "name": message.template_name,
                "language": { "code": "en" },
                "components": [{
                    "type": "body",
                    "parameters": [{ "type": "text", "text": message.lead_name }]
                }]
            }
        });

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.access_token),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Transient(format!("WhatsApp API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = format!("WhatsApp API error {status}: {error_text}");
            // 429 and 5xx are worth retrying; other 4xx means the request
            // itself is bad (invalid number, unapproved template)
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(ChannelError::Transient(detail))
            } else {
                Err(ChannelError::Permanent(detail))
            };
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChannelError::Transient(format!("Invalid WhatsApp response: {e}")))?;

        let msg_id = result["messages"][0]["id"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(to = %message.to, message_id = %msg_id, "WhatsApp template sent");
        Ok(msg_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: String) -> WhatsAppConfig {
        WhatsAppConfig {
            access_token: "test-token".to_string(),
            phone_number_id: "555001".to_string(),
            api_base,
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage {
            to: "+15550001111".to_string(),
            lead_name: "Dana".to_string(),
            template_id: "tpl-welcome".to_string(),
            template_name: "welcome_day_1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_template_and_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/555001/messages"))
            .and(bearer_token("test-token"))
            .and(body_partial_json(serde_json::json!({
                "to": "+15550001111",
                "type": "template",
                "template": { "name": "welcome_day_1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{ "id": "wamid.abc123" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri())).unwrap();
        let msg_id = adapter.send(&message()).await.unwrap();
        assert_eq!(msg_id, "wamid.abc123");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri())).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri())).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_bad_request_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "template not approved" }
            })))
            .mount(&server)
            .await;

        let adapter = WhatsAppAdapter::new(config(server.uri())).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("template not approved"));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_permanent() {
        let adapter = WhatsAppAdapter::new(WhatsAppConfig::default()).unwrap();
        let err = adapter.send(&message()).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
