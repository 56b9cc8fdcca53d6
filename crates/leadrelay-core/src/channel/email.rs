//! SMTP email adapter.
//!
//! Campaign templates are delivered as plain-text mail through a relay.
//! SMTP reply text decides whether a failure is retried: 4xx-style
//! replies are transient, 5xx-style replies are permanent.

use super::{ChannelAdapter, ChannelError, OutboundMessage};
use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use leadrelay_common::config::SmtpConfig;
use std::time::Duration;
use uuid::Uuid;

pub struct EmailAdapter {
    config: SmtpConfig,
}

impl EmailAdapter {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ChannelError> {
        let mut builder = if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| {
                    ChannelError::Transient(format!("Failed to create SMTP transport: {}", e))
                })?
                .port(self.config.port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
                .port(self.config.port)
        };

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.timeout(Some(Duration::from_secs(30))).build())
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<String, ChannelError> {
        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| ChannelError::Permanent(format!("Invalid from address: {}", e)))?;
        let to = message
            .to
            .parse()
            .map_err(|e| ChannelError::Permanent(format!("Invalid recipient address: {}", e)))?;

        let msg_id = format!("<{}.{}@leadrelay>", Uuid::new_v4(), Utc::now().timestamp());

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(&message.template_name)
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Hi {},\n\n[{}]\n",
                message.lead_name, message.template_name
            ))
            .map_err(|e| ChannelError::Permanent(format!("Failed to build email: {}", e)))?;

        let mailer = self.build_transport()?;

        match mailer.send(email).await {
            Ok(response) => {
                tracing::debug!(to = %message.to, "Email sent: {:?}", response);
                Ok(msg_id)
            }
            Err(e) => Err(classify_smtp_error(e.to_string())),
        }
    }
}

/// Map an SMTP error string onto the retry taxonomy
fn classify_smtp_error(error_str: String) -> ChannelError {
    if error_str.contains("5.1.1")
        || error_str.contains("550")
        || error_str.contains("User unknown")
        || error_str.contains("does not exist")
    {
        ChannelError::Permanent(error_str)
    } else if error_str.contains("temporarily")
        || error_str.contains("try again")
        || error_str.contains("421")
        || error_str.contains("450")
        || error_str.contains("451")
        || error_str.contains("452")
    {
        ChannelError::Transient(error_str)
    } else {
        // Unknown errors (connection refused, timeouts) are worth a retry
        ChannelError::Transient(error_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_bounce_is_permanent() {
        let err = classify_smtp_error("550 5.1.1 User unknown".to_string());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_greylisting_is_transient() {
        let err = classify_smtp_error("451 4.7.1 try again later".to_string());
        assert!(err.is_transient());
    }

    #[test]
    fn test_connection_failure_is_transient() {
        let err = classify_smtp_error("Connection refused".to_string());
        assert!(err.is_transient());
    }
}
