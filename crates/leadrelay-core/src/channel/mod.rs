//! Channel adapters - outbound message transport
//!
//! The dispatcher hands a claimed message to exactly one adapter; the
//! adapter renders the channel-side template and reports the outcome as
//! transient (retryable) or permanent.

mod email;
mod whatsapp;

pub use email::EmailAdapter;
pub use whatsapp::WhatsAppAdapter;

use async_trait::async_trait;
use leadrelay_common::config::{SmtpConfig, WhatsAppConfig};
use leadrelay_common::types::{Channel, TemplateId};
use thiserror::Error;

/// Send failure classification.
///
/// Transient failures are retried with backoff up to the attempt cap;
/// permanent failures mark the message failed immediately.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("transient channel failure: {0}")]
    Transient(String),

    #[error("permanent channel failure: {0}")]
    Permanent(String),
}

impl ChannelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Transient(_))
    }
}

/// One message handed to a channel adapter
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Channel address: phone number for WhatsApp, email address otherwise
    pub to: String,
    /// Lead display name, available to the channel for rendering
    pub lead_name: String,
    pub template_id: TemplateId,
    pub template_name: String,
}

/// An outbound messaging channel
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel name for logging
    fn name(&self) -> &'static str;

    /// Render and send the template to the given address.
    /// Returns the channel-side message ID on success.
    async fn send(&self, message: &OutboundMessage) -> Result<String, ChannelError>;
}

/// The set of configured channel adapters, one per supported channel
pub struct ChannelSet {
    whatsapp: Box<dyn ChannelAdapter>,
    email: Box<dyn ChannelAdapter>,
}

impl ChannelSet {
    /// Build the adapter set from configuration
    pub fn from_config(
        whatsapp: &WhatsAppConfig,
        smtp: &SmtpConfig,
    ) -> leadrelay_common::Result<Self> {
        Ok(Self {
            whatsapp: Box::new(WhatsAppAdapter::new(whatsapp.clone())?),
            email: Box::new(EmailAdapter::new(smtp.clone())),
        })
    }

    /// Build from explicit adapters (tests)
    pub fn new(whatsapp: Box<dyn ChannelAdapter>, email: Box<dyn ChannelAdapter>) -> Self {
        Self { whatsapp, email }
    }

    /// The adapter serving the given channel
    pub fn adapter_for(&self, channel: Channel) -> &dyn ChannelAdapter {
        match channel {
            Channel::Whatsapp => self.whatsapp.as_ref(),
            Channel::Email => self.email.as_ref(),
        }
    }
}
