//! Row models for LeadRelay storage

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use leadrelay_common::types::{AudienceRule, CampaignId, Channel, LeadId, TemplateId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A lead record, owned by the external identity store.
///
/// Only the columns the engine needs are modeled: targeting attributes for
/// the audience resolver and contact addresses for the channel adapters.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub stage_id: Option<String>,
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Contact address for the given channel, if the lead has one
    pub fn address_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Whatsapp => self.phone.as_deref(),
            Channel::Email => self.email.as_deref(),
        }
    }
}

/// Campaign schedule mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Even spacing across a duration in days
    Duration,
    /// Explicit per-template dates
    Custom,
}

impl std::fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleMode::Duration => write!(f, "duration"),
            ScheduleMode::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for ScheduleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duration" => Ok(ScheduleMode::Duration),
            "custom" => Ok(ScheduleMode::Custom),
            other => Err(format!("Unknown schedule mode: {}", other)),
        }
    }
}

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Active => write!(f, "active"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CampaignStatus::Active),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(format!("Unknown campaign status: {}", other)),
        }
    }
}

/// Campaign row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub channel: String,
    pub audience_rule: serde_json::Value,
    pub schedule_mode: String,
    pub duration_days: Option<i32>,
    pub message_limit: i32,
    pub send_time: NaiveTime,
    pub send_on_weekends: bool,
    pub status: String,
    pub total_enrolled: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Get channel enum
    pub fn channel_enum(&self) -> Option<Channel> {
        self.channel.parse().ok()
    }

    /// Get the audience rule this campaign was created with
    pub fn audience_rule(&self) -> Option<AudienceRule> {
        serde_json::from_value(self.audience_rule.clone()).ok()
    }
}

/// Campaign template row: one ordered position in the message sequence
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignTemplate {
    pub campaign_id: CampaignId,
    pub template_id: TemplateId,
    pub template_name: String,
    pub sequence_order: i32,
    pub custom_date: Option<NaiveDate>,
}

/// Enrollment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "active"),
            EnrollmentStatus::Completed => write!(f, "completed"),
            EnrollmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "completed" => Ok(EnrollmentStatus::Completed),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(format!("Unknown enrollment status: {}", other)),
        }
    }
}

/// Enrollment row: one lead's participation in one campaign
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub enrolled_at: DateTime<Utc>,
    pub messages_sent_count: i32,
    pub status: String,
}

impl Enrollment {
    /// Get status enum
    pub fn status_enum(&self) -> Option<EnrollmentStatus> {
        self.status.parse().ok()
    }
}

/// Scheduled message status.
///
/// Transitions are forward-only: pending -> claimed -> sent | failed,
/// claimed -> pending (retry), pending -> skipped (cancellation).
/// sent, failed, and skipped are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Claimed,
    Sent,
    Failed,
    Skipped,
}

impl MessageStatus {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Failed | MessageStatus::Skipped
        )
    }

    /// Whether a transition to `next` is allowed by the state machine
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        match (self, next) {
            (MessageStatus::Pending, MessageStatus::Claimed) => true,
            (MessageStatus::Pending, MessageStatus::Skipped) => true,
            (MessageStatus::Claimed, MessageStatus::Sent) => true,
            (MessageStatus::Claimed, MessageStatus::Failed) => true,
            (MessageStatus::Claimed, MessageStatus::Pending) => true,
            (MessageStatus::Claimed, MessageStatus::Skipped) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Claimed => write!(f, "claimed"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "claimed" => Ok(MessageStatus::Claimed),
            "sent" => Ok(MessageStatus::Sent),
            "failed" => Ok(MessageStatus::Failed),
            "skipped" => Ok(MessageStatus::Skipped),
            other => Err(format!("Unknown message status: {}", other)),
        }
    }
}

/// Scheduled message row: one (lead, template position) send obligation
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: Uuid,
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub sequence_order: i32,
    pub template_id: TemplateId,
    pub template_name: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledMessage {
    /// Get status enum
    pub fn status_enum(&self) -> Option<MessageStatus> {
        self.status.parse().ok()
    }
}

/// Create campaign input
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub name: String,
    pub channel: Channel,
    pub audience_rule: AudienceRule,
    pub schedule_mode: ScheduleMode,
    pub duration_days: Option<i32>,
    pub message_limit: i32,
    pub send_time: NaiveTime,
    pub send_on_weekends: bool,
}

/// Create campaign template input
#[derive(Debug, Clone)]
pub struct CreateTemplate {
    pub template_id: TemplateId,
    pub template_name: String,
    pub sequence_order: i32,
    pub custom_date: Option<NaiveDate>,
}

/// Create enrollment input
#[derive(Debug, Clone)]
pub struct CreateEnrollment {
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
}

/// Create scheduled message input
#[derive(Debug, Clone)]
pub struct CreateScheduledMessage {
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub sequence_order: i32,
    pub template_id: TemplateId,
    pub template_name: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_at: DateTime<Utc>,
    pub max_attempts: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "claimed", "sent", "failed", "skipped"] {
            let status: MessageStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("bounced".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        let all = [
            MessageStatus::Pending,
            MessageStatus::Claimed,
            MessageStatus::Sent,
            MessageStatus::Failed,
            MessageStatus::Skipped,
        ];
        for terminal in [MessageStatus::Sent, MessageStatus::Failed, MessageStatus::Skipped] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(MessageStatus::Pending.can_transition_to(MessageStatus::Claimed));
        assert!(MessageStatus::Pending.can_transition_to(MessageStatus::Skipped));
        assert!(MessageStatus::Claimed.can_transition_to(MessageStatus::Sent));
        assert!(MessageStatus::Claimed.can_transition_to(MessageStatus::Failed));
        // retry reverts to pending
        assert!(MessageStatus::Claimed.can_transition_to(MessageStatus::Pending));
        // no resurrection
        assert!(!MessageStatus::Sent.can_transition_to(MessageStatus::Pending));
        assert!(!MessageStatus::Pending.can_transition_to(MessageStatus::Sent));
    }

    #[test]
    fn test_lead_address_for_channel() {
        let lead = Lead {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            phone: Some("+15550100".to_string()),
            email: None,
            stage_id: Some("stage-new".to_string()),
            source_id: None,
            created_at: Utc::now(),
        };
        assert_eq!(lead.address_for(Channel::Whatsapp), Some("+15550100"));
        assert_eq!(lead.address_for(Channel::Email), None);
    }
}
