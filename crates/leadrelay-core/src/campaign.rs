//! Campaign Manager - creation, cancellation, stats, and single sends
//!
//! Orchestrates the creation pipeline: validate input, compute the
//! calendar, resolve the audience snapshot, materialize the enrollment
//! cross-product, and persist everything in one transaction.

use crate::audience::AudienceResolver;
use crate::channel::{ChannelSet, OutboundMessage};
use crate::enrollment::plan_enrollments;
use crate::schedule::{build_preview, compute_schedule, ScheduleError, SchedulePreviewEntry};
use chrono::{NaiveDate, NaiveTime, Utc};
use leadrelay_common::types::{AudienceRule, CampaignId, Channel, LeadId, TemplateId};
use leadrelay_storage::models::{
    Campaign, CampaignStatus, CreateCampaign, CreateTemplate, Enrollment, MessageStatus,
    ScheduleMode, ScheduledMessage,
};
use leadrelay_storage::repository::{
    CampaignMessageCounts, CampaignRepository, EnrollmentRepository, LeadRepository,
    ScheduledMessageRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Campaign operation errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Audience rule matched no leads")]
    EmptyAudience,

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl From<CampaignError> for leadrelay_common::Error {
    fn from(e: CampaignError) -> Self {
        match e {
            CampaignError::EmptyAudience => {
                leadrelay_common::Error::Validation("Audience rule matched no leads".to_string())
            }
            CampaignError::InvalidSchedule(err) => {
                leadrelay_common::Error::Validation(err.to_string())
            }
            CampaignError::Validation(msg) => leadrelay_common::Error::Validation(msg),
            CampaignError::NotFound(msg) => leadrelay_common::Error::NotFound(msg),
            CampaignError::Database(err) => leadrelay_common::Error::Database(err.to_string()),
            CampaignError::Channel(msg) => leadrelay_common::Error::Channel(msg),
        }
    }
}

/// New campaign input, already parsed by the API layer
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub channel: Channel,
    pub audience_rule: AudienceRule,
    pub schedule_mode: ScheduleMode,
    pub duration_days: Option<i32>,
    pub message_limit: i32,
    pub send_time: NaiveTime,
    pub send_on_weekends: bool,
    pub templates: Vec<NewCampaignTemplate>,
}

/// One template position in a new campaign
#[derive(Debug, Clone)]
pub struct NewCampaignTemplate {
    pub template_id: TemplateId,
    pub template_name: String,
    pub sequence_order: i32,
    pub custom_date: Option<NaiveDate>,
}

impl NewCampaignTemplate {
    fn to_create(&self) -> CreateTemplate {
        CreateTemplate {
            template_id: self.template_id.clone(),
            template_name: self.template_name.clone(),
            sequence_order: self.sequence_order,
            custom_date: self.custom_date,
        }
    }
}

/// A created campaign plus the preview handed back to the caller
#[derive(Debug, Clone)]
pub struct CampaignCreated {
    pub campaign: Campaign,
    pub schedule_preview: Vec<SchedulePreviewEntry>,
}

/// Campaign progress stats
#[derive(Debug, Clone, serde::Serialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub status: String,
    pub total_enrolled: i32,
    pub enrollments_completed: i64,
    pub enrollments_cancelled: i64,
    pub messages: CampaignMessageCounts,
}

/// Outcome of an automation single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleSendOutcome {
    /// The approval flag was false; nothing was sent
    NotApproved,
    /// Delivered, with the channel-side message ID
    Sent { message_id: String },
}

/// Campaign manager
#[derive(Clone)]
pub struct CampaignManager {
    audience: AudienceResolver,
    campaigns: CampaignRepository,
    enrollments: EnrollmentRepository,
    messages: ScheduledMessageRepository,
    leads: LeadRepository,
    channels: Arc<ChannelSet>,
    max_attempts: i32,
}

impl CampaignManager {
    /// Create a new campaign manager
    pub fn new(pool: PgPool, channels: Arc<ChannelSet>, max_attempts: i32) -> Self {
        Self {
            audience: AudienceResolver::new(pool.clone()),
            campaigns: CampaignRepository::new(pool.clone()),
            enrollments: EnrollmentRepository::new(pool.clone()),
            messages: ScheduledMessageRepository::new(pool.clone()),
            leads: LeadRepository::new(pool),
            channels,
            max_attempts,
        }
    }

    /// Create a campaign: compute the calendar, snapshot the audience, and
    /// materialize every scheduled message up front.
    pub async fn create_campaign(
        &self,
        input: NewCampaign,
    ) -> Result<CampaignCreated, CampaignError> {
        validate_new_campaign(&input)?;

        let templates: Vec<CreateTemplate> =
            input.templates.iter().map(|t| t.to_create()).collect();

        // Today in UTC anchors duration offsets and bounds custom dates
        let reference = Utc::now().date_naive();
        let calendar = compute_schedule(
            &templates,
            input.schedule_mode,
            input.duration_days,
            input.send_on_weekends,
            reference,
        )?;

        let audience = self.audience.resolve(&input.audience_rule).await?;
        if audience.is_empty() {
            return Err(CampaignError::EmptyAudience);
        }

        let campaign_id = uuid::Uuid::new_v4();
        let (enrollments, messages) = plan_enrollments(
            campaign_id,
            &audience,
            &templates,
            &calendar,
            input.message_limit,
            input.send_time,
            self.max_attempts,
        );

        let schedule_preview = build_preview(&templates, &calendar);

        let campaign = self
            .campaigns
            .create_full(
                campaign_id,
                CreateCampaign {
                    name: input.name,
                    channel: input.channel,
                    audience_rule: input.audience_rule,
                    schedule_mode: input.schedule_mode,
                    duration_days: input.duration_days,
                    message_limit: input.message_limit,
                    send_time: input.send_time,
                    send_on_weekends: input.send_on_weekends,
                },
                templates,
                enrollments,
                messages,
            )
            .await?;

        info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            enrolled = campaign.total_enrolled,
            "Campaign created"
        );

        Ok(CampaignCreated {
            campaign,
            schedule_preview,
        })
    }

    /// Get a campaign by ID
    pub async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.campaigns
            .get(id)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {} not found", id)))
    }

    /// List campaigns, optionally filtered by status
    pub async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, CampaignError> {
        Ok(self.campaigns.list(status, limit, offset).await?)
    }

    /// List a campaign's scheduled messages
    pub async fn list_messages(
        &self,
        campaign_id: CampaignId,
        status: Option<MessageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ScheduledMessage>, CampaignError> {
        self.get_campaign(campaign_id).await?;
        Ok(self
            .messages
            .list_by_campaign(campaign_id, status, limit, offset)
            .await?)
    }

    /// List a campaign's enrollments
    pub async fn list_enrollments(
        &self,
        campaign_id: CampaignId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Enrollment>, CampaignError> {
        self.get_campaign(campaign_id).await?;
        Ok(self
            .enrollments
            .list_by_campaign(campaign_id, limit, offset)
            .await?)
    }

    /// Cancel an active campaign: skip every still-pending message.
    /// Already-claimed messages finish their in-flight attempt.
    pub async fn cancel_campaign(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        let campaign = self.get_campaign(id).await?;
        if campaign.status_enum() != Some(CampaignStatus::Active) {
            return Err(CampaignError::Validation(format!(
                "Campaign {} is not active",
                id
            )));
        }

        let skipped = self.messages.skip_pending_by_campaign(id).await?;
        let campaign = self
            .campaigns
            .update_status(id, CampaignStatus::Cancelled)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("Campaign {} not found", id)))?;

        info!(campaign_id = %id, skipped, "Campaign cancelled");
        Ok(campaign)
    }

    /// Cancel one lead's enrollment in a campaign
    pub async fn cancel_lead(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<(), CampaignError> {
        self.get_campaign(campaign_id).await?;

        if !self.enrollments.cancel(campaign_id, lead_id).await? {
            return Err(CampaignError::NotFound(format!(
                "No active enrollment for lead {} in campaign {}",
                lead_id, campaign_id
            )));
        }

        info!(%campaign_id, %lead_id, "Enrollment cancelled");
        Ok(())
    }

    /// Campaign progress stats
    pub async fn stats(&self, campaign_id: CampaignId) -> Result<CampaignStats, CampaignError> {
        let campaign = self.get_campaign(campaign_id).await?;
        let messages = self.messages.get_campaign_status_counts(campaign_id).await?;
        let enrollments_completed = self
            .enrollments
            .count_by_campaign(campaign_id, Some("completed"))
            .await?;
        let enrollments_cancelled = self
            .enrollments
            .count_by_campaign(campaign_id, Some("cancelled"))
            .await?;

        Ok(CampaignStats {
            campaign_id,
            status: campaign.status,
            total_enrolled: campaign.total_enrolled,
            enrollments_completed,
            enrollments_cancelled,
            messages,
        })
    }

    /// Automation single send: deliver one template to one lead right now,
    /// outside any campaign. A false approval flag is a no-op, not an error.
    pub async fn send_single(
        &self,
        lead_id: LeadId,
        template_id: TemplateId,
        template_name: String,
        channel: Channel,
        approved: bool,
    ) -> Result<SingleSendOutcome, CampaignError> {
        if !approved {
            info!(%lead_id, %template_id, "Single send not approved, skipping");
            return Ok(SingleSendOutcome::NotApproved);
        }

        let lead = self
            .leads
            .get(lead_id)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("Lead {} not found", lead_id)))?;

        let to = lead.address_for(channel).ok_or_else(|| {
            CampaignError::Validation(format!("Lead {} has no {} address", lead_id, channel))
        })?;

        let outbound = OutboundMessage {
            to: to.to_string(),
            lead_name: lead.name.clone(),
            template_id,
            template_name,
        };

        match self.channels.adapter_for(channel).send(&outbound).await {
            Ok(message_id) => {
                info!(%lead_id, %channel, %message_id, "Single send delivered");
                Ok(SingleSendOutcome::Sent { message_id })
            }
            Err(e) => {
                warn!(%lead_id, %channel, error = %e, "Single send failed");
                Err(CampaignError::Channel(e.to_string()))
            }
        }
    }
}

/// Structural checks that precede any store access
fn validate_new_campaign(input: &NewCampaign) -> Result<(), CampaignError> {
    if input.name.trim().is_empty() {
        return Err(CampaignError::Validation(
            "Campaign name must not be empty".to_string(),
        ));
    }
    if input.message_limit < 1 {
        return Err(CampaignError::Validation(
            "Message limit must be at least 1".to_string(),
        ));
    }
    input
        .audience_rule
        .validate()
        .map_err(|e| CampaignError::Validation(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn new_campaign() -> NewCampaign {
        NewCampaign {
            name: "Onboarding".to_string(),
            channel: Channel::Whatsapp,
            audience_rule: AudienceRule::all_leads(),
            schedule_mode: ScheduleMode::Duration,
            duration_days: Some(7),
            message_limit: 3,
            send_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            send_on_weekends: false,
            templates: vec![NewCampaignTemplate {
                template_id: "tpl-1".to_string(),
                template_name: "Welcome".to_string(),
                sequence_order: 1,
                custom_date: None,
            }],
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_input() {
        assert!(validate_new_campaign(&new_campaign()).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut input = new_campaign();
        input.name = "   ".to_string();
        assert!(matches!(
            validate_new_campaign(&input),
            Err(CampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_message_limit() {
        let mut input = new_campaign();
        input.message_limit = 0;
        assert!(matches!(
            validate_new_campaign(&input),
            Err(CampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_targeting_rule() {
        let mut input = new_campaign();
        input.audience_rule = AudienceRule::matching(BTreeSet::new(), BTreeSet::new());
        assert!(matches!(
            validate_new_campaign(&input),
            Err(CampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_error_maps_to_http_taxonomy() {
        let e: leadrelay_common::Error = CampaignError::EmptyAudience.into();
        assert_eq!(e.status_code(), 422);

        let e: leadrelay_common::Error =
            CampaignError::InvalidSchedule(ScheduleError::NoTemplates).into();
        assert_eq!(e.status_code(), 422);

        let e: leadrelay_common::Error =
            CampaignError::NotFound("Campaign x not found".to_string()).into();
        assert_eq!(e.status_code(), 404);

        let e: leadrelay_common::Error =
            CampaignError::Channel("timeout".to_string()).into();
        assert_eq!(e.status_code(), 502);
    }
}
