//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use leadrelay_common::types::{parse_send_time, AudienceRule, CampaignId, Channel, LeadId};
use leadrelay_core::{NewCampaign, NewCampaignTemplate, SchedulePreviewEntry};
use leadrelay_storage::models::{
    Campaign, CampaignStatus, Enrollment, MessageStatus, ScheduleMode, ScheduledMessage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{error_response, validation_error, ErrorResponse};
use crate::routes::AppState;

/// Request body for creating a campaign, shaped by the UI layer
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub campaign_name: String,
    /// "whatsapp" or "email"
    pub campaign_type: String,
    pub send_to_all: bool,
    #[serde(default)]
    pub stage_ids: Vec<String>,
    #[serde(default)]
    pub source_ids: Vec<String>,
    pub use_custom_dates: bool,
    pub campaign_duration_days: Option<i32>,
    pub message_limit: i32,
    /// "HH:MM"
    pub send_time: String,
    pub send_on_weekends: bool,
    pub templates: Vec<TemplateRequest>,
}

/// One template position in the request
#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub template_id: String,
    pub template_name: String,
    pub sequence_order: i32,
    pub custom_date: Option<NaiveDate>,
}

impl CreateCampaignRequest {
    /// Parse the wire shape into engine input
    fn into_new_campaign(self) -> Result<NewCampaign, String> {
        let channel: Channel = self
            .campaign_type
            .parse()
            .map_err(|e: leadrelay_common::Error| e.to_string())?;

        let send_time = parse_send_time(&self.send_time).map_err(|e| e.to_string())?;

        let audience_rule = if self.send_to_all {
            AudienceRule::all_leads()
        } else {
            AudienceRule::matching(
                self.stage_ids.into_iter().collect(),
                self.source_ids.into_iter().collect(),
            )
        };

        let schedule_mode = if self.use_custom_dates {
            ScheduleMode::Custom
        } else {
            ScheduleMode::Duration
        };

        Ok(NewCampaign {
            name: self.campaign_name,
            channel,
            audience_rule,
            schedule_mode,
            duration_days: self.campaign_duration_days,
            message_limit: self.message_limit,
            send_time,
            send_on_weekends: self.send_on_weekends,
            templates: self
                .templates
                .into_iter()
                .map(|t| NewCampaignTemplate {
                    template_id: t.template_id,
                    template_name: t.template_name,
                    sequence_order: t.sequence_order,
                    custom_date: t.custom_date,
                })
                .collect(),
        })
    }
}

/// Campaign creation response
#[derive(Debug, Serialize)]
pub struct CreateCampaignResponse {
    pub message: String,
    pub campaign_id: CampaignId,
    pub schedule_preview: Vec<SchedulePreviewEntry>,
}

/// Campaign response
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: CampaignId,
    pub name: String,
    pub channel: String,
    pub schedule_mode: String,
    pub duration_days: Option<i32>,
    pub message_limit: i32,
    pub send_time: String,
    pub send_on_weekends: bool,
    pub status: String,
    pub total_enrolled: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name,
            channel: c.channel,
            schedule_mode: c.schedule_mode,
            duration_days: c.duration_days,
            message_limit: c.message_limit,
            send_time: c.send_time.format("%H:%M").to_string(),
            send_on_weekends: c.send_on_weekends,
            status: c.status,
            total_enrolled: c.total_enrolled,
            created_at: c.created_at,
            completed_at: c.completed_at,
        }
    }
}

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Campaign list response
#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub limit: i64,
    pub offset: i64,
}

/// Scheduled message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub lead_id: LeadId,
    pub sequence_order: i32,
    pub template_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<ScheduledMessage> for MessageResponse {
    fn from(m: ScheduledMessage) -> Self {
        Self {
            id: m.id,
            lead_id: m.lead_id,
            sequence_order: m.sequence_order,
            template_name: m.template_name,
            scheduled_at: m.scheduled_at,
            status: m.status,
            attempt_count: m.attempt_count,
            last_error: m.last_error,
            sent_at: m.sent_at,
        }
    }
}

/// Enrollment response
#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub lead_id: LeadId,
    pub enrolled_at: DateTime<Utc>,
    pub messages_sent_count: i32,
    pub status: String,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            lead_id: e.lead_id,
            enrolled_at: e.enrolled_at,
            messages_sent_count: e.messages_sent_count,
            status: e.status,
        }
    }
}

/// Create a campaign
///
/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CreateCampaignResponse>), (StatusCode, Json<ErrorResponse>)> {
    let input = request.into_new_campaign().map_err(validation_error)?;

    let created = state
        .manager
        .create_campaign(input)
        .await
        .map_err(error_response)?;

    let response = CreateCampaignResponse {
        message: format!(
            "Campaign \"{}\" created, enrolled {} leads",
            created.campaign.name, created.campaign.total_enrolled
        ),
        campaign_id: created.campaign.id,
        schedule_preview: created.schedule_preview,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// List campaigns
///
/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = match &query.status {
        Some(s) => Some(
            s.parse::<CampaignStatus>()
                .map_err(|e| validation_error(e))?,
        ),
        None => None,
    };

    let campaigns = state
        .manager
        .list_campaigns(status, query.limit, query.offset)
        .await
        .map_err(error_response)?;

    Ok(Json(CampaignListResponse {
        data: campaigns.into_iter().map(CampaignResponse::from).collect(),
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Get a campaign
///
/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state
        .manager
        .get_campaign(campaign_id)
        .await
        .map_err(error_response)?;

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Cancel a campaign
///
/// POST /api/v1/campaigns/:campaign_id/cancel
pub async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state
        .manager
        .cancel_campaign(campaign_id)
        .await
        .map_err(error_response)?;

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Campaign progress stats
///
/// GET /api/v1/campaigns/:campaign_id/stats
pub async fn get_campaign_stats(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<leadrelay_core::CampaignStats>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state
        .manager
        .stats(campaign_id)
        .await
        .map_err(error_response)?;

    Ok(Json(stats))
}

/// Query parameters for listing a campaign's messages
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// List a campaign's scheduled messages
///
/// GET /api/v1/campaigns/:campaign_id/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let status = match &query.status {
        Some(s) => Some(
            s.parse::<MessageStatus>()
                .map_err(|e| validation_error(e))?,
        ),
        None => None,
    };

    let messages = state
        .manager
        .list_messages(campaign_id, status, query.limit, query.offset)
        .await
        .map_err(error_response)?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

/// List a campaign's enrollments
///
/// GET /api/v1/campaigns/:campaign_id/enrollments
pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<EnrollmentResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let enrollments = state
        .manager
        .list_enrollments(campaign_id, query.limit, query.offset)
        .await
        .map_err(error_response)?;

    Ok(Json(
        enrollments
            .into_iter()
            .map(EnrollmentResponse::from)
            .collect(),
    ))
}

/// Cancel one lead's enrollment in a campaign
///
/// POST /api/v1/campaigns/:campaign_id/leads/:lead_id/cancel
pub async fn cancel_lead(
    State(state): State<Arc<AppState>>,
    Path((campaign_id, lead_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .manager
        .cancel_lead(campaign_id, lead_id)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_create_request() {
        let json = r#"{
            "campaign_name": "Spring outreach",
            "campaign_type": "whatsapp",
            "send_to_all": false,
            "stage_ids": ["stage-new", "stage-warm"],
            "source_ids": [],
            "use_custom_dates": false,
            "campaign_duration_days": 14,
            "message_limit": 3,
            "send_time": "09:30",
            "send_on_weekends": false,
            "templates": [
                { "template_id": "t1", "template_name": "Hello", "sequence_order": 1 },
                { "template_id": "t2", "template_name": "Follow up", "sequence_order": 2 }
            ]
        }"#;

        let request: CreateCampaignRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.campaign_name, "Spring outreach");
        assert_eq!(request.templates.len(), 2);
        assert_eq!(request.templates[1].sequence_order, 2);
        assert!(request.templates[0].custom_date.is_none());

        let input = request.into_new_campaign().unwrap();
        assert_eq!(input.channel, Channel::Whatsapp);
        assert_eq!(input.schedule_mode, ScheduleMode::Duration);
        assert_eq!(input.duration_days, Some(14));
        assert!(!input.audience_rule.all);
        assert_eq!(input.audience_rule.stage_ids.len(), 2);
        assert_eq!(
            input.send_time,
            chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_custom_dates_request_maps_to_custom_mode() {
        let json = r#"{
            "campaign_name": "Event series",
            "campaign_type": "email",
            "send_to_all": true,
            "use_custom_dates": true,
            "message_limit": 2,
            "send_time": "10:00",
            "send_on_weekends": true,
            "templates": [
                { "template_id": "t1", "template_name": "Invite", "sequence_order": 1,
                  "custom_date": "2026-09-01" }
            ]
        }"#;

        let request: CreateCampaignRequest = serde_json::from_str(json).unwrap();
        let input = request.into_new_campaign().unwrap();
        assert_eq!(input.schedule_mode, ScheduleMode::Custom);
        assert!(input.audience_rule.all);
        assert_eq!(
            input.templates[0].custom_date,
            NaiveDate::from_ymd_opt(2026, 9, 1)
        );
    }

    #[test]
    fn test_bad_channel_and_time_are_rejected() {
        let base = r#"{
            "campaign_name": "x",
            "campaign_type": "sms",
            "send_to_all": true,
            "use_custom_dates": false,
            "campaign_duration_days": 7,
            "message_limit": 1,
            "send_time": "09:00",
            "send_on_weekends": false,
            "templates": []
        }"#;
        let request: CreateCampaignRequest = serde_json::from_str(base).unwrap();
        assert!(request.into_new_campaign().is_err());

        let bad_time = base.replace("\"sms\"", "\"email\"").replace("09:00", "9am");
        let request: CreateCampaignRequest = serde_json::from_str(&bad_time).unwrap();
        assert!(request.into_new_campaign().is_err());
    }
}
