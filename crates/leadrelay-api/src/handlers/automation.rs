//! Stage-transition automation handler
//!
//! The single-send entry point used when a lead moves into a stage with
//! automation enabled. Bypasses campaigns and the dispatcher: the caller
//! has already decided, and the approval flag says whether to send.

use axum::{extract::State, http::StatusCode, Json};
use leadrelay_common::types::{Channel, LeadId};
use leadrelay_core::SingleSendOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{error_response, validation_error, ErrorResponse};
use crate::routes::AppState;

/// Request body for a single automation send
#[derive(Debug, Deserialize)]
pub struct SingleSendRequest {
    pub lead_id: LeadId,
    pub template_id: String,
    pub template_name: String,
    /// "whatsapp" or "email"
    pub channel: String,
    pub approved: bool,
}

/// Single send response
#[derive(Debug, Serialize)]
pub struct SingleSendResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Send one template to one lead immediately
///
/// POST /api/v1/automation/send
pub async fn send_single(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SingleSendRequest>,
) -> Result<Json<SingleSendResponse>, (StatusCode, Json<ErrorResponse>)> {
    let channel: Channel = request
        .channel
        .parse()
        .map_err(|e: leadrelay_common::Error| validation_error(e.to_string()))?;

    let outcome = state
        .manager
        .send_single(
            request.lead_id,
            request.template_id,
            request.template_name,
            channel,
            request.approved,
        )
        .await
        .map_err(error_response)?;

    let response = match outcome {
        SingleSendOutcome::NotApproved => SingleSendResponse {
            status: "skipped".to_string(),
            message_id: None,
        },
        SingleSendOutcome::Sent { message_id } => SingleSendResponse {
            status: "sent".to_string(),
            message_id: Some(message_id),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn test_deserialize_single_send_request() {
        let lead_id = Uuid::new_v4();
        let json = format!(
            r#"{{
                "lead_id": "{lead_id}",
                "template_id": "tpl-1",
                "template_name": "stage_welcome",
                "channel": "whatsapp",
                "approved": true
            }}"#
        );

        let request: SingleSendRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.lead_id, lead_id);
        assert!(request.approved);
    }

    #[test]
    fn test_skipped_response_omits_message_id() {
        let response = SingleSendResponse {
            status: "skipped".to_string(),
            message_id: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "skipped" }));
    }
}
