//! Request handlers

pub mod automation;
pub mod campaigns;
pub mod health;

use axum::http::StatusCode;
use axum::Json;
use leadrelay_core::CampaignError;
use serde::Serialize;

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Map an engine error onto the HTTP taxonomy
pub(crate) fn error_response(e: CampaignError) -> (StatusCode, Json<ErrorResponse>) {
    let common: leadrelay_common::Error = e.into();
    let status =
        StatusCode::from_u16(common.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", common);
    }
    (
        status,
        Json(ErrorResponse {
            error: common.code().to_lowercase(),
            message: common.to_string(),
        }),
    )
}

/// A 422 for a request that parsed but fails a structural rule
pub(crate) fn validation_error(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: "validation_error".to_string(),
            message: message.into(),
        }),
    )
}
