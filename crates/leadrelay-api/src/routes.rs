//! API routes

use axum::{
    routing::{get, post},
    Router,
};
use leadrelay_core::CampaignManager;
use leadrelay_storage::DatabasePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{automation, campaigns, health};

/// Shared handler state
pub struct AppState {
    pub db_pool: DatabasePool,
    pub manager: CampaignManager,
}

/// Create the API router
pub fn create_router(db_pool: DatabasePool, manager: CampaignManager) -> Router {
    let state = Arc::new(AppState { db_pool, manager });

    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    let campaign_routes = Router::new()
        .route("/", get(campaigns::list_campaigns))
        .route("/", post(campaigns::create_campaign))
        .route("/:campaign_id", get(campaigns::get_campaign))
        .route("/:campaign_id/cancel", post(campaigns::cancel_campaign))
        .route("/:campaign_id/stats", get(campaigns::get_campaign_stats))
        .route("/:campaign_id/messages", get(campaigns::list_messages))
        .route("/:campaign_id/enrollments", get(campaigns::list_enrollments))
        .route(
            "/:campaign_id/leads/:lead_id/cancel",
            post(campaigns::cancel_lead),
        );

    let automation_routes = Router::new().route("/send", post(automation::send_single));

    let api_v1 = Router::new()
        .nest("/campaigns", campaign_routes)
        .nest("/automation", automation_routes);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
