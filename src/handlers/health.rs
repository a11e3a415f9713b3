use super::AppState;
use crate::models::HealthStatus;
use axum::{extract::State, Json};
use chrono::Utc;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let provider_reachable = state.provider.get_current_block_height().await.is_ok();

    let status = if provider_reachable {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.network.to_string(),
        provider: state.provider.name().to_string(),
        provider_reachable,
        rate_limit: state.provider.rate_limit_status(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
