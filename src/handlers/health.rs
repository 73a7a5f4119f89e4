use crate::{db, handlers::AppState, ApiResponse, ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use utoipa::ToSchema;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub database: ComponentStatus,
    pub database_latency_ms: u64,
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses((status = 200, description = "Service is running", body = ApiResponse<StatusResponse>)),
    tag = "system"
)]
pub async fn api_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    Ok(Json(ApiResponse::success(StatusResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })))
}

/// Readiness: the service is only up when the database answers.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Health report", body = ApiResponse<HealthResponse>)),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let start = Instant::now();
    let database = match db::check_connection(&state.db).await {
        Ok(()) => ComponentStatus::Up,
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            ComponentStatus::Down
        }
    };
    Ok(Json(ApiResponse::success(HealthResponse {
        status: database,
        database,
        database_latency_ms: start.elapsed().as_millis() as u64,
        uptime_secs: uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })))
}
