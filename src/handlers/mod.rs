//! # API Handlers
//!
//! HTTP endpoint handlers for the Atmosphere API.

pub mod actions;
pub mod boot;
pub mod identities;
pub mod machine_requests;
pub mod snapshots;
pub mod types;
pub mod volumes;

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::health_check;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    /// Registered provider slugs
    pub providers: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service and database are healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "root"
)]
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let providers = state.clouds.slugs();
    match health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
                providers,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    database: "unavailable".to_string(),
                    providers,
                }),
            )
        }
    }
}
