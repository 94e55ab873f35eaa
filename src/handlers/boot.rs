//! # Boot API Handlers
//!
//! Launch an instance from an image, snapshot or volume.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::handlers::types::{InstanceResponse, json_object};
use crate::lifecycle::{LifecycleService, requests};
use crate::server::AppState;

async fn boot(
    state: &AppState,
    identity_id: Uuid,
    path_volume_id: Option<&str>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<InstanceResponse>), ApiError> {
    let body = json_object(payload)?;
    let request = requests::parse_boot_volume(body, path_volume_id)?;
    let instance = LifecycleService::from_state(state)
        .boot(identity_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(instance.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/identities/{identity_id}/volumes/boot",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    request_body(content = serde_json::Value, description = "name, size and one of image_id, snapshot_id, volume_id; other fields go to the provider", example = json!({
        "name": "analysis-vm",
        "size": "m1.small",
        "image_id": "img-ubuntu-22"
    })),
    responses(
        (status = 201, description = "Instance launched", body = InstanceResponse),
        (status = 400, description = "Missing fields or no boot source", body = ApiError),
        (status = 404, description = "Source or size not found", body = ApiError)
    ),
    tag = "instances"
)]
pub async fn boot_instance(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<InstanceResponse>), ApiError> {
    boot(&state, identity_id, None, payload).await
}

/// Boot using the volume in the path unless the body names another source
#[utoipa::path(
    post,
    path = "/api/v1/identities/{identity_id}/volumes/{volume_id}/boot",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("volume_id" = String, Path, description = "Provider volume id")
    ),
    request_body(content = serde_json::Value, description = "name, size; image_id or snapshot_id override the path volume"),
    responses(
        (status = 201, description = "Instance launched", body = InstanceResponse),
        (status = 400, description = "Missing fields", body = ApiError),
        (status = 404, description = "Source or size not found", body = ApiError)
    ),
    tag = "instances"
)]
pub async fn boot_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, volume_id)): Path<(Uuid, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<InstanceResponse>), ApiError> {
    boot(&state, identity_id, Some(&volume_id), payload).await
}
