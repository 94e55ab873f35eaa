//! # Snapshot API Handlers

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::handlers::types::{SnapshotResponse, VolumeResponse, json_object};
use crate::lifecycle::{LifecycleService, requests};
use crate::server::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}/volumes/snapshot",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Snapshots visible to the identity", body = [SnapshotResponse]),
        (status = 404, description = "Identity not found", body = ApiError)
    ),
    tag = "snapshots"
)]
pub async fn list_snapshots(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
) -> Result<Json<Vec<SnapshotResponse>>, ApiError> {
    let snapshots = LifecycleService::from_state(&state)
        .list_snapshots(identity_id)
        .await?;
    Ok(Json(snapshots.into_iter().map(SnapshotResponse::from).collect()))
}

/// Snapshot a volume, then create a new volume from the snapshot
#[utoipa::path(
    post,
    path = "/api/v1/identities/{identity_id}/volumes/snapshot",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    request_body(content = serde_json::Value, description = "display_name, volume_id, size, optional description, snapshot_id, metadata", example = json!({
        "display_name": "copy-of-data",
        "volume_id": "vol-00000001",
        "size": 10
    })),
    responses(
        (status = 201, description = "Volume created from the snapshot", body = VolumeResponse),
        (status = 400, description = "Missing fields, volume not available, or snapshot not found", body = ApiError),
        (status = 404, description = "Source volume not found", body = ApiError),
        (status = 413, description = "Provider quota exceeded", body = ApiError)
    ),
    tag = "snapshots"
)]
pub async fn create_snapshot_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<VolumeResponse>), ApiError> {
    let body = json_object(payload)?;
    let request = requests::parse_snapshot_volume(&body)?;
    let volume = LifecycleService::from_state(&state)
        .create_snapshot_volume(identity_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(volume.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}/volumes/snapshot/{snapshot_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("snapshot_id" = String, Path, description = "Provider snapshot id")
    ),
    responses(
        (status = 200, description = "Snapshot", body = SnapshotResponse),
        (status = 404, description = "Snapshot not found", body = ApiError)
    ),
    tag = "snapshots"
)]
pub async fn get_snapshot(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, snapshot_id)): Path<(Uuid, String)>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let snapshot = LifecycleService::from_state(&state)
        .get_snapshot(identity_id, &snapshot_id)
        .await?;
    Ok(Json(snapshot.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/identities/{identity_id}/volumes/snapshot/{snapshot_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("snapshot_id" = String, Path, description = "Provider snapshot id")
    ),
    responses(
        (status = 204, description = "Snapshot deleted"),
        (status = 404, description = "Snapshot not found", body = ApiError)
    ),
    tag = "snapshots"
)]
pub async fn delete_snapshot(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, snapshot_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, ApiError> {
    LifecycleService::from_state(&state)
        .delete_snapshot(identity_id, &snapshot_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
