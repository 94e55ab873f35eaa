//! # Volume API Handlers
//!
//! Volume lifecycle endpoints scoped to an identity. The provider is the
//! source of truth; every response is the refreshed local mirror.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::{ApiError, LifecycleError};
use crate::handlers::types::{VolumeResponse, json_object};
use crate::lifecycle::{LifecycleService, requests};
use crate::repositories::VolumeChanges;
use crate::server::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}/volumes",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Volumes visible to the identity", body = [VolumeResponse]),
        (status = 401, description = "Unauthorized or provider rejected the identity", body = ApiError),
        (status = 404, description = "Identity not found", body = ApiError)
    ),
    tag = "volumes"
)]
pub async fn list_volumes(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
) -> Result<Json<Vec<VolumeResponse>>, ApiError> {
    let volumes = LifecycleService::from_state(&state)
        .list_volumes(identity_id)
        .await?;
    Ok(Json(volumes.into_iter().map(VolumeResponse::from).collect()))
}

/// Create a volume, optionally from an image or snapshot
#[utoipa::path(
    post,
    path = "/api/v1/identities/{identity_id}/volumes",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    request_body(content = serde_json::Value, description = "name, size (GB), optional description, image_id, snapshot_id, metadata", example = json!({
        "name": "scratch",
        "size": "10"
    })),
    responses(
        (status = 201, description = "Volume created", body = VolumeResponse),
        (status = 400, description = "Missing fields or invalid size", body = ApiError),
        (status = 401, description = "Provider rejected the identity", body = ApiError),
        (status = 404, description = "Image or snapshot not found", body = ApiError),
        (status = 413, description = "Provider quota exceeded", body = ApiError),
        (status = 500, description = "Provider failure", body = ApiError)
    ),
    tag = "volumes"
)]
pub async fn create_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<VolumeResponse>), ApiError> {
    let body = json_object(payload)?;
    let request = requests::parse_create_volume(&body)?;
    let volume = LifecycleService::from_state(&state)
        .create_volume(identity_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(volume.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}/volumes/{volume_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("volume_id" = String, Path, description = "Provider volume id")
    ),
    responses(
        (status = 200, description = "Volume", body = VolumeResponse),
        (status = 404, description = "Volume not found", body = ApiError)
    ),
    tag = "volumes"
)]
pub async fn get_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, volume_id)): Path<(Uuid, String)>,
) -> Result<Json<VolumeResponse>, ApiError> {
    let volume = LifecycleService::from_state(&state)
        .get_volume(identity_id, &volume_id)
        .await?;
    Ok(Json(volume.into()))
}

fn optional_text(body: &Map<String, Value>, key: &str) -> Result<Option<Option<String>>, LifecycleError> {
    match body.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(text)) => Ok(Some(Some(text.clone()))),
        Some(_) => Err(LifecycleError::Validation {
            message: format!("{} must be a string", key),
            details: Some(serde_json::json!({ key: ["Not a valid string."] })),
        }),
    }
}

/// Read the local fields a PATCH or PUT may change. `full` requires `name`.
fn volume_changes(body: &Map<String, Value>, full: bool) -> Result<VolumeChanges, LifecycleError> {
    if full {
        let missing = requests::missing_fields(body, &["name"]);
        if !missing.is_empty() {
            return Err(LifecycleError::MissingFields(missing));
        }
    }

    let name = match optional_text(body, "name")? {
        Some(Some(name)) if !name.trim().is_empty() => Some(name),
        Some(_) => {
            return Err(LifecycleError::Validation {
                message: "name may not be blank".to_string(),
                details: Some(serde_json::json!({ "name": ["This field may not be blank."] })),
            });
        }
        None => None,
    };

    let description = match optional_text(body, "description")? {
        // PUT clears an absent description
        None if full => Some(None),
        other => other,
    };

    Ok(VolumeChanges { name, description })
}

async fn update_volume(
    state: &AppState,
    identity_id: Uuid,
    volume_id: &str,
    payload: Result<Json<Value>, JsonRejection>,
    full: bool,
) -> Result<Json<VolumeResponse>, ApiError> {
    let body = json_object(payload)?;
    let changes = volume_changes(&body, full)?;
    let volume = LifecycleService::from_state(state)
        .update_volume(identity_id, volume_id, changes)
        .await?;
    Ok(Json(volume.into()))
}

/// Partially update local volume fields
#[utoipa::path(
    patch,
    path = "/api/v1/identities/{identity_id}/volumes/{volume_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("volume_id" = String, Path, description = "Provider volume id")
    ),
    request_body(content = serde_json::Value, description = "name and/or description"),
    responses(
        (status = 200, description = "Updated volume", body = VolumeResponse),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 404, description = "Volume not found", body = ApiError)
    ),
    tag = "volumes"
)]
pub async fn patch_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, volume_id)): Path<(Uuid, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<VolumeResponse>, ApiError> {
    update_volume(&state, identity_id, &volume_id, payload, false).await
}

/// Replace local volume fields
#[utoipa::path(
    put,
    path = "/api/v1/identities/{identity_id}/volumes/{volume_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("volume_id" = String, Path, description = "Provider volume id")
    ),
    request_body(content = serde_json::Value, description = "name (required) and description"),
    responses(
        (status = 200, description = "Updated volume", body = VolumeResponse),
        (status = 400, description = "Missing or invalid fields", body = ApiError),
        (status = 404, description = "Volume not found", body = ApiError)
    ),
    tag = "volumes"
)]
pub async fn put_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, volume_id)): Path<(Uuid, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<VolumeResponse>, ApiError> {
    update_volume(&state, identity_id, &volume_id, payload, true).await
}

/// Destroy a volume and return its end-dated mirror
#[utoipa::path(
    delete,
    path = "/api/v1/identities/{identity_id}/volumes/{volume_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("volume_id" = String, Path, description = "Provider volume id")
    ),
    responses(
        (status = 200, description = "Volume destroyed", body = VolumeResponse),
        (status = 404, description = "Volume not found", body = ApiError)
    ),
    tag = "volumes"
)]
pub async fn destroy_volume(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, volume_id)): Path<(Uuid, String)>,
) -> Result<Json<VolumeResponse>, ApiError> {
    let volume = LifecycleService::from_state(&state)
        .destroy_volume(identity_id, &volume_id)
        .await?;
    Ok(Json(volume.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_patch_only_touches_supplied_fields() {
        let changes = volume_changes(&body(json!({"name": "renamed"})), false).unwrap();
        assert_eq!(changes.name.as_deref(), Some("renamed"));
        assert!(changes.description.is_none());

        let changes = volume_changes(&body(json!({"description": null})), false).unwrap();
        assert!(changes.name.is_none());
        assert_eq!(changes.description, Some(None));
    }

    #[test]
    fn test_put_requires_name_and_clears_description() {
        let err = volume_changes(&body(json!({"description": "x"})), true).unwrap_err();
        assert!(matches!(err, LifecycleError::MissingFields(ref f) if f == &["name"]));

        let changes = volume_changes(&body(json!({"name": "v"})), true).unwrap();
        assert_eq!(changes.description, Some(None));
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(volume_changes(&body(json!({"name": " "})), false).is_err());
        assert!(volume_changes(&body(json!({"name": 5})), false).is_err());
    }
}
