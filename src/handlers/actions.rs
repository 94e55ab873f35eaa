//! # Instance Action Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::actions::{self, ActionInfo, ActionRequest};
use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::server::AppState;

/// List the action catalog. No provider is contacted.
#[utoipa::path(
    get,
    path = "/api/v1/instances/{instance_id}/action",
    security(("bearer_auth" = [])),
    params(("instance_id" = String, Path, description = "Local instance id")),
    responses(
        (status = 200, description = "Available actions", body = [ActionInfo]),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    tag = "instances"
)]
pub async fn list_actions(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(_instance_id): Path<Uuid>,
) -> Json<Vec<ActionInfo>> {
    Json(state.actions.list())
}

/// Run a catalog action against the instance
#[utoipa::path(
    post,
    path = "/api/v1/instances/{instance_id}/action",
    security(("bearer_auth" = [])),
    params(("instance_id" = String, Path, description = "Local instance id")),
    request_body(content = ActionRequest, example = json!({
        "action": "reboot",
        "data": {"reboot_type": "HARD"}
    })),
    responses(
        (status = 204, description = "Action executed"),
        (status = 400, description = "Unknown action or invalid data", body = ApiError),
        (status = 404, description = "Instance not found", body = ApiError)
    ),
    tag = "instances"
)]
pub async fn run_action(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(instance_id): Path<Uuid>,
    payload: Result<Json<ActionRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    actions::dispatch(
        &state.db,
        &state.clouds,
        &state.actions,
        instance_id,
        &request,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
