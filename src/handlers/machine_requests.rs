//! # Machine Request Handlers
//!
//! Requests to image a running instance into a new machine.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::{ApiError, LifecycleError};
use crate::handlers::types::MachineRequestResponse;
use crate::repositories::{
    InstanceRepository, MachineRequestRepository, MachineRequestUpdate, NewMachineRequest,
};
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMachineRequest {
    /// Local id of the instance to image
    #[schema(value_type = String)]
    pub instance_id: Uuid,
    pub parent_machine: String,
    #[serde(default)]
    pub iplant_sys_files: String,
    #[serde(default)]
    pub installed_software: String,
    #[serde(default)]
    pub exclude_files: String,
    #[serde(default)]
    pub access_list: String,
    pub new_machine_provider: String,
    pub new_machine_name: String,
    #[schema(value_type = String)]
    pub new_machine_owner: Uuid,
    #[serde(default = "default_visibility")]
    pub new_machine_visibility: String,
    #[serde(default)]
    pub new_machine_description: String,
    #[serde(default)]
    pub new_machine_tags: String,
}

fn default_visibility() -> String {
    "private".to_string()
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateMachineRequest {
    pub status: Option<String>,
    /// Provider id of the finished machine; completes the request
    pub new_machine: Option<String>,
}

fn request_not_found(request_id: Uuid) -> LifecycleError {
    LifecycleError::NotFound(format!("MachineRequest {} does not exist", request_id))
}

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}/machine_requests",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Machine requests for the identity's instances", body = [MachineRequestResponse])
    ),
    tag = "machine_requests"
)]
pub async fn list_machine_requests(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
) -> Result<Json<Vec<MachineRequestResponse>>, ApiError> {
    let requests = MachineRequestRepository::new(&state.db)
        .list_for_identity(identity_id)
        .await?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/identities/{identity_id}/machine_requests",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    request_body = CreateMachineRequest,
    responses(
        (status = 201, description = "Machine request opened", body = MachineRequestResponse),
        (status = 400, description = "Invalid body", body = ApiError),
        (status = 404, description = "Instance not found for this identity", body = ApiError)
    ),
    tag = "machine_requests"
)]
pub async fn create_machine_request(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
    payload: Result<Json<CreateMachineRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MachineRequestResponse>), ApiError> {
    let Json(body) = payload?;

    let instance = InstanceRepository::new(&state.db)
        .find_by_id(body.instance_id)
        .await?
        .filter(|instance| instance.identity_id == identity_id)
        .ok_or_else(|| {
            LifecycleError::NotFound(format!("Instance {} does not exist", body.instance_id))
        })?;

    let created = MachineRequestRepository::new(&state.db)
        .create(NewMachineRequest {
            instance_id: instance.id,
            parent_machine: body.parent_machine,
            iplant_sys_files: body.iplant_sys_files,
            installed_software: body.installed_software,
            exclude_files: body.exclude_files,
            access_list: body.access_list,
            new_machine_provider: body.new_machine_provider,
            new_machine_name: body.new_machine_name,
            new_machine_owner: body.new_machine_owner,
            new_machine_visibility: body.new_machine_visibility,
            new_machine_description: body.new_machine_description,
            new_machine_tags: body.new_machine_tags,
        })
        .await?;

    tracing::info!(
        machine_request = %created.id,
        instance = %instance.provider_alias,
        "Machine request opened"
    );
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}/machine_requests/{request_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("request_id" = String, Path, description = "Machine request id")
    ),
    responses(
        (status = 200, description = "Machine request", body = MachineRequestResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "machine_requests"
)]
pub async fn get_machine_request(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, request_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MachineRequestResponse>, ApiError> {
    let request = MachineRequestRepository::new(&state.db)
        .find_for_identity(identity_id, request_id)
        .await?
        .ok_or_else(|| request_not_found(request_id))?;
    Ok(Json(request.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/identities/{identity_id}/machine_requests/{request_id}",
    security(("bearer_auth" = [])),
    params(
        ("identity_id" = String, Path, description = "Identity id"),
        ("request_id" = String, Path, description = "Machine request id")
    ),
    request_body = UpdateMachineRequest,
    responses(
        (status = 200, description = "Updated machine request", body = MachineRequestResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "machine_requests"
)]
pub async fn update_machine_request(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path((identity_id, request_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateMachineRequest>, JsonRejection>,
) -> Result<Json<MachineRequestResponse>, ApiError> {
    let Json(body) = payload?;
    let repo = MachineRequestRepository::new(&state.db);
    let request = repo
        .find_for_identity(identity_id, request_id)
        .await?
        .ok_or_else(|| request_not_found(request_id))?;

    let updated = repo
        .update(
            request,
            MachineRequestUpdate {
                status: body.status.filter(|s| !s.trim().is_empty()),
                new_machine: body.new_machine.filter(|s| !s.trim().is_empty()),
            },
        )
        .await?;
    Ok(Json(updated.into()))
}
