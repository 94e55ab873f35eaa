//! # Identity API Handlers

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::{ApiError, RepositoryError};
use crate::handlers::types::QuotaResponse;
use crate::repositories::{IdentityRepository, UserRepository};
use crate::server::AppState;

/// Identity with its credential keys. Credential values are never returned.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub provider: String,
    /// Username of the owner
    pub created_by: String,
    pub credential_keys: Vec<String>,
    pub quota: Option<QuotaResponse>,
}

#[utoipa::path(
    get,
    path = "/api/v1/identities/{identity_id}",
    security(("bearer_auth" = [])),
    params(("identity_id" = String, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Identity details", body = IdentityResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Identity not found", body = ApiError)
    ),
    tag = "identities"
)]
pub async fn get_identity(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(identity_id): Path<Uuid>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identities = IdentityRepository::new(&state.db);
    let identity = identities.get(identity_id).await?;

    let owner = UserRepository::new(&state.db)
        .find_by_id(identity.created_by)
        .await?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "User",
            id: identity.created_by.to_string(),
        })?;

    let credential_keys = identities
        .credentials(identity.id)
        .await?
        .into_iter()
        .map(|credential| credential.key)
        .collect();
    let quota = identities.quota_for(identity.id).await?;

    Ok(Json(IdentityResponse {
        id: identity.id,
        provider: identity.provider_slug,
        created_by: owner.username,
        credential_keys,
        quota: quota.map(QuotaResponse::from),
    }))
}
