//! # Action Catalog & Dispatcher
//!
//! Named instance-level actions. The catalog is built once at startup and
//! held in application state; dispatch validates the payload against the
//! chosen entry and executes it against the instance's provider.

pub mod catalog;

use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cloud::{CloudRegistry, ResourceKind};
use crate::error::LifecycleError;
use crate::lifecycle::open_session;
use crate::models::instance;
use crate::repositories::InstanceRepository;

pub use catalog::{ActionCatalog, ActionInfo, FieldErrors, InstanceAction};

/// Body of `POST /instances/{id}/action`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

fn field_error(field: &str, errors: Value) -> LifecycleError {
    LifecycleError::Validation {
        message: format!("Invalid {}", field),
        details: Some(json!({ field: errors })),
    }
}

/// Check the request against the catalog and return the entry with its
/// validated payload. Nothing is sent to a provider.
pub fn validate<'c>(
    catalog: &'c ActionCatalog,
    request: &ActionRequest,
) -> Result<(&'c dyn InstanceAction, crate::cloud::InstanceOperation), LifecycleError> {
    let name = match request.action.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(field_error("action", json!(["This field is required."]))),
    };

    let action = catalog.get(name).ok_or_else(|| {
        field_error(
            "action",
            json!([format!("\"{}\" is not a valid choice.", name)]),
        )
    })?;

    let data = match &request.data {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(field_error(
                "data",
                json!({ "non_field_errors": ["Expected a JSON object."] }),
            ));
        }
    };

    let operation = action
        .prepare(&data)
        .map_err(|errors| field_error("data", Value::Object(errors)))?;
    Ok((action.as_ref(), operation))
}

/// Validate and execute an action against a mirrored instance, returning the
/// refreshed mirror.
pub async fn dispatch(
    db: &DatabaseConnection,
    clouds: &CloudRegistry,
    catalog: &ActionCatalog,
    instance_id: Uuid,
    request: &ActionRequest,
) -> Result<instance::Model, LifecycleError> {
    let (action, operation) = validate(catalog, request)?;

    let instances = InstanceRepository::new(db);
    let mirror = instances.find_by_id(instance_id).await?.ok_or_else(|| {
        LifecycleError::NotFound(format!(
            "{} {} does not exist",
            ResourceKind::Instance.title(),
            instance_id
        ))
    })?;

    let session = open_session(db, clouds, mirror.identity_id).await?;
    session
        .driver
        .perform_instance_action(&mirror.provider_alias, &operation)
        .await
        .map_err(|err| {
            LifecycleError::from_driver(err, "Instance action failed. Contact support")
        })?;

    info!(
        instance = %mirror.provider_alias,
        action = action.name(),
        identity_id = %session.identity_id(),
        "Instance action executed"
    );

    let refreshed = session
        .driver
        .get_instance(&mirror.provider_alias)
        .await
        .map_err(|err| {
            LifecycleError::from_driver(err, "Instance action failed. Contact support")
        })?;

    match refreshed {
        Some(remote) => Ok(instances
            .upsert_from_remote(session.provider_slug(), session.identity_id(), &remote)
            .await?),
        None => Ok(mirror),
    }
}
