//! # Common API Types
//!
//! Response bodies shared by the handlers and the helpers that build them
//! from the mirror rows.

use axum::{Json, extract::rejection::JsonRejection};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use serde_json::{Map, Value, json};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, validation_error};
use crate::models::{instance, machine_request, quota, snapshot, volume};

fn rfc3339(value: DateTimeWithTimeZone) -> String {
    value.to_rfc3339()
}

/// Unwrap a JSON body that must be an object
pub fn json_object(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, ApiError> {
    match payload? {
        Json(Value::Object(map)) => Ok(map),
        Json(_) => Err(validation_error(
            "Request body must be a JSON object",
            json!({ "non_field_errors": ["Expected a JSON object."] }),
        )),
    }
}

/// Mirrored volume
#[derive(Debug, Serialize, ToSchema)]
pub struct VolumeResponse {
    /// Provider-assigned volume id
    pub alias: String,
    #[schema(value_type = String)]
    pub identity: Uuid,
    pub provider: String,
    pub name: String,
    pub description: Option<String>,
    /// Size in GB
    pub size: i32,
    pub status: String,
    pub created_by: String,
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
    pub start_date: String,
    pub end_date: Option<String>,
}

impl From<volume::Model> for VolumeResponse {
    fn from(model: volume::Model) -> Self {
        Self {
            alias: model.provider_alias,
            identity: model.identity_id,
            provider: model.provider_slug,
            name: model.name,
            description: model.description,
            size: model.size,
            status: model.status,
            created_by: model.created_by,
            metadata: model.metadata,
            start_date: rfc3339(model.start_date),
            end_date: model.end_date.map(rfc3339),
        }
    }
}

/// Mirrored snapshot
#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotResponse {
    pub alias: String,
    #[schema(value_type = String)]
    pub identity: Uuid,
    pub provider: String,
    /// Provider id of the source volume
    pub volume: String,
    pub name: String,
    pub description: Option<String>,
    pub size: i32,
    pub status: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

impl From<snapshot::Model> for SnapshotResponse {
    fn from(model: snapshot::Model) -> Self {
        Self {
            alias: model.provider_alias,
            identity: model.identity_id,
            provider: model.provider_slug,
            volume: model.volume_alias,
            name: model.name,
            description: model.description,
            size: model.size,
            status: model.status,
            start_date: rfc3339(model.start_date),
            end_date: model.end_date.map(rfc3339),
        }
    }
}

/// Mirrored instance
#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub alias: String,
    #[schema(value_type = String)]
    pub identity: Uuid,
    pub provider: String,
    pub name: String,
    pub size: String,
    pub source_type: String,
    pub source: String,
    pub status: String,
    pub ip_address: Option<String>,
    pub start_date: String,
}

impl From<instance::Model> for InstanceResponse {
    fn from(model: instance::Model) -> Self {
        Self {
            id: model.id,
            alias: model.provider_alias,
            identity: model.identity_id,
            provider: model.provider_slug,
            name: model.name,
            size: model.size_alias,
            source_type: model.source_type,
            source: model.source_alias,
            status: model.status,
            ip_address: model.ip_address,
            start_date: rfc3339(model.start_date),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuotaResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub cpu: i32,
    /// GB
    pub memory: i32,
    /// GB
    pub storage: i32,
}

impl From<quota::Model> for QuotaResponse {
    fn from(model: quota::Model) -> Self {
        Self {
            id: model.id,
            cpu: model.cpu,
            memory: model.memory,
            storage: model.storage,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MachineRequestResponse {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub instance: Uuid,
    pub status: String,
    pub parent_machine: String,
    pub iplant_sys_files: String,
    pub installed_software: String,
    pub exclude_files: String,
    pub access_list: String,
    pub new_machine_provider: String,
    pub new_machine_name: String,
    #[schema(value_type = String)]
    pub new_machine_owner: Uuid,
    pub new_machine_visibility: String,
    pub new_machine_description: String,
    pub new_machine_tags: String,
    pub new_machine: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
}

impl From<machine_request::Model> for MachineRequestResponse {
    fn from(model: machine_request::Model) -> Self {
        Self {
            id: model.id,
            instance: model.instance_id,
            status: model.status,
            parent_machine: model.parent_machine,
            iplant_sys_files: model.iplant_sys_files,
            installed_software: model.installed_software,
            exclude_files: model.exclude_files,
            access_list: model.access_list,
            new_machine_provider: model.new_machine_provider,
            new_machine_name: model.new_machine_name,
            new_machine_owner: model.new_machine_owner,
            new_machine_visibility: model.new_machine_visibility,
            new_machine_description: model.new_machine_description,
            new_machine_tags: model.new_machine_tags,
            new_machine: model.new_machine,
            start_date: rfc3339(model.start_date),
            end_date: model.end_date.map(rfc3339),
        }
    }
}
