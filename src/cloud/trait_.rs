//! Cloud driver trait definition
//!
//! Defines the interface every backend cloud provider implements. A
//! [`CloudProvider`] authenticates an identity's credentials and hands back a
//! [`CloudDriver`] bound to that account.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of remote resource, used for lookups and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Volume,
    Snapshot,
    Image,
    Size,
    Instance,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Volume => "volume",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::Image => "image",
            ResourceKind::Size => "size",
            ResourceKind::Instance => "instance",
        }
    }

    /// Capitalized form used in user-facing messages ("Volume vol-1 does not exist")
    pub fn title(&self) -> &'static str {
        match self {
            ResourceKind::Volume => "Volume",
            ResourceKind::Snapshot => "Snapshot",
            ResourceKind::Image => "Image",
            ResourceKind::Size => "Size",
            ResourceKind::Instance => "Instance",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver-level failures reported by a provider backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    #[error("invalid credentials for identity {identity} on {provider}")]
    InvalidCredentials { provider: String, identity: String },
    #[error("{message}")]
    OverQuota { message: String },
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<u64> },
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },
    #[error("backend error: {details}")]
    Backend { details: String },
}

/// Credentials of one identity, as stored in the `credentials` table
#[derive(Debug, Clone)]
pub struct IdentityCredentials {
    pub provider_slug: String,
    pub identity_id: Uuid,
    pub values: BTreeMap<String, String>,
}

impl IdentityCredentials {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVolume {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub status: String,
    pub description: Option<String>,
    pub snapshot_id: Option<String>,
    pub image_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub status: String,
    pub description: Option<String>,
    pub volume_id: String,
    pub created_at: DateTime<Utc>,
}

/// A bootable machine image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteImage {
    pub id: String,
    pub name: String,
    /// Image size in GB
    pub size_gb: i64,
}

/// A compute flavor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSize {
    pub id: String,
    pub name: String,
    pub cpu: i32,
    pub ram_mb: i64,
    pub disk_gb: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteInstance {
    pub id: String,
    pub name: String,
    pub status: String,
    pub size_id: String,
    pub source_type: ResourceKind,
    pub source_id: String,
    pub ip_address: Option<String>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Parameters for creating a volume
#[derive(Debug, Clone)]
pub struct VolumeRequest {
    pub name: String,
    pub size: i64,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub snapshot: Option<RemoteSnapshot>,
    pub image: Option<RemoteImage>,
}

/// Resolved boot source
#[derive(Debug, Clone)]
pub enum BootSource {
    Image(RemoteImage),
    Snapshot(RemoteSnapshot),
    Volume(RemoteVolume),
}

impl BootSource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            BootSource::Image(_) => ResourceKind::Image,
            BootSource::Snapshot(_) => ResourceKind::Snapshot,
            BootSource::Volume(_) => ResourceKind::Volume,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BootSource::Image(image) => &image.id,
            BootSource::Snapshot(snapshot) => &snapshot.id,
            BootSource::Volume(volume) => &volume.id,
        }
    }
}

/// Parameters for launching an instance from a source
#[derive(Debug, Clone)]
pub struct BootRequest {
    pub name: String,
    pub size: RemoteSize,
    pub source: BootSource,
    /// Free-form parameters forwarded untouched to the provider
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Operations the action dispatcher can run against an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceOperation {
    Start,
    Stop,
    Reboot { hard: bool },
    Resize { size_id: String },
    Suspend,
    Resume,
}

/// Account-bound access to one provider.
#[async_trait]
pub trait CloudDriver: Send + Sync {
    async fn list_volumes(&self) -> Result<Vec<RemoteVolume>, DriverError>;

    async fn get_volume(&self, volume_id: &str) -> Result<Option<RemoteVolume>, DriverError>;

    async fn create_volume(&self, request: VolumeRequest) -> Result<RemoteVolume, DriverError>;

    /// Returns false when the provider accepted the call but reported failure
    async fn destroy_volume(&self, volume: &RemoteVolume) -> Result<bool, DriverError>;

    async fn list_snapshots(&self) -> Result<Vec<RemoteSnapshot>, DriverError>;

    async fn get_snapshot(&self, snapshot_id: &str)
    -> Result<Option<RemoteSnapshot>, DriverError>;

    async fn create_snapshot(
        &self,
        volume: &RemoteVolume,
        name: &str,
        description: Option<&str>,
    ) -> Result<RemoteSnapshot, DriverError>;

    /// Returns false when the provider accepted the call but reported failure
    async fn delete_snapshot(&self, snapshot: &RemoteSnapshot) -> Result<bool, DriverError>;

    async fn get_machine(&self, image_id: &str) -> Result<Option<RemoteImage>, DriverError>;

    async fn get_size(&self, size_id: &str) -> Result<Option<RemoteSize>, DriverError>;

    async fn boot_volume(&self, request: BootRequest) -> Result<RemoteInstance, DriverError>;

    async fn get_instance(&self, instance_id: &str)
    -> Result<Option<RemoteInstance>, DriverError>;

    async fn perform_instance_action(
        &self,
        instance_id: &str,
        operation: &InstanceOperation,
    ) -> Result<(), DriverError>;
}

/// A backend cloud, addressed by its provider slug.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn slug(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Authenticate and return a driver scoped to the identity's account.
    async fn connect(
        &self,
        credentials: &IdentityCredentials,
    ) -> Result<Arc<dyn CloudDriver>, DriverError>;
}
