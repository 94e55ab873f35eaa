//! # Data Models
//!
//! This module contains all the data models used throughout the Atmosphere API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod credential;
pub mod group;
pub mod identity;
pub mod identity_membership;
pub mod instance;
pub mod machine_request;
pub mod provider;
pub mod provider_key;
pub mod provider_membership;
pub mod quota;
pub mod snapshot;
pub mod snapshot_cleanup;
pub mod user;
pub mod user_group;
pub mod volume;

pub use credential::Entity as Credential;
pub use group::Entity as Group;
pub use identity::Entity as Identity;
pub use identity_membership::Entity as IdentityMembership;
pub use instance::Entity as Instance;
pub use machine_request::Entity as MachineRequest;
pub use provider::Entity as Provider;
pub use provider_key::Entity as ProviderKey;
pub use provider_membership::Entity as ProviderMembership;
pub use quota::Entity as Quota;
pub use snapshot::Entity as Snapshot;
pub use snapshot_cleanup::Entity as SnapshotCleanup;
pub use user::Entity as User;
pub use user_group::Entity as UserGroup;
pub use volume::Entity as Volume;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "atmosphere".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
