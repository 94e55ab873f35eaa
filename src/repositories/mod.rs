//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! account, identity and resource-mirror tables.

pub mod identity;
pub mod instance;
pub mod machine_request;
pub mod provider;
pub mod provider_key;
pub mod quota;
pub mod snapshot;
pub mod user;
pub mod volume;

pub use identity::IdentityRepository;
pub use instance::InstanceRepository;
pub use machine_request::{MachineRequestRepository, MachineRequestUpdate, NewMachineRequest};
pub use provider::ProviderRepository;
pub use provider_key::{NewProviderKey, ProviderKeyRepository};
pub use quota::QuotaRepository;
pub use snapshot::SnapshotRepository;
pub use user::{GroupRepository, UserRepository};
pub use volume::{VolumeChanges, VolumeRepository};
