//! Cloud provider seam
//!
//! - [`CloudProvider`] / [`CloudDriver`]: the interface each backend cloud implements
//! - [`CloudRegistry`]: slug lookup, built once at startup
//! - [`SimulatedCloud`]: in-process provider for local runs and tests

pub mod registry;
pub mod simulated;
pub mod trait_;

pub use registry::{CloudRegistry, RegistryError};
pub use simulated::SimulatedCloud;
pub use trait_::{
    BootRequest, BootSource, CloudDriver, CloudProvider, DriverError, IdentityCredentials,
    InstanceOperation, RemoteImage, RemoteInstance, RemoteSize, RemoteSnapshot, RemoteVolume,
    ResourceKind, VolumeRequest,
};
