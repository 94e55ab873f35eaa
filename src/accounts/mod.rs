//! # Account Provisioning
//!
//! Batch workflow that imports users from the provider account backends and
//! makes sure each one has a local user, group, default quota, identities
//! with credentials, and memberships on both providers.
//!
//! - [`AccountBackend`]: user directory of one provider
//! - [`KeystoneAccounts`]: OpenStack Identity v3 over HTTP
//! - [`FileAccountDirectory`]: Eucalyptus user export on disk
//! - [`InMemoryAccounts`]: local runs and tests
//! - [`ProvisioningWorkflow`]: the import itself

pub mod directory;
pub mod keystone;
pub mod memory;
pub mod workflow;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::error::RepositoryError;

pub use directory::FileAccountDirectory;
pub use keystone::KeystoneAccounts;
pub use memory::InMemoryAccounts;
pub use workflow::{ProvisioningReport, ProvisioningWorkflow, UserReport};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Requests are rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("Account backend rejected the admin credentials")]
    InvalidCredentials,

    #[error("User {username} not found in {backend}")]
    UserNotFound {
        backend: &'static str,
        username: String,
    },

    #[error("Account backend error: {0}")]
    Backend(String),

    #[error("Provisioning is misconfigured: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to read account directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid account data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AccountError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AccountError::RateLimited { .. })
    }
}

/// A user as reported by an account backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUser {
    pub username: String,
    /// Backend-side id, when the backend has one
    pub id: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// User directory of a single provider
#[async_trait]
pub trait AccountBackend: Send + Sync {
    /// Human-readable backend name, used in logs and errors
    fn name(&self) -> &'static str;

    async fn get_user(&self, username: &str) -> Result<Option<BackendUser>, AccountError>;

    /// Create a user (and its tenant, where the backend has tenants)
    async fn create_user(
        &self,
        username: &str,
        password: &str,
        admin_role: bool,
    ) -> Result<BackendUser, AccountError>;
}

/// Deterministic per-user password: hex HMAC-SHA256 of the username keyed by `salt`
pub fn hashpass(salt: &str, username: &str) -> Result<String, AccountError> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
        .map_err(|e| AccountError::Configuration(format!("invalid password salt: {e}")))?;
    mac.update(username.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashpass_is_deterministic() {
        let first = hashpass("pepper", "esteve").unwrap();
        let second = hashpass("pepper", "esteve").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hashpass_depends_on_salt_and_user() {
        let base = hashpass("pepper", "esteve").unwrap();
        assert_ne!(base, hashpass("salt", "esteve").unwrap());
        assert_ne!(base, hashpass("pepper", "jmatt").unwrap());
    }

    #[test]
    fn test_rate_limited_predicate() {
        assert!(AccountError::RateLimited { retry_after: None }.is_rate_limited());
        assert!(!AccountError::InvalidCredentials.is_rate_limited());
    }
}
