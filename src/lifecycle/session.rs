//! Binding an identity to an authenticated provider driver.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::cloud::{CloudDriver, CloudRegistry};
use crate::error::LifecycleError;
use crate::models::identity;
use crate::repositories::{IdentityRepository, UserRepository};

/// An identity together with a driver authenticated as that identity
pub struct IdentitySession {
    pub identity: identity::Model,
    /// Username of the identity's owner, recorded on mirrored resources
    pub owner: String,
    pub driver: Arc<dyn CloudDriver>,
}

impl IdentitySession {
    pub fn provider_slug(&self) -> &str {
        &self.identity.provider_slug
    }

    pub fn identity_id(&self) -> Uuid {
        self.identity.id
    }
}

/// Load the identity, its credentials and its provider, then authenticate.
pub async fn open_session(
    db: &DatabaseConnection,
    clouds: &CloudRegistry,
    identity_id: Uuid,
) -> Result<IdentitySession, LifecycleError> {
    let identities = IdentityRepository::new(db);
    let identity = identities
        .find_by_id(identity_id)
        .await?
        .ok_or_else(|| LifecycleError::NotFound(format!("Identity {} does not exist", identity_id)))?;

    let owner = UserRepository::new(db)
        .find_by_id(identity.created_by)
        .await?
        .map(|user| user.username)
        .unwrap_or_default();

    let provider = clouds.get(&identity.provider_slug).map_err(|err| {
        tracing::error!(identity_id = %identity.id, error = %err, "Identity references an unregistered provider");
        LifecycleError::Provisioning {
            message: format!("Provider {} is not available. Contact support", identity.provider_slug),
            details: err.to_string(),
        }
    })?;

    let credentials = identities.load_credentials(&identity).await?;
    let driver = provider.connect(&credentials).await.map_err(|err| {
        tracing::warn!(
            identity_id = %identity.id,
            provider = %identity.provider_slug,
            error = %err,
            "Provider authentication failed"
        );
        LifecycleError::from_driver(err, "Provider connection failed. Contact support")
    })?;

    Ok(IdentitySession {
        identity,
        owner,
        driver,
    })
}
