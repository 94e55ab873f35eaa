//! Provider seeding functionality
//!
//! Seeds the providers table with the two clouds Atmosphere fronts.

use anyhow::Result;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::repositories::ProviderRepository;

pub const EUCALYPTUS_SLUG: &str = "eucalyptus";
pub const OPENSTACK_SLUG: &str = "openstack";

/// Location tags stored on the provider rows
pub const EUCALYPTUS_LOCATION: &str = "EUCALYPTUS";
pub const OPENSTACK_LOCATION: &str = "OPENSTACK";

/// Configuration structure for a provider
struct ProviderConfig {
    slug: &'static str,
    display_name: &'static str,
    location: &'static str,
}

const PROVIDERS: &[ProviderConfig] = &[
    ProviderConfig {
        slug: EUCALYPTUS_SLUG,
        display_name: "Eucalyptus",
        location: EUCALYPTUS_LOCATION,
    },
    ProviderConfig {
        slug: OPENSTACK_SLUG,
        display_name: "OpenStack",
        location: OPENSTACK_LOCATION,
    },
];

/// Ensure every known provider row exists. Safe to run repeatedly.
pub async fn seed_providers(db: &DatabaseConnection) -> Result<()> {
    let repo = ProviderRepository::new(Arc::new(db.clone()));

    for provider_config in PROVIDERS {
        match repo
            .upsert(
                provider_config.slug,
                provider_config.display_name,
                provider_config.location,
            )
            .await
        {
            Ok(_) => log::info!("Provider '{}' is present", provider_config.slug),
            Err(e) => {
                log::error!(
                    "Failed to seed provider '{}': {}",
                    provider_config.slug,
                    e
                );
                return Err(e);
            }
        }
    }

    log::info!("Provider seeding completed successfully");
    Ok(())
}
