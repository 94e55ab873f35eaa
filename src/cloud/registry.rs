//! Cloud provider registry
//!
//! Read-only map from provider slug to [`CloudProvider`], built once at
//! startup and shared through application state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::cloud::{CloudProvider, SimulatedCloud};
use crate::config::AppConfig;
use crate::seeds::{EUCALYPTUS_SLUG, OPENSTACK_SLUG};

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{name}' not found")]
    ProviderNotFound { name: String },
}

#[derive(Clone, Default)]
pub struct CloudRegistry {
    providers: HashMap<String, Arc<dyn CloudProvider>>,
}

impl CloudRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the simulated Eucalyptus and OpenStack clouds.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        for (slug, display_name) in [
            (EUCALYPTUS_SLUG, "Eucalyptus"),
            (OPENSTACK_SLUG, "OpenStack"),
        ] {
            registry.register(Arc::new(SimulatedCloud::new(
                slug,
                display_name,
                config.simulated_cloud.storage_limit_gb,
            )));
        }
        info!(providers = ?registry.slugs(), "Cloud registry initialized");
        registry
    }

    /// Register a provider, replacing any existing entry for its slug
    pub fn register(&mut self, provider: Arc<dyn CloudProvider>) {
        self.providers.insert(provider.slug().to_string(), provider);
    }

    pub fn get(&self, slug: &str) -> Result<Arc<dyn CloudProvider>, RegistryError> {
        self.providers
            .get(slug)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: slug.to_string(),
            })
    }

    /// Registered provider slugs, sorted
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.providers.keys().cloned().collect();
        slugs.sort();
        slugs
    }
}
