//! Provider repository for database operations
//!
//! This module provides the ProviderRepository struct which encapsulates
//! SeaORM operations for the providers table.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set,
};
use std::sync::Arc;

use crate::models::provider::{self, Entity as Provider};

/// Repository for provider database operations
#[derive(Debug, Clone)]
pub struct ProviderRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl ProviderRepository {
    /// Creates a new ProviderRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a provider by its slug
    ///
    /// # Arguments
    ///
    /// * `slug` - The unique slug identifier of the provider
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<provider::Model>> {
        let provider = Provider::find_by_id(slug.to_string())
            .one(&*self.db)
            .await?;
        Ok(provider)
    }

    /// Finds all providers ordered by slug
    pub async fn find_all(&self) -> Result<Vec<provider::Model>> {
        let providers = Provider::find()
            .order_by_asc(provider::Column::Slug)
            .all(&*self.db)
            .await?;
        Ok(providers)
    }

    /// Insert a provider or refresh its display name and location
    pub async fn upsert(
        &self,
        slug: &str,
        display_name: &str,
        location: &str,
    ) -> Result<provider::Model> {
        let now = Utc::now();
        if let Some(existing) = self.find_by_slug(slug).await? {
            if existing.display_name == display_name && existing.location == location {
                return Ok(existing);
            }
            let mut am: provider::ActiveModel = existing.into();
            am.display_name = Set(display_name.to_string());
            am.location = Set(location.to_string());
            am.updated_at = Set(now.into());
            Ok(am.update(&*self.db).await?)
        } else {
            let am = provider::ActiveModel {
                slug: Set(slug.to_string()),
                display_name: Set(display_name.to_string()),
                location: Set(location.to_string()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            Ok(am.insert(&*self.db).await?)
        }
    }
}
