//! # Quota Repository
//!
//! The default quota is addressed by its stable slug. Creation is race-safe:
//! a concurrent insert surfaces as a unique violation on `idx_quotas_slug` and
//! the winner's row is re-read.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::config::QuotaDefaults;
use crate::error::{RepositoryError, is_unique_violation};
use crate::models::quota::{self, DEFAULT_QUOTA_SLUG, Entity as Quota};

pub struct QuotaRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> QuotaRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<quota::Model>, RepositoryError> {
        Ok(Quota::find()
            .filter(quota::Column::Slug.eq(slug))
            .one(self.db)
            .await?)
    }

    /// Fetch the default quota, creating it from `defaults` on first use.
    ///
    /// An existing row is returned as-is even when `defaults` has changed
    /// since it was created.
    pub async fn get_or_create_default(
        &self,
        defaults: &QuotaDefaults,
    ) -> Result<quota::Model, RepositoryError> {
        if let Some(existing) = self.find_by_slug(DEFAULT_QUOTA_SLUG).await? {
            return Ok(existing);
        }

        let quota = quota::ActiveModel {
            id: Set(Uuid::new_v4()),
            slug: Set(Some(DEFAULT_QUOTA_SLUG.to_string())),
            cpu: Set(defaults.cpu),
            memory: Set(defaults.memory),
            storage: Set(defaults.storage),
            created_at: Set(Utc::now().into()),
        };

        match quota.insert(self.db).await {
            Ok(created) => {
                tracing::info!(quota_id = %created.id, "Created default quota");
                Ok(created)
            }
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!("Default quota created concurrently; re-reading");
                self.find_by_slug(DEFAULT_QUOTA_SLUG)
                    .await?
                    .ok_or(RepositoryError::Database(err))
            }
            Err(err) => Err(err.into()),
        }
    }
}
