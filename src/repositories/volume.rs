//! # Volume Repository
//!
//! Maintains the local volume mirror. Rows are refreshed from the provider's
//! view on every read and never deleted; destroy stamps `end_date`.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use uuid::Uuid;

use crate::cloud::RemoteVolume;
use crate::error::RepositoryError;
use crate::models::volume::{self, Entity as Volume};

/// Local-only fields a caller may change on a mirrored volume
#[derive(Debug, Clone, Default)]
pub struct VolumeChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
}

pub struct VolumeRepository<'a> {
    db: &'a DatabaseConnection,
}

pub(crate) fn clamp_size(size: i64) -> i32 {
    i32::try_from(size).unwrap_or(i32::MAX)
}

impl<'a> VolumeRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_alias(
        &self,
        provider_slug: &str,
        provider_alias: &str,
    ) -> Result<Option<volume::Model>, RepositoryError> {
        Ok(Volume::find()
            .filter(volume::Column::ProviderSlug.eq(provider_slug))
            .filter(volume::Column::ProviderAlias.eq(provider_alias))
            .one(self.db)
            .await?)
    }

    /// Mirror a remote volume.
    ///
    /// New rows take every field from the provider. Existing rows only take
    /// the provider's status and size: name and description are local.
    /// End-dated rows are returned unchanged.
    pub async fn upsert_from_remote(
        &self,
        provider_slug: &str,
        identity_id: Uuid,
        created_by: &str,
        remote: &RemoteVolume,
    ) -> Result<volume::Model, RepositoryError> {
        if let Some(existing) = self.find_by_alias(provider_slug, &remote.id).await? {
            let size = clamp_size(remote.size);
            let unchanged = existing.status == remote.status && existing.size == size;
            if existing.end_date.is_some() || unchanged {
                return Ok(existing);
            }
            let mut active = existing.into_active_model();
            active.status = Set(remote.status.clone());
            active.size = Set(size);
            return Ok(active.update(self.db).await?);
        }

        let row = volume::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_alias: Set(remote.id.clone()),
            provider_slug: Set(provider_slug.to_string()),
            identity_id: Set(identity_id),
            name: Set(remote.name.clone()),
            description: Set(remote.description.clone()),
            size: Set(clamp_size(remote.size)),
            status: Set(remote.status.clone()),
            created_by: Set(created_by.to_string()),
            metadata: Set(remote.metadata.clone()),
            start_date: Set(remote.created_at.into()),
            end_date: Set(None),
        };
        Ok(row.insert(self.db).await?)
    }

    pub async fn apply_changes(
        &self,
        volume: volume::Model,
        changes: VolumeChanges,
    ) -> Result<volume::Model, RepositoryError> {
        let mut active = volume.into_active_model();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        Ok(active.update(self.db).await?)
    }

    /// Stamp `end_date`, keeping the first stamp if one exists
    pub async fn end_date(&self, volume: volume::Model) -> Result<volume::Model, RepositoryError> {
        if volume.end_date.is_some() {
            return Ok(volume);
        }
        let mut active = volume.into_active_model();
        active.end_date = Set(Some(Utc::now().into()));
        active.status = Set("deleted".to_string());
        Ok(active.update(self.db).await?)
    }
}
