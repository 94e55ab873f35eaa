//! # Snapshot Repository
//!
//! Snapshot mirrors plus the reconciliation records left behind when a
//! snapshot could not be cleaned up after a failed snapshot-then-volume run.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::cloud::RemoteSnapshot;
use crate::error::RepositoryError;
use crate::models::{
    snapshot::{self, Entity as Snapshot},
    snapshot_cleanup::{self, Entity as SnapshotCleanup},
};
use crate::repositories::volume::clamp_size;

pub struct SnapshotRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_alias(
        &self,
        provider_slug: &str,
        provider_alias: &str,
    ) -> Result<Option<snapshot::Model>, RepositoryError> {
        Ok(Snapshot::find()
            .filter(snapshot::Column::ProviderSlug.eq(provider_slug))
            .filter(snapshot::Column::ProviderAlias.eq(provider_alias))
            .one(self.db)
            .await?)
    }

    pub async fn upsert_from_remote(
        &self,
        provider_slug: &str,
        identity_id: Uuid,
        remote: &RemoteSnapshot,
    ) -> Result<snapshot::Model, RepositoryError> {
        if let Some(existing) = self.find_by_alias(provider_slug, &remote.id).await? {
            if existing.end_date.is_some() || existing.status == remote.status {
                return Ok(existing);
            }
            let mut active = existing.into_active_model();
            active.status = Set(remote.status.clone());
            return Ok(active.update(self.db).await?);
        }

        let row = snapshot::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_alias: Set(remote.id.clone()),
            provider_slug: Set(provider_slug.to_string()),
            identity_id: Set(identity_id),
            volume_alias: Set(remote.volume_id.clone()),
            name: Set(remote.name.clone()),
            description: Set(remote.description.clone()),
            size: Set(clamp_size(remote.size)),
            status: Set(remote.status.clone()),
            start_date: Set(remote.created_at.into()),
            end_date: Set(None),
        };
        Ok(row.insert(self.db).await?)
    }

    pub async fn end_date(
        &self,
        snapshot: snapshot::Model,
    ) -> Result<snapshot::Model, RepositoryError> {
        if snapshot.end_date.is_some() {
            return Ok(snapshot);
        }
        let mut active = snapshot.into_active_model();
        active.end_date = Set(Some(Utc::now().into()));
        active.status = Set("deleted".to_string());
        Ok(active.update(self.db).await?)
    }

    /// Persist a reconciliation record for a snapshot that outlived its workflow
    pub async fn record_cleanup(
        &self,
        provider_slug: &str,
        identity_id: Uuid,
        snapshot_alias: &str,
        reason: &str,
    ) -> Result<snapshot_cleanup::Model, RepositoryError> {
        let row = snapshot_cleanup::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_slug: Set(provider_slug.to_string()),
            identity_id: Set(identity_id),
            snapshot_alias: Set(snapshot_alias.to_string()),
            reason: Set(reason.to_string()),
            resolved: Set(false),
            created_at: Set(Utc::now().into()),
        };
        Ok(row.insert(self.db).await?)
    }

    pub async fn unresolved_cleanups(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<snapshot_cleanup::Model>, RepositoryError> {
        Ok(SnapshotCleanup::find()
            .filter(snapshot_cleanup::Column::IdentityId.eq(identity_id))
            .filter(snapshot_cleanup::Column::Resolved.eq(false))
            .order_by_asc(snapshot_cleanup::Column::CreatedAt)
            .all(self.db)
            .await?)
    }
}
