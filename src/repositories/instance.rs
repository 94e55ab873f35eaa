//! # Instance Repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use chrono::Utc;
use uuid::Uuid;

use crate::cloud::RemoteInstance;
use crate::error::RepositoryError;
use crate::models::instance::{self, Entity as Instance};

pub struct InstanceRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> InstanceRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<instance::Model>, RepositoryError> {
        Ok(Instance::find_by_id(id).one(self.db).await?)
    }

    pub async fn find_by_alias(
        &self,
        provider_slug: &str,
        provider_alias: &str,
    ) -> Result<Option<instance::Model>, RepositoryError> {
        Ok(Instance::find()
            .filter(instance::Column::ProviderSlug.eq(provider_slug))
            .filter(instance::Column::ProviderAlias.eq(provider_alias))
            .one(self.db)
            .await?)
    }

    pub async fn upsert_from_remote(
        &self,
        provider_slug: &str,
        identity_id: Uuid,
        remote: &RemoteInstance,
    ) -> Result<instance::Model, RepositoryError> {
        if let Some(existing) = self.find_by_alias(provider_slug, &remote.id).await? {
            let mut active = existing.into_active_model();
            active.status = Set(remote.status.clone());
            active.size_alias = Set(remote.size_id.clone());
            active.ip_address = Set(remote.ip_address.clone());
            return Ok(active.update(self.db).await?);
        }

        let row = instance::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_alias: Set(remote.id.clone()),
            provider_slug: Set(provider_slug.to_string()),
            identity_id: Set(identity_id),
            name: Set(remote.name.clone()),
            size_alias: Set(remote.size_id.clone()),
            source_type: Set(remote.source_type.as_str().to_string()),
            source_alias: Set(remote.source_id.clone()),
            status: Set(remote.status.clone()),
            ip_address: Set(remote.ip_address.clone()),
            start_date: Set(Utc::now().into()),
            end_date: Set(None),
        };
        Ok(row.insert(self.db).await?)
    }
}
