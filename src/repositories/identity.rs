//! # Identity Repository
//!
//! Identities pair a user with a provider. This repository owns the identity
//! row, its credentials and the membership rows that bind it to a group,
//! a quota and the provider.

use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::cloud::IdentityCredentials;
use crate::error::{RepositoryError, is_unique_violation};
use crate::models::{
    credential::{self, Entity as Credential},
    identity::{self, Entity as Identity},
    identity_membership::{self, Entity as IdentityMembership},
    provider_membership::{self, Entity as ProviderMembership},
    quota::{self, Entity as Quota},
};

pub struct IdentityRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> IdentityRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<identity::Model>, RepositoryError> {
        Ok(Identity::find_by_id(id).one(self.db).await?)
    }

    /// Like [`find_by_id`](Self::find_by_id), but absence is an error
    pub async fn get(&self, id: Uuid) -> Result<identity::Model, RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Identity",
                id: id.to_string(),
            })
    }

    /// Identities owned by `user_id` on `provider_slug`, oldest first
    pub async fn find_for_owner(
        &self,
        provider_slug: &str,
        user_id: Uuid,
    ) -> Result<Vec<identity::Model>, RepositoryError> {
        Ok(Identity::find()
            .filter(identity::Column::ProviderSlug.eq(provider_slug))
            .filter(identity::Column::CreatedBy.eq(user_id))
            .order_by_asc(identity::Column::CreatedAt)
            .all(self.db)
            .await?)
    }

    /// Returns the first identity for the owner, creating one if none exists.
    pub async fn get_or_create(
        &self,
        provider_slug: &str,
        user_id: Uuid,
    ) -> Result<(identity::Model, bool), RepositoryError> {
        let existing = self.find_for_owner(provider_slug, user_id).await?;
        if existing.len() > 1 {
            tracing::warn!(
                provider = provider_slug,
                user_id = %user_id,
                count = existing.len(),
                "User has multiple identities; using the first"
            );
        }
        if let Some(first) = existing.into_iter().next() {
            return Ok((first, false));
        }

        let identity = identity::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_slug: Set(provider_slug.to_string()),
            created_by: Set(user_id),
            created_at: Set(Utc::now().into()),
        };

        match identity.insert(self.db).await {
            Ok(created) => Ok((created, true)),
            Err(err) if is_unique_violation(&err) => self
                .find_for_owner(provider_slug, user_id)
                .await?
                .into_iter()
                .next()
                .map(|existing| (existing, false))
                .ok_or(RepositoryError::Database(err)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn credentials(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<credential::Model>, RepositoryError> {
        Ok(Credential::find()
            .filter(credential::Column::IdentityId.eq(identity_id))
            .order_by_asc(credential::Column::Key)
            .all(self.db)
            .await?)
    }

    /// Insert or overwrite one credential value. Returns true when a row changed.
    pub async fn set_credential(
        &self,
        identity_id: Uuid,
        key: &str,
        value: &str,
    ) -> Result<bool, RepositoryError> {
        let existing = Credential::find()
            .filter(credential::Column::IdentityId.eq(identity_id))
            .filter(credential::Column::Key.eq(key))
            .one(self.db)
            .await?;

        match existing {
            Some(current) if current.value == value => Ok(false),
            Some(current) => {
                let mut active = current.into_active_model();
                active.value = Set(value.to_string());
                active.update(self.db).await?;
                Ok(true)
            }
            None => {
                credential::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    identity_id: Set(identity_id),
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                }
                .insert(self.db)
                .await?;
                Ok(true)
            }
        }
    }

    /// Credentials in the shape a [`CloudProvider`](crate::cloud::CloudProvider) consumes
    pub async fn load_credentials(
        &self,
        identity: &identity::Model,
    ) -> Result<IdentityCredentials, RepositoryError> {
        let values: BTreeMap<String, String> = self
            .credentials(identity.id)
            .await?
            .into_iter()
            .map(|cred| (cred.key, cred.value))
            .collect();

        Ok(IdentityCredentials {
            provider_slug: identity.provider_slug.clone(),
            identity_id: identity.id,
            values,
        })
    }

    pub async fn ensure_identity_membership(
        &self,
        identity_id: Uuid,
        group_id: Uuid,
        quota_id: Uuid,
    ) -> Result<(identity_membership::Model, bool), RepositoryError> {
        let existing = IdentityMembership::find()
            .filter(identity_membership::Column::IdentityId.eq(identity_id))
            .filter(identity_membership::Column::GroupId.eq(group_id))
            .one(self.db)
            .await?;
        if let Some(membership) = existing {
            return Ok((membership, false));
        }

        let membership = identity_membership::ActiveModel {
            id: Set(Uuid::new_v4()),
            identity_id: Set(identity_id),
            group_id: Set(group_id),
            quota_id: Set(quota_id),
        }
        .insert(self.db)
        .await?;
        Ok((membership, true))
    }

    pub async fn ensure_provider_membership(
        &self,
        provider_slug: &str,
        group_id: Uuid,
    ) -> Result<(provider_membership::Model, bool), RepositoryError> {
        let existing = ProviderMembership::find()
            .filter(provider_membership::Column::ProviderSlug.eq(provider_slug))
            .filter(provider_membership::Column::GroupId.eq(group_id))
            .one(self.db)
            .await?;
        if let Some(membership) = existing {
            return Ok((membership, false));
        }

        let membership = provider_membership::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_slug: Set(provider_slug.to_string()),
            group_id: Set(group_id),
        }
        .insert(self.db)
        .await?;
        Ok((membership, true))
    }

    pub async fn memberships(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<identity_membership::Model>, RepositoryError> {
        Ok(IdentityMembership::find()
            .filter(identity_membership::Column::IdentityId.eq(identity_id))
            .all(self.db)
            .await?)
    }

    /// Quota of the identity's first membership
    pub async fn quota_for(&self, identity_id: Uuid) -> Result<Option<quota::Model>, RepositoryError> {
        let memberships = self.memberships(identity_id).await?;
        if memberships.len() > 1 {
            tracing::warn!(
                identity_id = %identity_id,
                count = memberships.len(),
                "Identity has multiple memberships; using the first"
            );
        }
        match memberships.first() {
            Some(membership) => Ok(Quota::find_by_id(membership.quota_id).one(self.db).await?),
            None => Ok(None),
        }
    }
}
