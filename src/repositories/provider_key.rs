//! # Provider Key Repository
//!
//! EC2 key pairs recorded per username. `username` carries no unique index,
//! so callers see every matching row and decide how to repair duplicates.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::provider_key::{self, Entity as ProviderKey};

/// Key material for a new row
#[derive(Debug, Clone)]
pub struct NewProviderKey {
    pub username: String,
    pub access_key: String,
    pub secret_key: String,
    pub ec2_url: String,
}

pub struct ProviderKeyRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ProviderKeyRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Vec<provider_key::Model>, RepositoryError> {
        Ok(ProviderKey::find()
            .filter(provider_key::Column::Username.eq(username))
            .order_by_asc(provider_key::Column::CreatedAt)
            .all(self.db)
            .await?)
    }

    pub async fn create(&self, key: NewProviderKey) -> Result<provider_key::Model, RepositoryError> {
        let row = provider_key::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(key.username),
            access_key: Set(key.access_key),
            secret_key: Set(key.secret_key),
            ec2_url: Set(key.ec2_url),
            s3_url: Set(String::new()),
            created_at: Set(Utc::now().into()),
        };
        Ok(row.insert(self.db).await?)
    }

    /// Delete every key for `username`, returning the number of rows removed
    pub async fn delete_by_username(&self, username: &str) -> Result<u64, RepositoryError> {
        let result = ProviderKey::delete_many()
            .filter(provider_key::Column::Username.eq(username))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
