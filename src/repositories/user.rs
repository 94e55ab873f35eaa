//! # User and Group Repositories
//!
//! Get-or-create helpers for the account records the provisioning workflow
//! maintains: users, their per-user groups and group membership.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use uuid::Uuid;

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::{
    group::{self, Entity as Group},
    user::{self, Entity as User},
    user_group::{self, Entity as UserGroup},
};

pub struct UserRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, RepositoryError> {
        Ok(User::find_by_id(id).one(self.db).await?)
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, RepositoryError> {
        Ok(User::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db)
            .await?)
    }

    /// Returns the user and whether it was created by this call
    pub async fn get_or_create(&self, username: &str) -> Result<(user::Model, bool), RepositoryError> {
        if let Some(existing) = self.find_by_username(username).await? {
            return Ok((existing, false));
        }

        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            is_staff: Set(false),
            is_superuser: Set(false),
            created_at: Set(Utc::now().into()),
        };

        match user.insert(self.db).await {
            Ok(created) => Ok((created, true)),
            // Lost a race with a concurrent insert
            Err(err) if is_unique_violation(&err) => self
                .find_by_username(username)
                .await?
                .map(|existing| (existing, false))
                .ok_or(RepositoryError::Database(err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Grant staff and superuser flags
    pub async fn promote_admin(&self, username: &str) -> Result<user::Model, RepositoryError> {
        let existing =
            self.find_by_username(username)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "User",
                    id: username.to_string(),
                })?;

        if existing.is_staff && existing.is_superuser {
            return Ok(existing);
        }

        let mut active = existing.into_active_model();
        active.is_staff = Set(true);
        active.is_superuser = Set(true);
        Ok(active.update(self.db).await?)
    }
}

pub struct GroupRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> GroupRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<group::Model>, RepositoryError> {
        Ok(Group::find()
            .filter(group::Column::Name.eq(name))
            .one(self.db)
            .await?)
    }

    pub async fn get_or_create(&self, name: &str) -> Result<(group::Model, bool), RepositoryError> {
        if let Some(existing) = self.find_by_name(name).await? {
            return Ok((existing, false));
        }

        let group = group::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        };

        match group.insert(self.db).await {
            Ok(created) => Ok((created, true)),
            Err(err) if is_unique_violation(&err) => self
                .find_by_name(name)
                .await?
                .map(|existing| (existing, false))
                .ok_or(RepositoryError::Database(err)),
            Err(err) => Err(err.into()),
        }
    }

    /// Add `user_id` to the group, promoting an existing member to leader when asked
    pub async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        is_leader: bool,
    ) -> Result<user_group::Model, RepositoryError> {
        let existing = UserGroup::find()
            .filter(user_group::Column::GroupId.eq(group_id))
            .filter(user_group::Column::UserId.eq(user_id))
            .one(self.db)
            .await?;

        match existing {
            Some(member) if member.is_leader || !is_leader => Ok(member),
            Some(member) => {
                let mut active = member.into_active_model();
                active.is_leader = Set(true);
                Ok(active.update(self.db).await?)
            }
            None => {
                let member = user_group::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    group_id: Set(group_id),
                    is_leader: Set(is_leader),
                };
                Ok(member.insert(self.db).await?)
            }
        }
    }

    pub async fn members(&self, group_id: Uuid) -> Result<Vec<user_group::Model>, RepositoryError> {
        Ok(UserGroup::find()
            .filter(user_group::Column::GroupId.eq(group_id))
            .all(self.db)
            .await?)
    }
}
