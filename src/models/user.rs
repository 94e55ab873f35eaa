//! User entity model
//!
//! Local user accounts. Provider identities are always owned by a user.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// User entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Login name, unique across the deployment
    #[sea_orm(unique)]
    pub username: String,

    /// Whether the user may access administrative tooling
    pub is_staff: bool,

    /// Whether the user bypasses all permission checks
    pub is_superuser: bool,

    /// Timestamp when the user was created
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
