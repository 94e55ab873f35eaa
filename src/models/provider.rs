//! Provider entity model
//!
//! This module contains the SeaORM entity model for the providers table,
//! the catalog of cloud backends an identity can authenticate against.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Provider entity representing a cloud backend
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    /// Unique slug identifier for the provider (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub slug: String,

    /// Display name of the provider
    pub display_name: String,

    /// Deployment location label, e.g. `EUCALYPTUS`
    pub location: String,

    /// Timestamp when the provider was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the provider was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
