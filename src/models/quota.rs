//! Quota entity model
//!
//! A quota is a resource ceiling shared by every member of a group. Quotas are
//! referenced, never copied. The process-wide default is addressed through
//! its `slug`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Stable handle of the default quota row
pub const DEFAULT_QUOTA_SLUG: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "quotas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Optional stable handle (unique when present)
    pub slug: Option<String>,

    /// Number of virtual CPUs
    pub cpu: i32,

    /// Memory ceiling in GB
    pub memory: i32,

    /// Storage ceiling in GB
    pub storage: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
