//! Volume entity model
//!
//! Local mirror of a block-storage volume owned by a remote provider. The row
//! is keyed by the provider-assigned id (`provider_alias`) and is never
//! deleted: destroying a volume stamps `end_date`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "volumes")]
pub struct Model {
    /// Local identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider-assigned volume id
    pub provider_alias: String,

    pub provider_slug: String,

    /// Identity that created (and owns) the volume
    pub identity_id: Uuid,

    pub name: String,

    pub description: Option<String>,

    /// Size in GB
    pub size: i32,

    /// Last status reported by the provider
    pub status: String,

    /// Username of the creator
    pub created_by: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<JsonValue>,

    pub start_date: DateTimeWithTimeZone,

    /// Set when the volume is destroyed
    pub end_date: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the mirrored volume is still alive
    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
