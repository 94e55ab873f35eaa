//! Snapshot entity model
//!
//! Local mirror of a provider-side volume snapshot.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider-assigned snapshot id
    pub provider_alias: String,

    pub provider_slug: String,

    pub identity_id: Uuid,

    /// Provider id of the volume the snapshot was taken from
    pub volume_alias: String,

    pub name: String,

    pub description: Option<String>,

    /// Size in GB
    pub size: i32,

    pub status: String,

    pub start_date: DateTimeWithTimeZone,

    pub end_date: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
