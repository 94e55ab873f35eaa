//! Instance entity model
//!
//! Local mirror of a running provider instance.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "instances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider-assigned instance id
    pub provider_alias: String,

    pub provider_slug: String,

    pub identity_id: Uuid,

    pub name: String,

    /// Provider id of the compute size (flavor)
    pub size_alias: String,

    /// One of `image`, `snapshot`, `volume`
    pub source_type: String,

    /// Provider id of the boot source
    pub source_alias: String,

    pub status: String,

    pub ip_address: Option<String>,

    pub start_date: DateTimeWithTimeZone,

    pub end_date: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
