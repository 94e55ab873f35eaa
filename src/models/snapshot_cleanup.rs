//! Snapshot cleanup entity model
//!
//! Reconciliation record for a snapshot that was created as the first phase of
//! a snapshot-then-volume request and could not be removed after the second
//! phase failed.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "snapshot_cleanups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub provider_slug: String,

    pub identity_id: Uuid,

    /// Provider id of the orphaned snapshot
    pub snapshot_alias: String,

    /// Why the compensating delete did not happen
    pub reason: String,

    pub resolved: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
