//! Machine request entity model
//!
//! Tracks a request to turn a running instance into a reusable machine image,
//! together with the imaging options and, once imaging completes, the id of
//! the new machine. `status` is free text.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Status assigned to newly created requests
pub const STATUS_PENDING: &str = "pending";

/// Status assigned once the new machine is recorded
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "machine_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Local id of the instance being imaged
    pub instance_id: Uuid,

    pub status: String,

    /// Provider id of the machine the instance was launched from
    pub parent_machine: String,

    pub iplant_sys_files: String,

    pub installed_software: String,

    pub exclude_files: String,

    pub access_list: String,

    pub new_machine_provider: String,

    pub new_machine_name: String,

    /// User id of the owner of the new machine
    pub new_machine_owner: Uuid,

    pub new_machine_visibility: String,

    pub new_machine_description: String,

    pub new_machine_tags: String,

    pub start_date: DateTimeWithTimeZone,

    pub end_date: Option<DateTimeWithTimeZone>,

    /// Provider id of the resulting machine, once imaging completes
    pub new_machine: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
