//! Provider key entity model
//!
//! EC2-style access/secret pairs issued by the Eucalyptus account backend,
//! recorded per username.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub username: String,

    pub access_key: String,

    pub secret_key: String,

    /// EC2 endpoint the key pair is valid for
    pub ec2_url: String,

    pub s3_url: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
