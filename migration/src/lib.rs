//! Database migrations for the Atmosphere control plane.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_01_06_000001_create_accounts;
mod m2025_01_06_000002_create_providers;
mod m2025_01_06_000003_create_identities;
mod m2025_01_06_000004_create_provider_keys;
mod m2025_01_06_000005_create_storage_mirrors;
mod m2025_01_06_000006_create_instances;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_06_000001_create_accounts::Migration),
            Box::new(m2025_01_06_000002_create_providers::Migration),
            Box::new(m2025_01_06_000003_create_identities::Migration),
            Box::new(m2025_01_06_000004_create_provider_keys::Migration),
            Box::new(m2025_01_06_000005_create_storage_mirrors::Migration),
            Box::new(m2025_01_06_000006_create_instances::Migration),
        ]
    }
}
