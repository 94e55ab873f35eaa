//! Migration to create the provider_keys table.
//!
//! Stores the EC2-style access/secret pair issued by the Eucalyptus account
//! backend. `username` is deliberately not unique: legacy imports produced
//! duplicate rows, which the provisioning workflow collapses back to one.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderKeys::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderKeys::Username).text().not_null())
                    .col(ColumnDef::new(ProviderKeys::AccessKey).text().not_null())
                    .col(ColumnDef::new(ProviderKeys::SecretKey).text().not_null())
                    .col(ColumnDef::new(ProviderKeys::Ec2Url).text().not_null())
                    .col(
                        ColumnDef::new(ProviderKeys::S3Url)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(ProviderKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_keys_username")
                    .table(ProviderKeys::Table)
                    .col(ProviderKeys::Username)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_provider_keys_username").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProviderKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderKeys {
    Table,
    Id,
    Username,
    AccessKey,
    SecretKey,
    Ec2Url,
    S3Url,
    CreatedAt,
}
