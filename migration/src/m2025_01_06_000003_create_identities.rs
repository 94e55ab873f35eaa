//! Migration to create quotas, identities, credentials and the membership
//! tables that bind identities and providers to groups.
//!
//! The default quota is addressed by the unique `slug` column rather than by
//! matching its resource values, so concurrent provisioning runs cannot create
//! two default rows.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Quotas::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Quotas::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Quotas::Slug).text().null())
                    .col(ColumnDef::new(Quotas::Cpu).integer().not_null())
                    .col(ColumnDef::new(Quotas::Memory).integer().not_null())
                    .col(ColumnDef::new(Quotas::Storage).integer().not_null())
                    .col(
                        ColumnDef::new(Quotas::CreatedAt)
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
                    .name("idx_quotas_slug")
                    .table(Quotas::Table)
                    .col(Quotas::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Identities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Identities::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Identities::ProviderSlug).text().not_null())
                    .col(ColumnDef::new(Identities::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Identities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identities_provider_slug")
                            .from(Identities::Table, Identities::ProviderSlug)
                            .to(Providers::Table, Providers::Slug)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identities_created_by")
                            .from(Identities::Table, Identities::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identities_provider_owner")
                    .table(Identities::Table)
                    .col(Identities::ProviderSlug)
                    .col(Identities::CreatedBy)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Credentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credentials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Credentials::IdentityId).uuid().not_null())
                    .col(ColumnDef::new(Credentials::Key).text().not_null())
                    .col(ColumnDef::new(Credentials::Value).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_credentials_identity_id")
                            .from(Credentials::Table, Credentials::IdentityId)
                            .to(Identities::Table, Identities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_credentials_identity_key")
                    .table(Credentials::Table)
                    .col(Credentials::IdentityId)
                    .col(Credentials::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdentityMemberships::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IdentityMemberships::IdentityId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IdentityMemberships::GroupId).uuid().not_null())
                    .col(ColumnDef::new(IdentityMemberships::QuotaId).uuid().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_memberships_identity_id")
                            .from(IdentityMemberships::Table, IdentityMemberships::IdentityId)
                            .to(Identities::Table, Identities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_identity_memberships_quota_id")
                            .from(IdentityMemberships::Table, IdentityMemberships::QuotaId)
                            .to(Quotas::Table, Quotas::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identity_memberships_identity_group")
                    .table(IdentityMemberships::Table)
                    .col(IdentityMemberships::IdentityId)
                    .col(IdentityMemberships::GroupId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProviderMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderMemberships::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProviderMemberships::ProviderSlug)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProviderMemberships::GroupId).uuid().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_memberships_provider_group")
                    .table(ProviderMemberships::Table)
                    .col(ProviderMemberships::ProviderSlug)
                    .col(ProviderMemberships::GroupId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index in [
            "idx_provider_memberships_provider_group",
            "idx_identity_memberships_identity_group",
            "idx_credentials_identity_key",
            "idx_identities_provider_owner",
            "idx_quotas_slug",
        ] {
            manager
                .drop_index(Index::drop().name(index).to_owned())
                .await?;
        }

        manager
            .drop_table(Table::drop().table(ProviderMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityMemberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Credentials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Identities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quotas::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Quotas {
    Table,
    Id,
    Slug,
    Cpu,
    Memory,
    Storage,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Identities {
    Table,
    Id,
    ProviderSlug,
    CreatedBy,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Credentials {
    Table,
    Id,
    IdentityId,
    Key,
    Value,
}

#[derive(DeriveIden)]
enum IdentityMemberships {
    Table,
    Id,
    IdentityId,
    GroupId,
    QuotaId,
}

#[derive(DeriveIden)]
enum ProviderMemberships {
    Table,
    Id,
    ProviderSlug,
    GroupId,
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Slug,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
