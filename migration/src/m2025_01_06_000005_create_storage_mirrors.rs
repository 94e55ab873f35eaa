//! Migration to create the volumes, snapshots and snapshot_cleanups tables.
//!
//! Volume and snapshot rows mirror resources owned by a remote provider and
//! are keyed by the provider-assigned id (`provider_alias`). Rows are never
//! deleted; `end_date` marks the end of the resource's life.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Volumes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Volumes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Volumes::ProviderAlias).text().not_null())
                    .col(ColumnDef::new(Volumes::ProviderSlug).text().not_null())
                    .col(ColumnDef::new(Volumes::IdentityId).uuid().not_null())
                    .col(ColumnDef::new(Volumes::Name).text().not_null())
                    .col(ColumnDef::new(Volumes::Description).text().null())
                    .col(ColumnDef::new(Volumes::Size).integer().not_null())
                    .col(ColumnDef::new(Volumes::Status).text().not_null())
                    .col(ColumnDef::new(Volumes::CreatedBy).text().not_null())
                    .col(ColumnDef::new(Volumes::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Volumes::StartDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Volumes::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_volumes_identity_id")
                            .from(Volumes::Table, Volumes::IdentityId)
                            .to(Identities::Table, Identities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_volumes_provider_alias")
                    .table(Volumes::Table)
                    .col(Volumes::ProviderSlug)
                    .col(Volumes::ProviderAlias)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Snapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Snapshots::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Snapshots::ProviderAlias).text().not_null())
                    .col(ColumnDef::new(Snapshots::ProviderSlug).text().not_null())
                    .col(ColumnDef::new(Snapshots::IdentityId).uuid().not_null())
                    .col(ColumnDef::new(Snapshots::VolumeAlias).text().not_null())
                    .col(ColumnDef::new(Snapshots::Name).text().not_null())
                    .col(ColumnDef::new(Snapshots::Description).text().null())
                    .col(ColumnDef::new(Snapshots::Size).integer().not_null())
                    .col(ColumnDef::new(Snapshots::Status).text().not_null())
                    .col(
                        ColumnDef::new(Snapshots::StartDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Snapshots::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_snapshots_identity_id")
                            .from(Snapshots::Table, Snapshots::IdentityId)
                            .to(Identities::Table, Identities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_snapshots_provider_alias")
                    .table(Snapshots::Table)
                    .col(Snapshots::ProviderSlug)
                    .col(Snapshots::ProviderAlias)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SnapshotCleanups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SnapshotCleanups::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SnapshotCleanups::ProviderSlug)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SnapshotCleanups::IdentityId).uuid().not_null())
                    .col(
                        ColumnDef::new(SnapshotCleanups::SnapshotAlias)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SnapshotCleanups::Reason).text().not_null())
                    .col(
                        ColumnDef::new(SnapshotCleanups::Resolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SnapshotCleanups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SnapshotCleanups::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_snapshots_provider_alias").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Snapshots::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_volumes_provider_alias").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Volumes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Volumes {
    Table,
    Id,
    ProviderAlias,
    ProviderSlug,
    IdentityId,
    Name,
    Description,
    Size,
    Status,
    CreatedBy,
    Metadata,
    StartDate,
    EndDate,
}

#[derive(DeriveIden)]
enum Snapshots {
    Table,
    Id,
    ProviderAlias,
    ProviderSlug,
    IdentityId,
    VolumeAlias,
    Name,
    Description,
    Size,
    Status,
    StartDate,
    EndDate,
}

#[derive(DeriveIden)]
enum SnapshotCleanups {
    Table,
    Id,
    ProviderSlug,
    IdentityId,
    SnapshotAlias,
    Reason,
    Resolved,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Identities {
    Table,
    Id,
}
