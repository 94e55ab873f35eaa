//! Migration to create the instances and machine_requests tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Instances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Instances::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Instances::ProviderAlias).text().not_null())
                    .col(ColumnDef::new(Instances::ProviderSlug).text().not_null())
                    .col(ColumnDef::new(Instances::IdentityId).uuid().not_null())
                    .col(ColumnDef::new(Instances::Name).text().not_null())
                    .col(ColumnDef::new(Instances::SizeAlias).text().not_null())
                    .col(ColumnDef::new(Instances::SourceType).text().not_null())
                    .col(ColumnDef::new(Instances::SourceAlias).text().not_null())
                    .col(ColumnDef::new(Instances::Status).text().not_null())
                    .col(ColumnDef::new(Instances::IpAddress).text().null())
                    .col(
                        ColumnDef::new(Instances::StartDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Instances::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_instances_identity_id")
                            .from(Instances::Table, Instances::IdentityId)
                            .to(Identities::Table, Identities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_instances_provider_alias")
                    .table(Instances::Table)
                    .col(Instances::ProviderSlug)
                    .col(Instances::ProviderAlias)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MachineRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MachineRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MachineRequests::InstanceId).uuid().not_null())
                    .col(ColumnDef::new(MachineRequests::Status).text().not_null())
                    .col(
                        ColumnDef::new(MachineRequests::ParentMachine)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::IplantSysFiles)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::InstalledSoftware)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::ExcludeFiles)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::AccessList)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::NewMachineProvider)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::NewMachineName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::NewMachineOwner)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::NewMachineVisibility)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::NewMachineDescription)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::NewMachineTags)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::StartDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MachineRequests::EndDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(MachineRequests::NewMachine).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_machine_requests_instance_id")
                            .from(MachineRequests::Table, MachineRequests::InstanceId)
                            .to(Instances::Table, Instances::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MachineRequests::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_instances_provider_alias").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Instances::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Instances {
    Table,
    Id,
    ProviderAlias,
    ProviderSlug,
    IdentityId,
    Name,
    SizeAlias,
    SourceType,
    SourceAlias,
    Status,
    IpAddress,
    StartDate,
    EndDate,
}

#[derive(DeriveIden)]
enum MachineRequests {
    Table,
    Id,
    InstanceId,
    Status,
    ParentMachine,
    IplantSysFiles,
    InstalledSoftware,
    ExcludeFiles,
    AccessList,
    NewMachineProvider,
    NewMachineName,
    NewMachineOwner,
    NewMachineVisibility,
    NewMachineDescription,
    NewMachineTags,
    StartDate,
    EndDate,
    NewMachine,
}

#[derive(DeriveIden)]
enum Identities {
    Table,
    Id,
}
