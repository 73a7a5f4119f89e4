use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240501_000001_create_catalog_tables::Migration),
            Box::new(m20240501_000002_create_office_inventory_table::Migration),
            Box::new(m20240501_000003_create_purchase_tables::Migration),
            Box::new(m20240501_000004_create_item_instances_table::Migration),
            Box::new(m20240501_000005_create_transfer_tables::Migration),
            Box::new(m20240501_000006_create_office_transactions_table::Migration),
        ]
    }
}

mod m20240501_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Offices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Offices::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Offices::Name).string().not_null())
                        .col(ColumnDef::new(Offices::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Offices::ParentId).integer().null())
                        .col(
                            ColumnDef::new(Offices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Offices::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_offices_parent_id")
                                .from(Offices::Table, Offices::ParentId)
                                .to(Offices::Table, Offices::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_offices_parent_id")
                        .table(Offices::Table)
                        .col(Offices::ParentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Items::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Items::Name).string().not_null())
                        .col(ColumnDef::new(Items::ItemCode).string().not_null().unique_key())
                        .col(ColumnDef::new(Items::Description).text().null())
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Offices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Offices {
        Table,
        Id,
        Name,
        Code,
        ParentId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(crate) enum Items {
        Table,
        Id,
        Name,
        ItemCode,
        Description,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240501_000002_create_office_inventory_table {

    use super::m20240501_000001_create_catalog_tables::{Items, Offices};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000002_create_office_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OfficeInventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OfficeInventory::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OfficeInventory::OfficeId).integer().not_null())
                        .col(ColumnDef::new(OfficeInventory::ItemId).integer().not_null())
                        .col(
                            ColumnDef::new(OfficeInventory::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(OfficeInventory::Quantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(OfficeInventory::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(OfficeInventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OfficeInventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_office_inventory_office_id")
                                .from(OfficeInventory::Table, OfficeInventory::OfficeId)
                                .to(Offices::Table, Offices::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_office_inventory_item_id")
                                .from(OfficeInventory::Table, OfficeInventory::ItemId)
                                .to(Items::Table, Items::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // The ledger's upsert relies on this key
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_office_inventory_office_item")
                        .table(OfficeInventory::Table)
                        .col(OfficeInventory::OfficeId)
                        .col(OfficeInventory::ItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_office_inventory_item_id")
                        .table(OfficeInventory::Table)
                        .col(OfficeInventory::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OfficeInventory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OfficeInventory {
        Table,
        Id,
        OfficeId,
        ItemId,
        Quantity,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240501_000003_create_purchase_tables {

    use super::m20240501_000001_create_catalog_tables::{Items, Offices};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000003_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Purchases::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Purchases::OfficeId).integer().not_null())
                        .col(ColumnDef::new(Purchases::VendorName).string().null())
                        .col(ColumnDef::new(Purchases::InvoiceNumber).string().null())
                        .col(
                            ColumnDef::new(Purchases::PurchasedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::CreatedBy).integer().not_null())
                        .col(
                            ColumnDef::new(Purchases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchases_office_id")
                                .from(Purchases::Table, Purchases::OfficeId)
                                .to(Offices::Table, Offices::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseLines::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PurchaseLines::PurchaseId).integer().not_null())
                        .col(ColumnDef::new(PurchaseLines::ItemId).integer().not_null())
                        .col(ColumnDef::new(PurchaseLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(PurchaseLines::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_lines_purchase_id")
                                .from(PurchaseLines::Table, PurchaseLines::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_lines_item_id")
                                .from(PurchaseLines::Table, PurchaseLines::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Purchases {
        Table,
        Id,
        OfficeId,
        VendorName,
        InvoiceNumber,
        PurchasedAt,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseLines {
        Table,
        Id,
        PurchaseId,
        ItemId,
        Quantity,
        UnitPrice,
    }
}

mod m20240501_000004_create_item_instances_table {

    use super::m20240501_000001_create_catalog_tables::{Items, Offices};
    use super::m20240501_000003_create_purchase_tables::Purchases;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000004_create_item_instances_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ItemInstances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemInstances::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ItemInstances::ItemId).integer().not_null())
                        .col(
                            ColumnDef::new(ItemInstances::Barcode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ItemInstances::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemInstances::Status)
                                .string_len(20)
                                .not_null()
                                .default("IN_STOCK"),
                        )
                        .col(
                            ColumnDef::new(ItemInstances::CurrentOfficeId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemInstances::DistributedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ItemInstances::PurchaseId).integer().null())
                        .col(ColumnDef::new(ItemInstances::Remarks).text().null())
                        .col(
                            ColumnDef::new(ItemInstances::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemInstances::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_instances_item_id")
                                .from(ItemInstances::Table, ItemInstances::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_instances_office_id")
                                .from(ItemInstances::Table, ItemInstances::CurrentOfficeId)
                                .to(Offices::Table, Offices::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_item_instances_purchase_id")
                                .from(ItemInstances::Table, ItemInstances::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_item_instances_office_item")
                        .table(ItemInstances::Table)
                        .col(ItemInstances::CurrentOfficeId)
                        .col(ItemInstances::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemInstances::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum ItemInstances {
        Table,
        Id,
        ItemId,
        Barcode,
        UnitPrice,
        Status,
        CurrentOfficeId,
        DistributedAt,
        PurchaseId,
        Remarks,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240501_000005_create_transfer_tables {

    use super::m20240501_000001_create_catalog_tables::{Items, Offices};
    use super::m20240501_000004_create_item_instances_table::ItemInstances;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000005_create_transfer_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transfers::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Transfers::ItemId).integer().not_null())
                        .col(ColumnDef::new(Transfers::FromOfficeId).integer().not_null())
                        .col(ColumnDef::new(Transfers::ToOfficeId).integer().not_null())
                        .col(
                            ColumnDef::new(Transfers::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(Transfers::Quantity).gt(0)),
                        )
                        .col(
                            ColumnDef::new(Transfers::InitiatedByUserId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transfers::Status)
                                .string_len(20)
                                .not_null()
                                .default("PENDING"),
                        )
                        .col(
                            ColumnDef::new(Transfers::TransferType)
                                .string_len(20)
                                .not_null()
                                .default("ALLOCATION"),
                        )
                        .col(
                            ColumnDef::new(Transfers::DateDistributed)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transfers::Remarks).text().null())
                        .col(
                            ColumnDef::new(Transfers::ReferenceNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Transfers::ApprovedBy).integer().null())
                        .col(
                            ColumnDef::new(Transfers::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transfers::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Transfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transfers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfers_item_id")
                                .from(Transfers::Table, Transfers::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfers_from_office_id")
                                .from(Transfers::Table, Transfers::FromOfficeId)
                                .to(Offices::Table, Offices::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfers_to_office_id")
                                .from(Transfers::Table, Transfers::ToOfficeId)
                                .to(Offices::Table, Offices::Id),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_transfers_from_office_id", Transfers::FromOfficeId),
                ("idx_transfers_to_office_id", Transfers::ToOfficeId),
                ("idx_transfers_status", Transfers::Status),
                ("idx_transfers_date_distributed", Transfers::DateDistributed),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Transfers::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(TransferInstances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferInstances::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransferInstances::TransferId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferInstances::InstanceId)
                                .integer()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_instances_transfer_id")
                                .from(TransferInstances::Table, TransferInstances::TransferId)
                                .to(Transfers::Table, Transfers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_instances_instance_id")
                                .from(TransferInstances::Table, TransferInstances::InstanceId)
                                .to(ItemInstances::Table, ItemInstances::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_instances_pair")
                        .table(TransferInstances::Table)
                        .col(TransferInstances::TransferId)
                        .col(TransferInstances::InstanceId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransferInstances::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Transfers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum Transfers {
        Table,
        Id,
        ItemId,
        FromOfficeId,
        ToOfficeId,
        Quantity,
        InitiatedByUserId,
        Status,
        TransferType,
        DateDistributed,
        Remarks,
        ReferenceNumber,
        ApprovedBy,
        ApprovedAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TransferInstances {
        Table,
        Id,
        TransferId,
        InstanceId,
    }
}

mod m20240501_000006_create_office_transactions_table {

    use super::m20240501_000001_create_catalog_tables::Items;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000006_create_office_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // transfer_id carries no foreign key: audit rows outlive deleted transfers
            manager
                .create_table(
                    Table::create()
                        .table(OfficeTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OfficeTransactions::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OfficeTransactions::ReferenceNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(OfficeTransactions::TransactionType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OfficeTransactions::ItemId).integer().not_null())
                        .col(ColumnDef::new(OfficeTransactions::FromOfficeId).integer().null())
                        .col(ColumnDef::new(OfficeTransactions::ToOfficeId).integer().null())
                        .col(ColumnDef::new(OfficeTransactions::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OfficeTransactions::Status)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OfficeTransactions::InitiatedBy)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OfficeTransactions::ApprovedBy).integer().null())
                        .col(
                            ColumnDef::new(OfficeTransactions::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OfficeTransactions::RejectionReason)
                                .text()
                                .null(),
                        )
                        .col(ColumnDef::new(OfficeTransactions::Remarks).text().null())
                        .col(ColumnDef::new(OfficeTransactions::TransferId).integer().null())
                        .col(
                            ColumnDef::new(OfficeTransactions::TransactionDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OfficeTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OfficeTransactions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_office_transactions_item_id")
                                .from(OfficeTransactions::Table, OfficeTransactions::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_office_transactions_from_office", OfficeTransactions::FromOfficeId),
                ("idx_office_transactions_to_office", OfficeTransactions::ToOfficeId),
                ("idx_office_transactions_item_id", OfficeTransactions::ItemId),
                ("idx_office_transactions_transfer_id", OfficeTransactions::TransferId),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(OfficeTransactions::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OfficeTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OfficeTransactions {
        Table,
        Id,
        ReferenceNumber,
        TransactionType,
        ItemId,
        FromOfficeId,
        ToOfficeId,
        Quantity,
        Status,
        InitiatedBy,
        ApprovedBy,
        ApprovedAt,
        RejectionReason,
        Remarks,
        TransferId,
        TransactionDate,
        CreatedAt,
        UpdatedAt,
    }
}
