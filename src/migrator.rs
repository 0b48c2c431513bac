use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_companies_table::Migration),
            Box::new(m20240101_000002_create_orders_table::Migration),
            Box::new(m20240101_000003_create_order_line_items_table::Migration),
            Box::new(m20240101_000004_create_serial_counters_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_companies_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_companies_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Companies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Companies::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Companies::Code).string().not_null())
                        .col(ColumnDef::new(Companies::Name).string().not_null())
                        .col(ColumnDef::new(Companies::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Companies::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_companies_code")
                        .table(Companies::Table)
                        .col(Companies::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Companies::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Companies {
        Table,
        Id,
        Code,
        Name,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderType).string().not_null())
                        .col(ColumnDef::new(Orders::OrderCode).string().not_null())
                        .col(ColumnDef::new(Orders::GlobalSerial).big_integer().not_null())
                        .col(
                            ColumnDef::new(Orders::CompanySerial)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::CompanyId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::OverallDiscount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAfterDiscount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TaxPercentage)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TaxAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::GrandTotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::RecordState).string().not_null())
                        .col(ColumnDef::new(Orders::ApprovedBy).uuid().null())
                        .col(ColumnDef::new(Orders::ApprovedAt).timestamp().null())
                        .col(ColumnDef::new(Orders::DeletedAt).timestamp().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // Uniqueness backstops for serial and code assignment; a
            // violation here means concurrency control failed upstream.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_type_code")
                        .table(Orders::Table)
                        .col(Orders::OrderType)
                        .col(Orders::OrderCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_type_company_serial")
                        .table(Orders::Table)
                        .col(Orders::OrderType)
                        .col(Orders::CompanyId)
                        .col(Orders::CompanySerial)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_type_global_serial")
                        .table(Orders::Table)
                        .col(Orders::OrderType)
                        .col(Orders::GlobalSerial)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_company_id")
                        .table(Orders::Table)
                        .col(Orders::CompanyId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Orders {
        Table,
        Id,
        OrderType,
        OrderCode,
        GlobalSerial,
        CompanySerial,
        CompanyId,
        Subtotal,
        OverallDiscount,
        TotalAfterDiscount,
        TaxPercentage,
        TaxAmount,
        GrandTotal,
        Status,
        RecordState,
        ApprovedBy,
        ApprovedAt,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000003_create_order_line_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_line_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderLineItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLineItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLineItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLineItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderLineItems::Position).integer().not_null())
                        .col(ColumnDef::new(OrderLineItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderLineItems::UnitPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(OrderLineItems::Discount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderLineItems::LineTotal).decimal().not_null())
                        .col(
                            ColumnDef::new(OrderLineItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_line_items_order_id")
                        .table(OrderLineItems::Table)
                        .col(OrderLineItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLineItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum OrderLineItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Position,
        Quantity,
        UnitPrice,
        Discount,
        LineTotal,
        CreatedAt,
    }
}

mod m20240101_000004_create_serial_counters_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_serial_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SerialCounters::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SerialCounters::OrderType).string().not_null())
                        .col(ColumnDef::new(SerialCounters::CompanyId).uuid().not_null())
                        .col(
                            ColumnDef::new(SerialCounters::LastSerial)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .primary_key(
                            Index::create()
                                .col(SerialCounters::OrderType)
                                .col(SerialCounters::CompanyId),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SerialCounters::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum SerialCounters {
        Table,
        OrderType,
        CompanyId,
        LastSerial,
    }
}
