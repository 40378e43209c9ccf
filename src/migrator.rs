use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_customers_table::Migration),
            Box::new(m20240601_000002_create_product_variants_table::Migration),
            Box::new(m20240601_000003_create_shipping_companies_table::Migration),
            Box::new(m20240601_000004_create_coupons_table::Migration),
            Box::new(m20240601_000005_create_orders_table::Migration),
            Box::new(m20240601_000006_create_order_items_table::Migration),
            Box::new(m20240601_000007_create_wallet_transactions_table::Migration),
        ]
    }
}

mod m20240601_000001_create_customers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Customers::WalletBalance)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        WalletBalance,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_product_variants_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_product_variants_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::Sku).string().not_null())
                        .col(ColumnDef::new(ProductVariants::Title).string().not_null())
                        .col(ColumnDef::new(ProductVariants::ImageRef).string())
                        .col(ColumnDef::new(ProductVariants::Color).string())
                        .col(ColumnDef::new(ProductVariants::Size).string())
                        .col(
                            ColumnDef::new(ProductVariants::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::Cost).decimal_len(16, 4))
                        .col(
                            ColumnDef::new(ProductVariants::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_variants_product_sku")
                        .table(ProductVariants::Table)
                        .col(ProductVariants::ProductId)
                        .col(ProductVariants::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductVariants {
        Table,
        Id,
        ProductId,
        Sku,
        Title,
        ImageRef,
        Color,
        Size,
        Price,
        Cost,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_shipping_companies_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_shipping_companies_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShippingCompanies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShippingCompanies::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShippingCompanies::Name).string().not_null())
                        .col(
                            ColumnDef::new(ShippingCompanies::Price)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingCompanies::EstimatedDays)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingCompanies::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ShippingCompanies::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShippingCompanies::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShippingCompanies::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShippingCompanies {
        Table,
        Id,
        Name,
        Price,
        EstimatedDays,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000004_create_coupons_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_coupons_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Coupons::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Coupons::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Coupons::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Coupons::Kind).string_len(20).not_null())
                        .col(ColumnDef::new(Coupons::Value).decimal_len(16, 4).not_null())
                        .col(ColumnDef::new(Coupons::MinOrderAmount).decimal_len(16, 4))
                        .col(ColumnDef::new(Coupons::MaxCashback).decimal_len(16, 4))
                        .col(
                            ColumnDef::new(Coupons::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Coupons::StartsAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(Coupons::ExpiresAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Coupons::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Coupons::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Coupons::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Coupons {
        Table,
        Id,
        Code,
        Kind,
        Value,
        MinOrderAmount,
        MaxCashback,
        Active,
        StartsAt,
        ExpiresAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000005_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_create_orders_table"
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
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentStatus)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::PaymentMethod)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(16, 4).not_null())
                        .col(
                            ColumnDef::new(Orders::VatAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ShippingCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CashbackAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::ProcessorFee)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::NetMargin)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::CouponCode).string())
                        .col(ColumnDef::new(Orders::ShippingCompanyId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ShippingMethod).string().not_null())
                        .col(ColumnDef::new(Orders::DeliveryAddress).string().not_null())
                        .col(ColumnDef::new(Orders::TrackingNumber).string())
                        .col(
                            ColumnDef::new(Orders::ShipmentRegistered)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
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

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        Status,
        PaymentStatus,
        PaymentMethod,
        Subtotal,
        VatAmount,
        ShippingCost,
        DiscountAmount,
        CashbackAmount,
        ProcessorFee,
        NetMargin,
        TotalAmount,
        Currency,
        CouponCode,
        ShippingCompanyId,
        ShippingMethod,
        DeliveryAddress,
        TrackingNumber,
        ShipmentRegistered,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000006_create_order_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000006_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::VariantSku).string().not_null())
                        .col(ColumnDef::new(OrderItems::Title).string().not_null())
                        .col(ColumnDef::new(OrderItems::ImageRef).string())
                        .col(ColumnDef::new(OrderItems::Color).string())
                        .col(ColumnDef::new(OrderItems::Size).string())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UnitCost)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        VariantSku,
        Title,
        ImageRef,
        Color,
        Size,
        Quantity,
        UnitPrice,
        UnitCost,
        LineTotal,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }
}

mod m20240601_000007_create_wallet_transactions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000007_create_wallet_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WalletTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WalletTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletTransactions::CustomerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletTransactions::Amount)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletTransactions::Kind)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WalletTransactions::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WalletTransactions::OrderId).uuid())
                        .col(
                            ColumnDef::new(WalletTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_wallet_transactions_customer_id")
                                .from(WalletTransactions::Table, WalletTransactions::CustomerId)
                                .to(Customers::Table, Customers::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wallet_transactions_customer_id")
                        .table(WalletTransactions::Table)
                        .col(WalletTransactions::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wallet_transactions_order_id")
                        .table(WalletTransactions::Table)
                        .col(WalletTransactions::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WalletTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WalletTransactions {
        Table,
        Id,
        CustomerId,
        Amount,
        Kind,
        Description,
        OrderId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
    }
}
