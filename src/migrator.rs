use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_party_tables::Migration),
            Box::new(m20250101_000002_create_quotation_tables::Migration),
            Box::new(m20250101_000003_create_sale_order_tables::Migration),
            Box::new(m20250101_000004_create_fulfillment_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20250101_000001_create_party_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_party_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Riders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Riders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Riders::FullName).string().not_null())
                        .col(ColumnDef::new(Riders::Email).string().null())
                        .col(ColumnDef::new(Riders::Phone).string().null())
                        .col(
                            ColumnDef::new(Riders::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Riders::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Stores::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Stores::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stores::Name).string().not_null())
                        .col(ColumnDef::new(Stores::Latitude).double().null())
                        .col(ColumnDef::new(Stores::Longitude).double().null())
                        .col(
                            ColumnDef::new(Stores::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Stores::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ResellerProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ResellerProfiles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ResellerProfiles::ResellerId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ResellerProfiles::CreditLimit)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ResellerProfiles::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ResellerProfiles::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ResellerProfiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Stores::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Riders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Riders {
        Table,
        Id,
        FullName,
        Email,
        Phone,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Stores {
        Table,
        Id,
        Name,
        Latitude,
        Longitude,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum ResellerProfiles {
        Table,
        Id,
        ResellerId,
        CreditLimit,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_quotation_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_quotation_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Quotations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Quotations::QuoteNumber).string().not_null())
                        .col(ColumnDef::new(Quotations::SaleType).string().not_null())
                        .col(ColumnDef::new(Quotations::Status).string().not_null())
                        .col(ColumnDef::new(Quotations::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Quotations::ConsumerId).uuid().null())
                        .col(ColumnDef::new(Quotations::ResellerId).uuid().null())
                        .col(ColumnDef::new(Quotations::BillerId).uuid().null())
                        .col(
                            ColumnDef::new(Quotations::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Quotations::RequiresDelivery)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Quotations::DeliveryAddress).string().null())
                        .col(ColumnDef::new(Quotations::Notes).string().null())
                        .col(ColumnDef::new(Quotations::SaleOrderId).uuid().null())
                        .col(ColumnDef::new(Quotations::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Quotations::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Quotations::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotations_status")
                        .table(Quotations::Table)
                        .col(Quotations::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotations_reseller_id")
                        .table(Quotations::Table)
                        .col(Quotations::ResellerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuotationItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuotationItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationItems::QuotationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationItems::ProductVariantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(QuotationItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(QuotationItems::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(QuotationItems::CreatedAt)
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
                        .name("idx_quotation_items_quotation_id")
                        .table(QuotationItems::Table)
                        .col(QuotationItems::QuotationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuotationItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Quotations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Quotations {
        Table,
        Id,
        QuoteNumber,
        SaleType,
        Status,
        StoreId,
        ConsumerId,
        ResellerId,
        BillerId,
        TotalAmount,
        RequiresDelivery,
        DeliveryAddress,
        Notes,
        SaleOrderId,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    pub(super) enum QuotationItems {
        Table,
        Id,
        QuotationId,
        ProductVariantId,
        Quantity,
        UnitPrice,
        CreatedAt,
    }
}

mod m20250101_000003_create_sale_order_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_sale_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SaleOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleOrders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(SaleOrders::StoreId).uuid().not_null())
                        .col(ColumnDef::new(SaleOrders::BillerId).uuid().null())
                        .col(ColumnDef::new(SaleOrders::SaleType).string().not_null())
                        .col(ColumnDef::new(SaleOrders::Status).string().not_null())
                        .col(ColumnDef::new(SaleOrders::Phase).string().not_null())
                        .col(
                            ColumnDef::new(SaleOrders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SaleOrders::QuotationId).uuid().null())
                        .col(ColumnDef::new(SaleOrders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(SaleOrders::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(SaleOrders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_orders_store_id")
                        .table(SaleOrders::Table)
                        .col(SaleOrders::StoreId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::SaleOrderId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::Method).string().null())
                        .col(ColumnDef::new(Payments::Reference).string().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Payments::ConfirmedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_sale_order_id")
                        .table(Payments::Table)
                        .col(Payments::SaleOrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderOverrides::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderOverrides::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderOverrides::SaleOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderOverrides::Kind).string().not_null())
                        .col(
                            ColumnDef::new(OrderOverrides::ApprovedAmount)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(OrderOverrides::GrantedBy).uuid().null())
                        .col(ColumnDef::new(OrderOverrides::ExpiresAt).timestamp().null())
                        .col(
                            ColumnDef::new(OrderOverrides::CreatedAt)
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
                        .name("idx_order_overrides_sale_order_id")
                        .table(OrderOverrides::Table)
                        .col(OrderOverrides::SaleOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderOverrides::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum SaleOrders {
        Table,
        Id,
        OrderNumber,
        StoreId,
        BillerId,
        SaleType,
        Status,
        Phase,
        TotalAmount,
        QuotationId,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    pub(super) enum Payments {
        Table,
        Id,
        SaleOrderId,
        Amount,
        Status,
        Method,
        Reference,
        CreatedAt,
        ConfirmedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderOverrides {
        Table,
        Id,
        SaleOrderId,
        Kind,
        ApprovedAmount,
        GrantedBy,
        ExpiresAt,
        CreatedAt,
    }
}

mod m20250101_000004_create_fulfillment_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_fulfillment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Fulfillments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Fulfillments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Fulfillments::SaleOrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Fulfillments::FulfillmentType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Fulfillments::Status).string().not_null())
                        .col(
                            ColumnDef::new(Fulfillments::DeliveryPersonnelId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Fulfillments::DeliveryAddress)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Fulfillments::DeliveryLatitude)
                                .double()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Fulfillments::DeliveryLongitude)
                                .double()
                                .null(),
                        )
                        .col(ColumnDef::new(Fulfillments::Cost).decimal().null())
                        .col(
                            ColumnDef::new(Fulfillments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Fulfillments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fulfillments_status")
                        .table(Fulfillments::Table)
                        .col(Fulfillments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FulfillmentRiderInterests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::FulfillmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::RiderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::EtaMinutes)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::Message)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::ProposedCost)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::ExpiresAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentRiderInterests::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One bid per rider per fulfillment; registration is an upsert.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_rider_interests_fulfillment_rider")
                        .table(FulfillmentRiderInterests::Table)
                        .col(FulfillmentRiderInterests::FulfillmentId)
                        .col(FulfillmentRiderInterests::RiderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RiderCoverageAreas::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RiderCoverageAreas::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RiderCoverageAreas::RiderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RiderCoverageAreas::StoreId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RiderCoverageAreas::ServiceRadiusKm)
                                .double()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RiderCoverageAreas::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RiderCoverageAreas::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_rider_coverage_rider_store")
                        .table(RiderCoverageAreas::Table)
                        .col(RiderCoverageAreas::RiderId)
                        .col(RiderCoverageAreas::StoreId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RiderCoverageAreas::Table).to_owned())
                .await?;
            manager
                .drop_table(
                    Table::drop()
                        .table(FulfillmentRiderInterests::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(Fulfillments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Fulfillments {
        Table,
        Id,
        SaleOrderId,
        FulfillmentType,
        Status,
        DeliveryPersonnelId,
        DeliveryAddress,
        DeliveryLatitude,
        DeliveryLongitude,
        Cost,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum FulfillmentRiderInterests {
        Table,
        Id,
        FulfillmentId,
        RiderId,
        Status,
        EtaMinutes,
        Message,
        ProposedCost,
        ExpiresAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum RiderCoverageAreas {
        Table,
        Id,
        RiderId,
        StoreId,
        ServiceRadiusKm,
        CreatedAt,
        UpdatedAt,
    }
}
