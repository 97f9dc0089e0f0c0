use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241201_000001_create_registrations_table::Migration),
            Box::new(m20241201_000002_add_payment_reference_columns::Migration),
        ]
    }
}

mod m20241201_000001_create_registrations_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241201_000001_create_registrations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Registrations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Registrations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Registrations::Name).string().not_null())
                        .col(ColumnDef::new(Registrations::Email).string().not_null())
                        .col(ColumnDef::new(Registrations::Phone).string().not_null())
                        .col(ColumnDef::new(Registrations::BusinessName).string().null())
                        .col(ColumnDef::new(Registrations::GstNumber).string().null())
                        .col(ColumnDef::new(Registrations::ReasonToAttend).text().null())
                        .col(ColumnDef::new(Registrations::ReferredBy).string().null())
                        .col(ColumnDef::new(Registrations::EventSlug).string().null())
                        .col(
                            ColumnDef::new(Registrations::Amount)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Registrations::PaidFor).string().not_null())
                        .col(
                            ColumnDef::new(Registrations::IsEvent)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Registrations::CouponCode).string().null())
                        .col(ColumnDef::new(Registrations::UtmSource).string().null())
                        .col(ColumnDef::new(Registrations::UtmMedium).string().null())
                        .col(ColumnDef::new(Registrations::UtmCampaign).string().null())
                        .col(
                            ColumnDef::new(Registrations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // NULL coupon codes never collide, so only redemptions are unique.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("uq_registrations_phone_coupon")
                        .table(Registrations::Table)
                        .col(Registrations::Phone)
                        .col(Registrations::CouponCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_registrations_created_at")
                        .table(Registrations::Table)
                        .col(Registrations::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Registrations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Registrations {
        Table,
        Id,
        Name,
        Email,
        Phone,
        BusinessName,
        GstNumber,
        ReasonToAttend,
        ReferredBy,
        EventSlug,
        Amount,
        PaidFor,
        IsEvent,
        CouponCode,
        UtmSource,
        UtmMedium,
        UtmCampaign,
        CreatedAt,
    }
}

mod m20241201_000002_add_payment_reference_columns {
    use super::m20241201_000001_create_registrations_table::Registrations;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241201_000002_add_payment_reference_columns"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // SQLite only accepts one column per ALTER TABLE.
            manager
                .alter_table(
                    Table::alter()
                        .table(Registrations::Table)
                        .add_column(
                            ColumnDef::new(PaymentRefs::PaymentId).string().null(),
                        )
                        .to_owned(),
                )
                .await?;
            manager
                .alter_table(
                    Table::alter()
                        .table(Registrations::Table)
                        .add_column(
                            ColumnDef::new(PaymentRefs::OrderId).string().null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .alter_table(
                    Table::alter()
                        .table(Registrations::Table)
                        .drop_column(PaymentRefs::OrderId)
                        .to_owned(),
                )
                .await?;
            manager
                .alter_table(
                    Table::alter()
                        .table(Registrations::Table)
                        .drop_column(PaymentRefs::PaymentId)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PaymentRefs {
        PaymentId,
        OrderId,
    }
}
