use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Only `Confirmed` payments count toward an order's outstanding amount.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Confirmed")]
    Confirmed,
    #[sea_orm(string_value = "Failed")]
    Failed,
}

/// The `payments` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub sale_order_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub reference: Option<String>,

    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale_order::Entity",
        from = "Column::SaleOrderId",
        to = "super::sale_order::Column::Id"
    )]
    SaleOrder,
}

impl Related<super::sale_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
