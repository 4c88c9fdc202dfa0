use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use super::quotation::SaleType;

/// Payment-side status of a sale order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SaleOrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Fulfilled")]
    Fulfilled,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

/// Downstream progress of the order, independent of payment status.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderPhase {
    #[sea_orm(string_value = "Quotation")]
    Quotation,
    #[sea_orm(string_value = "Sale")]
    Sale,
    #[sea_orm(string_value = "Fulfillment")]
    Fulfillment,
}

/// The `sale_orders` table. Rows are created exclusively by the quotation
/// approval transition, never directly.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_number: String,
    pub store_id: Uuid,
    pub biller_id: Option<Uuid>,

    pub sale_type: SaleType,
    pub status: SaleOrderStatus,
    pub phase: OrderPhase,

    pub total_amount: Decimal,
    pub quotation_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::fulfillment::Entity")]
    Fulfillment,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
    #[sea_orm(has_many = "super::order_override::Entity")]
    Overrides,
}

impl Related<super::fulfillment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fulfillment.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::order_override::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Overrides.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
