use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the order leaves the store.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum FulfillmentType {
    #[sea_orm(string_value = "Delivery")]
    Delivery,
    #[sea_orm(string_value = "Pickup")]
    Pickup,
}

/// Fulfillment progress. `Completed` and `Cancelled` are terminal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum FulfillmentStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "InProgress")]
    InProgress,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl FulfillmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// The `fulfillments` table. 1:1 with a sale order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fulfillments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub sale_order_id: Uuid,

    pub fulfillment_type: FulfillmentType,
    pub status: FulfillmentStatus,

    /// Null until a rider wins the assignment.
    pub delivery_personnel_id: Option<Uuid>,
    pub delivery_address: Option<String>,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub cost: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale_order::Entity",
        from = "Column::SaleOrderId",
        to = "super::sale_order::Column::Id"
    )]
    SaleOrder,
    #[sea_orm(has_many = "super::fulfillment_rider_interest::Entity")]
    RiderInterests,
}

impl Related<super::sale_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleOrder.def()
    }
}

impl Related<super::fulfillment_rider_interest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RiderInterests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
