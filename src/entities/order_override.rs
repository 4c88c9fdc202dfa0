use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of administrative exception granted on a sale order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OverrideKind {
    /// Bypasses the credit arithmetic entirely.
    #[sea_orm(string_value = "Admin")]
    Admin,
    /// Permits advancement while outstanding <= approved_amount.
    #[sea_orm(string_value = "Credit")]
    Credit,
}

/// The `order_overrides` table. Rows are append-only; expiry is
/// evaluated at read time, there is no revoke and no sweeper.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_overrides")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub sale_order_id: Uuid,
    pub kind: OverrideKind,

    /// Required for Credit overrides, null for Admin.
    pub approved_amount: Option<Decimal>,
    pub granted_by: Option<Uuid>,

    /// Null means the override never expires.
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_unexpired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |exp| now < exp)
    }
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
