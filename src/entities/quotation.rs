use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle states of a quotation.
///
/// `Approved`, `Rejected` and `Cancelled` are terminal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum QuotationStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Sent")]
    Sent,
    #[sea_orm(string_value = "Confirmed")]
    Confirmed,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl QuotationStatus {
    /// Terminal states accept no further transitions and no edits.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    /// Line items may only change while the quotation is still negotiable.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Sent)
    }
}

/// Whether the quotation (and the order it becomes) is a consumer or a
/// reseller sale. Reseller orders participate in credit gating.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SaleType {
    #[sea_orm(string_value = "Consumer")]
    Consumer,
    #[sea_orm(string_value = "Reseller")]
    Reseller,
}

/// The `quotations` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "quotations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 50))]
    pub quote_number: String,

    pub sale_type: SaleType,
    pub status: QuotationStatus,

    pub store_id: Uuid,
    pub consumer_id: Option<Uuid>,
    pub reseller_id: Option<Uuid>,
    pub biller_id: Option<Uuid>,

    /// Derived: always equals the sum of quantity * unit_price over items.
    pub total_amount: Decimal,

    pub requires_delivery: bool,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,

    /// Set if and only if status is Approved.
    pub sale_order_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quotation_item::Entity")]
    Items,
}

impl Related<super::quotation_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
