use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of one rider's bid on one delivery fulfillment.
///
/// Rows are never deleted; withdrawal and rejection are recorded as
/// status changes so the bid history stays queryable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RiderInterestStatus {
    #[sea_orm(string_value = "Active")]
    Active,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Withdrawn")]
    Withdrawn,
}

/// The `fulfillment_rider_interests` table. Unique per
/// (fulfillment_id, rider_id); at most one row per fulfillment may ever
/// be `Assigned`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fulfillment_rider_interests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub fulfillment_id: Uuid,
    pub rider_id: Uuid,

    pub status: RiderInterestStatus,

    pub eta_minutes: Option<i32>,
    pub message: Option<String>,
    pub proposed_cost: Option<Decimal>,

    /// Derived from eta_minutes at registration; evaluated lazily at
    /// read time, never swept.
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// An Active row past its expiry no longer counts as a live bid.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == RiderInterestStatus::Active
            && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fulfillment::Entity",
        from = "Column::FulfillmentId",
        to = "super::fulfillment::Column::Id"
    )]
    Fulfillment,
    #[sea_orm(
        belongs_to = "super::rider::Entity",
        from = "Column::RiderId",
        to = "super::rider::Column::Id"
    )]
    Rider,
}

impl Related<super::fulfillment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fulfillment.def()
    }
}

impl Related<super::rider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
