use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `riders` table. Delivery personnel eligible for assignment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "riders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rider_coverage_area::Entity")]
    CoverageAreas,
    #[sea_orm(has_many = "super::fulfillment_rider_interest::Entity")]
    Interests,
}

impl Related<super::rider_coverage_area::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CoverageAreas.def()
    }
}

impl Related<super::fulfillment_rider_interest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Interests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
