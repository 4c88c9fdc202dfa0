use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `stores` table. Coordinates, when present, feed the routing
/// collaborator for coverage distance checks.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rider_coverage_area::Entity")]
    CoverageAreas,
}

impl Related<super::rider_coverage_area::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CoverageAreas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
