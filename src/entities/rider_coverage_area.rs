use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `rider_coverage_areas` table. Unique per (rider_id, store_id).
///
/// A rider's coverage set is always replaced as a whole; partial updates
/// are never observable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rider_coverage_areas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub rider_id: Uuid,
    pub store_id: Uuid,

    /// Optional service radius around the store, kilometers.
    pub service_radius_km: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rider::Entity",
        from = "Column::RiderId",
        to = "super::rider::Column::Id"
    )]
    Rider,
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
}

impl Related<super::rider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rider.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
