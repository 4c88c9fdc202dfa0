use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::{DatabaseAccess, DbPool},
    entities::{
        fulfillment::Entity as FulfillmentEntity,
        rider::{self, Entity as RiderEntity},
        rider_coverage_area::{
            self, ActiveModel as CoverageActiveModel, Entity as CoverageEntity,
        },
        sale_order::Entity as SaleOrderEntity,
        store::Entity as StoreEntity,
        FulfillmentType,
    },
    errors::ServiceError,
    services::routing::{Coordinates, RouteEstimator, RoutingProfile},
};

/// One entry in a coverage replacement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageEntryInput {
    pub store_id: Uuid,
    pub service_radius_km: Option<f64>,
}

/// A rider considered for a delivery, with the routing refinement when
/// the collaborator could supply one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibleRider {
    pub rider_id: Uuid,
    pub full_name: String,
    pub service_radius_km: Option<f64>,
    /// None when the routing collaborator failed or coordinates are
    /// missing; the rider stays eligible with distance unknown.
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
}

/// Maintains which stores each rider services. The coverage set is only
/// ever replaced wholesale, inside one transaction.
#[derive(Clone)]
pub struct RiderCoverageService {
    db: Arc<DbPool>,
    db_access: DatabaseAccess,
    routing: Arc<dyn RouteEstimator>,
}

impl RiderCoverageService {
    pub fn new(db: Arc<DbPool>, routing: Arc<dyn RouteEstimator>) -> Self {
        Self {
            db_access: DatabaseAccess::new(db.clone()),
            db,
            routing,
        }
    }

    async fn require_rider(&self, rider_id: Uuid) -> Result<rider::Model, ServiceError> {
        RiderEntity::find_by_id(rider_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Rider {} not found", rider_id)))
    }

    /// Lists a rider's coverage rows, oldest first.
    #[instrument(skip(self), fields(rider_id = %rider_id))]
    pub async fn list_for_rider(
        &self,
        rider_id: Uuid,
    ) -> Result<Vec<rider_coverage_area::Model>, ServiceError> {
        self.require_rider(rider_id).await?;

        let rows = CoverageEntity::find()
            .filter(rider_coverage_area::Column::RiderId.eq(rider_id))
            .order_by_asc(rider_coverage_area::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(rows)
    }

    /// Replaces the rider's coverage set atomically: rows absent from
    /// the new set are deleted, the rest upserted, in one transaction.
    #[instrument(skip(self, entries), fields(rider_id = %rider_id, entry_count = entries.len()))]
    pub async fn upsert_coverage(
        &self,
        rider_id: Uuid,
        entries: Vec<CoverageEntryInput>,
    ) -> Result<Vec<rider_coverage_area::Model>, ServiceError> {
        self.require_rider(rider_id).await?;

        let mut unique_store_ids = HashSet::new();
        for entry in &entries {
            if !unique_store_ids.insert(entry.store_id) {
                return Err(ServiceError::BadRequest(format!(
                    "Duplicate store {} in coverage entries",
                    entry.store_id
                )));
            }
            if let Some(radius) = entry.service_radius_km {
                if !radius.is_finite() || radius < 0.0 {
                    return Err(ServiceError::BadRequest(
                        "service_radius_km must be a finite non-negative number".to_string(),
                    ));
                }
            }
        }

        let now = Utc::now();
        let keep: Vec<Uuid> = unique_store_ids.iter().copied().collect();

        let rows = self
            .db_access
            .transaction::<_, Vec<rider_coverage_area::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    // Prune removed coverage first so readers never see
                    // the union of old and new sets.
                    CoverageEntity::delete_many()
                        .filter(rider_coverage_area::Column::RiderId.eq(rider_id))
                        .filter(rider_coverage_area::Column::StoreId.is_not_in(keep))
                        .exec(txn)
                        .await?;

                    for entry in entries {
                        let existing = CoverageEntity::find()
                            .filter(rider_coverage_area::Column::RiderId.eq(rider_id))
                            .filter(rider_coverage_area::Column::StoreId.eq(entry.store_id))
                            .one(txn)
                            .await?;

                        match existing {
                            Some(row) => {
                                let mut active: CoverageActiveModel = row.into();
                                active.service_radius_km = Set(entry.service_radius_km);
                                active.updated_at = Set(Some(now));
                                active.update(txn).await?;
                            }
                            None => {
                                CoverageActiveModel {
                                    id: Set(Uuid::new_v4()),
                                    rider_id: Set(rider_id),
                                    store_id: Set(entry.store_id),
                                    service_radius_km: Set(entry.service_radius_km),
                                    created_at: Set(now),
                                    updated_at: Set(Some(now)),
                                }
                                .insert(txn)
                                .await?;
                            }
                        }
                    }

                    let rows = CoverageEntity::find()
                        .filter(rider_coverage_area::Column::RiderId.eq(rider_id))
                        .order_by_asc(rider_coverage_area::Column::CreatedAt)
                        .all(txn)
                        .await?;
                    Ok(rows)
                })
            })
            .await?;

        info!(rider_id = %rider_id, coverage_count = rows.len(), "Rider coverage replaced");
        Ok(rows)
    }

    /// Riders whose coverage includes the delivery's store, refined by
    /// the routing collaborator where coordinates allow. A routing
    /// failure downgrades a rider to distance-unknown instead of
    /// failing the whole listing.
    #[instrument(skip(self), fields(fulfillment_id = %fulfillment_id))]
    pub async fn eligible_riders(
        &self,
        fulfillment_id: Uuid,
    ) -> Result<Vec<EligibleRider>, ServiceError> {
        let db = &*self.db;

        let fulfillment = FulfillmentEntity::find_by_id(fulfillment_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Fulfillment {} not found", fulfillment_id))
            })?;
        if fulfillment.fulfillment_type != FulfillmentType::Delivery {
            return Err(ServiceError::BadRequest(
                "Fulfillment does not accept riders".to_string(),
            ));
        }

        let order = SaleOrderEntity::find_by_id(fulfillment.sale_order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Sale order {} not found",
                    fulfillment.sale_order_id
                ))
            })?;

        let store = StoreEntity::find_by_id(order.store_id).one(db).await?;
        let store_coords = store.as_ref().and_then(|s| match (s.latitude, s.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        });
        let destination = match (
            fulfillment.delivery_latitude,
            fulfillment.delivery_longitude,
        ) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let coverage_rows = CoverageEntity::find()
            .filter(rider_coverage_area::Column::StoreId.eq(order.store_id))
            .all(db)
            .await?;

        let mut eligible = Vec::new();
        for coverage in coverage_rows {
            let Some(rider) = RiderEntity::find_by_id(coverage.rider_id).one(db).await? else {
                continue;
            };
            if !rider.is_active {
                continue;
            }

            let estimate = match (store_coords, destination) {
                (Some(from), Some(to)) => {
                    match self
                        .routing
                        .estimate_route(RoutingProfile::Driving, from, to)
                        .await
                    {
                        Ok(estimate) => Some(estimate),
                        Err(e) => {
                            warn!(
                                rider_id = %rider.id,
                                error = %e,
                                "Routing estimate unavailable; keeping rider with distance unknown"
                            );
                            None
                        }
                    }
                }
                _ => None,
            };

            // Filter on radius only when both sides are known.
            if let (Some(radius_km), Some(estimate)) =
                (coverage.service_radius_km, estimate.as_ref())
            {
                if estimate.distance_meters > radius_km * 1000.0 {
                    continue;
                }
            }

            eligible.push(EligibleRider {
                rider_id: rider.id,
                full_name: rider.full_name,
                service_radius_km: coverage.service_radius_km,
                distance_meters: estimate.as_ref().map(|e| e.distance_meters),
                duration_seconds: estimate.as_ref().map(|e| e.duration_seconds),
            });
        }

        Ok(eligible)
    }
}
