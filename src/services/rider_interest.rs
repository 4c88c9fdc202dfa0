use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{permissions::consts as perm, Actor, Authorizer, Role},
    db::{DatabaseAccess, DbPool},
    entities::{
        fulfillment::{self, ActiveModel as FulfillmentActiveModel, Entity as FulfillmentEntity},
        fulfillment_rider_interest::{
            self, ActiveModel as InterestActiveModel, Entity as InterestEntity,
        },
        rider_coverage_area::{self, Entity as CoverageEntity},
        sale_order::{self, Entity as SaleOrderEntity},
        FulfillmentStatus, FulfillmentType, RiderInterestStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref RIDERS_ASSIGNED: IntCounter = IntCounter::new(
        "fulfillment_riders_assigned_total",
        "Total number of exclusive rider assignments"
    )
    .expect("metric can be created");
    static ref ASSIGNMENT_CONFLICTS: IntCounter = IntCounter::new(
        "fulfillment_assignment_conflicts_total",
        "Total number of assignment attempts rejected by the concurrency guard"
    )
    .expect("metric can be created");
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterInterestRequest {
    pub eta_minutes: Option<i32>,
    pub message: Option<String>,
    pub proposed_cost: Option<Decimal>,
}

/// Result of a successful exclusive assignment.
#[derive(Debug)]
pub struct AssignmentOutcome {
    pub assigned: fulfillment_rider_interest::Model,
    pub fulfillment: fulfillment::Model,
    pub rejected_riders: Vec<Uuid>,
}

/// Registers competing rider bids on pending delivery fulfillments and
/// resolves them to exactly one assignment.
///
/// Assignment re-validates the fulfillment inside its transaction, so
/// two concurrent attempts cannot both leave a rider assigned even when
/// the application layer does not serialize calls.
#[derive(Clone)]
pub struct RiderInterestService {
    db: Arc<DbPool>,
    db_access: DatabaseAccess,
    event_sender: EventSender,
    authorizer: Arc<dyn Authorizer>,
    default_expiry_minutes: i64,
}

impl RiderInterestService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        authorizer: Arc<dyn Authorizer>,
        default_expiry_minutes: i64,
    ) -> Self {
        Self {
            db_access: DatabaseAccess::new(db.clone()),
            db,
            event_sender,
            authorizer,
            default_expiry_minutes,
        }
    }

    fn compute_expiry(
        &self,
        now: DateTime<Utc>,
        eta_minutes: Option<i32>,
    ) -> Option<DateTime<Utc>> {
        match eta_minutes {
            Some(eta) if eta > 0 => Some(now + Duration::minutes(i64::from(eta))),
            _ if self.default_expiry_minutes > 0 => {
                Some(now + Duration::minutes(self.default_expiry_minutes))
            }
            _ => None,
        }
    }

    /// Registers (or refreshes) a rider's bid. Upsert keyed on the
    /// (fulfillment, rider) pair: a re-bid updates in place.
    #[instrument(skip(self, request, actor), fields(fulfillment_id = %fulfillment_id, rider_id = %actor.id))]
    pub async fn register_interest(
        &self,
        fulfillment_id: Uuid,
        request: RegisterInterestRequest,
        actor: &Actor,
    ) -> Result<fulfillment_rider_interest::Model, ServiceError> {
        self.authorizer
            .authorize(actor, perm::FULFILLMENTS_BID)
            .await?;

        if let Some(cost) = request.proposed_cost {
            if cost <= Decimal::ZERO {
                return Err(ServiceError::BadRequest(
                    "Proposed cost must be a positive amount".to_string(),
                ));
            }
        }

        let rider_id = actor.id;
        let now = Utc::now();
        let expires_at = self.compute_expiry(now, request.eta_minutes);

        let interest = self
            .db_access
            .transaction::<_, fulfillment_rider_interest::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let fulfillment = FulfillmentEntity::find_by_id(fulfillment_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Fulfillment {} not found",
                                fulfillment_id
                            ))
                        })?;
                    if fulfillment.fulfillment_type != FulfillmentType::Delivery {
                        return Err(ServiceError::BadRequest(
                            "Only delivery fulfillments accept riders".to_string(),
                        ));
                    }
                    if fulfillment.status != FulfillmentStatus::Pending {
                        return Err(ServiceError::BadRequest(
                            "Fulfillment is not accepting riders".to_string(),
                        ));
                    }

                    // A rider with declared coverage may only bid inside it;
                    // an empty coverage set means unrestricted.
                    let coverage_store_ids: Vec<Uuid> = CoverageEntity::find()
                        .filter(rider_coverage_area::Column::RiderId.eq(rider_id))
                        .all(txn)
                        .await?
                        .into_iter()
                        .map(|row| row.store_id)
                        .collect();
                    if !coverage_store_ids.is_empty() {
                        let order = SaleOrderEntity::find_by_id(fulfillment.sale_order_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Sale order {} not found",
                                    fulfillment.sale_order_id
                                ))
                            })?;
                        if !coverage_store_ids.contains(&order.store_id) {
                            return Err(ServiceError::BadRequest(
                                "Fulfillment is outside your coverage area".to_string(),
                            ));
                        }
                    }

                    let existing = InterestEntity::find()
                        .filter(
                            fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id),
                        )
                        .filter(fulfillment_rider_interest::Column::RiderId.eq(rider_id))
                        .one(txn)
                        .await?;

                    let interest = match existing {
                        Some(row) => {
                            let mut active: InterestActiveModel = row.into();
                            active.status = Set(RiderInterestStatus::Active);
                            active.eta_minutes = Set(request.eta_minutes);
                            active.message = Set(request.message.clone());
                            active.proposed_cost = Set(request.proposed_cost);
                            active.expires_at = Set(expires_at);
                            active.updated_at = Set(Some(now));
                            active.update(txn).await?
                        }
                        None => {
                            InterestActiveModel {
                                id: Set(Uuid::new_v4()),
                                fulfillment_id: Set(fulfillment_id),
                                rider_id: Set(rider_id),
                                status: Set(RiderInterestStatus::Active),
                                eta_minutes: Set(request.eta_minutes),
                                message: Set(request.message.clone()),
                                proposed_cost: Set(request.proposed_cost),
                                expires_at: Set(expires_at),
                                created_at: Set(now),
                                updated_at: Set(Some(now)),
                            }
                            .insert(txn)
                            .await?
                        }
                    };

                    Ok(interest)
                })
            })
            .await?;

        info!(
            fulfillment_id = %fulfillment_id,
            rider_id = %rider_id,
            expires_at = ?interest.expires_at,
            "Rider interest registered"
        );
        self.event_sender
            .send_best_effort(Event::RiderInterestRegistered {
                fulfillment_id,
                rider_id,
            })
            .await;

        Ok(interest)
    }

    /// Marks the rider's bid Withdrawn. Idempotent: withdrawing twice
    /// leaves the row unchanged.
    #[instrument(skip(self), fields(fulfillment_id = %fulfillment_id, rider_id = %rider_id))]
    pub async fn withdraw_interest(
        &self,
        fulfillment_id: Uuid,
        rider_id: Uuid,
    ) -> Result<fulfillment_rider_interest::Model, ServiceError> {
        let db = &*self.db;

        let interest = InterestEntity::find()
            .filter(fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id))
            .filter(fulfillment_rider_interest::Column::RiderId.eq(rider_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Rider interest not found".to_string()))?;

        if interest.status == RiderInterestStatus::Withdrawn {
            return Ok(interest);
        }

        let mut active: InterestActiveModel = interest.into();
        active.status = Set(RiderInterestStatus::Withdrawn);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        info!(fulfillment_id = %fulfillment_id, rider_id = %rider_id, "Rider interest withdrawn");
        self.event_sender
            .send_best_effort(Event::RiderInterestWithdrawn {
                fulfillment_id,
                rider_id,
            })
            .await;

        Ok(updated)
    }

    /// Resolves the competition to exactly one assignee.
    ///
    /// Runs as a single transaction that (1) re-checks the fulfillment
    /// is still Pending, failing Conflict otherwise, (2) marks the
    /// target bid Assigned, (3) rejects every other Active bid, and
    /// (4) stamps the fulfillment with the winner. Two concurrent calls
    /// cannot both commit step 4 for the same fulfillment: whichever
    /// commits second sees a non-Pending row at step 1.
    #[instrument(skip(self, actor), fields(fulfillment_id = %fulfillment_id, rider_id = %rider_id, actor_id = %actor.id))]
    pub async fn assign_rider(
        &self,
        fulfillment_id: Uuid,
        rider_id: Uuid,
        actor: &Actor,
    ) -> Result<AssignmentOutcome, ServiceError> {
        self.authorizer
            .authorize(actor, perm::FULFILLMENTS_ASSIGN)
            .await?;

        let actor_cloned = actor.clone();
        let now = Utc::now();

        let outcome = self
            .db_access
            .transaction::<_, AssignmentOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let fulfillment = FulfillmentEntity::find_by_id(fulfillment_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Fulfillment {} not found",
                                fulfillment_id
                            ))
                        })?;
                    if fulfillment.fulfillment_type != FulfillmentType::Delivery {
                        return Err(ServiceError::BadRequest(
                            "Fulfillment does not accept riders".to_string(),
                        ));
                    }

                    // The exclusivity guard: anything other than Pending
                    // means another assignment (or a cancellation) won.
                    if fulfillment.status != FulfillmentStatus::Pending {
                        ASSIGNMENT_CONFLICTS.inc();
                        return Err(ServiceError::Conflict(format!(
                            "Fulfillment {} is no longer accepting assignment ({})",
                            fulfillment_id, fulfillment.status
                        )));
                    }

                    // Billers may only assign riders on their own sales.
                    if actor_cloned.role == Role::Biller {
                        let order = SaleOrderEntity::find_by_id(fulfillment.sale_order_id)
                            .one(txn)
                            .await?;
                        let biller_id = order.as_ref().and_then(|o: &sale_order::Model| o.biller_id);
                        if biller_id != Some(actor_cloned.id) {
                            return Err(ServiceError::Forbidden(
                                "You can only assign riders for fulfillments linked to your sales"
                                    .to_string(),
                            ));
                        }
                    }

                    let interest = InterestEntity::find()
                        .filter(
                            fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id),
                        )
                        .filter(fulfillment_rider_interest::Column::RiderId.eq(rider_id))
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound("Rider interest not found".to_string())
                        })?;
                    if interest.status != RiderInterestStatus::Active {
                        return Err(ServiceError::BadRequest(
                            "Rider is not actively interested".to_string(),
                        ));
                    }
                    if !interest.is_live(now) {
                        return Err(ServiceError::BadRequest(
                            "Rider interest has expired".to_string(),
                        ));
                    }

                    let competing: Vec<Uuid> = InterestEntity::find()
                        .filter(
                            fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id),
                        )
                        .filter(fulfillment_rider_interest::Column::RiderId.ne(rider_id))
                        .filter(
                            fulfillment_rider_interest::Column::Status
                                .eq(RiderInterestStatus::Active),
                        )
                        .all(txn)
                        .await?
                        .into_iter()
                        .map(|row| row.rider_id)
                        .collect();

                    let proposed_cost = interest.proposed_cost;
                    let mut active: InterestActiveModel = interest.into();
                    active.status = Set(RiderInterestStatus::Assigned);
                    active.updated_at = Set(Some(now));
                    let assigned = active.update(txn).await?;

                    // Everyone else still Active loses; Withdrawn and
                    // Rejected rows are untouched.
                    InterestEntity::update_many()
                        .col_expr(
                            fulfillment_rider_interest::Column::Status,
                            Expr::value(RiderInterestStatus::Rejected),
                        )
                        .col_expr(
                            fulfillment_rider_interest::Column::UpdatedAt,
                            Expr::value(Some(now)),
                        )
                        .filter(
                            fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id),
                        )
                        .filter(fulfillment_rider_interest::Column::RiderId.ne(rider_id))
                        .filter(
                            fulfillment_rider_interest::Column::Status
                                .eq(RiderInterestStatus::Active),
                        )
                        .exec(txn)
                        .await?;

                    let existing_cost = fulfillment.cost;
                    let mut fulfillment_active: FulfillmentActiveModel = fulfillment.into();
                    fulfillment_active.status = Set(FulfillmentStatus::Assigned);
                    fulfillment_active.delivery_personnel_id = Set(Some(rider_id));
                    fulfillment_active.cost = Set(proposed_cost.or(existing_cost));
                    fulfillment_active.updated_at = Set(Some(now));
                    let fulfillment = fulfillment_active.update(txn).await?;

                    Ok(AssignmentOutcome {
                        assigned,
                        fulfillment,
                        rejected_riders: competing,
                    })
                })
            })
            .await?;

        RIDERS_ASSIGNED.inc();
        info!(
            fulfillment_id = %fulfillment_id,
            rider_id = %rider_id,
            rejected = outcome.rejected_riders.len(),
            "Rider assigned to fulfillment"
        );

        self.event_sender
            .send_best_effort(Event::RiderAssigned {
                fulfillment_id,
                rider_id,
                rejected_riders: outcome.rejected_riders.clone(),
            })
            .await;
        self.event_sender
            .send_best_effort(Event::NotificationRequested {
                user_id: rider_id,
                kind: "FULFILLMENT_ASSIGNED".to_string(),
                message: format!(
                    "You have been assigned to deliver order {}.",
                    outcome.fulfillment.sale_order_id
                ),
            })
            .await;
        for competitor in &outcome.rejected_riders {
            self.event_sender
                .send_best_effort(Event::NotificationRequested {
                    user_id: *competitor,
                    kind: "RIDER_INTEREST_REJECTED".to_string(),
                    message: format!(
                        "Another rider has been assigned to order {}.",
                        outcome.fulfillment.sale_order_id
                    ),
                })
                .await;
        }

        Ok(outcome)
    }

    /// Pending deliveries a rider could still bid on: within coverage
    /// (or anywhere, when the rider declared none) and not already
    /// carrying a live or winning bid from this rider.
    #[instrument(skip(self), fields(rider_id = %rider_id))]
    pub async fn available_deliveries(
        &self,
        rider_id: Uuid,
    ) -> Result<Vec<fulfillment::Model>, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();

        let coverage_store_ids: Vec<Uuid> = CoverageEntity::find()
            .filter(rider_coverage_area::Column::RiderId.eq(rider_id))
            .all(db)
            .await?
            .into_iter()
            .map(|row| row.store_id)
            .collect();

        let own_interests = InterestEntity::find()
            .filter(fulfillment_rider_interest::Column::RiderId.eq(rider_id))
            .all(db)
            .await?;
        let blocked: Vec<Uuid> = own_interests
            .iter()
            .filter(|row| row.status == RiderInterestStatus::Assigned || row.is_live(now))
            .map(|row| row.fulfillment_id)
            .collect();

        let candidates = FulfillmentEntity::find()
            .filter(fulfillment::Column::FulfillmentType.eq(FulfillmentType::Delivery))
            .filter(fulfillment::Column::Status.eq(FulfillmentStatus::Pending))
            .order_by_asc(fulfillment::Column::CreatedAt)
            .find_also_related(SaleOrderEntity)
            .all(db)
            .await?;

        let available = candidates
            .into_iter()
            .filter(|(f, _)| !blocked.contains(&f.id))
            .filter(|(_, order)| {
                if coverage_store_ids.is_empty() {
                    return true;
                }
                order
                    .as_ref()
                    .map(|o| coverage_store_ids.contains(&o.store_id))
                    .unwrap_or(false)
            })
            .map(|(f, _)| f)
            .collect();

        Ok(available)
    }

    /// A rider's own bid history, newest first.
    #[instrument(skip(self), fields(rider_id = %rider_id))]
    pub async fn my_interests(
        &self,
        rider_id: Uuid,
    ) -> Result<Vec<fulfillment_rider_interest::Model>, ServiceError> {
        let rows = InterestEntity::find()
            .filter(fulfillment_rider_interest::Column::RiderId.eq(rider_id))
            .order_by_desc(fulfillment_rider_interest::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// All bids on one fulfillment, oldest first.
    #[instrument(skip(self), fields(fulfillment_id = %fulfillment_id))]
    pub async fn list_for_fulfillment(
        &self,
        fulfillment_id: Uuid,
    ) -> Result<Vec<fulfillment_rider_interest::Model>, ServiceError> {
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

        let rows = InterestEntity::find()
            .filter(fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id))
            .order_by_asc(fulfillment_rider_interest::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_prefers_the_bid_eta_over_the_default() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let svc = RiderInterestService {
            db: Arc::new(sea_orm::DatabaseConnection::Disconnected),
            db_access: DatabaseAccess::new(Arc::new(sea_orm::DatabaseConnection::Disconnected)),
            event_sender: EventSender::new(tx),
            authorizer: Arc::new(crate::auth::RoleAuthorizer::new()),
            default_expiry_minutes: 30,
        };

        let now = Utc::now();

        let with_eta = svc.compute_expiry(now, Some(15)).expect("eta expiry");
        assert_eq!(with_eta, now + Duration::minutes(15));

        let defaulted = svc.compute_expiry(now, None).expect("default expiry");
        assert_eq!(defaulted, now + Duration::minutes(30));

        // Non-positive ETAs fall back to the default as well.
        let zero_eta = svc.compute_expiry(now, Some(0)).expect("default expiry");
        assert_eq!(zero_eta, now + Duration::minutes(30));
    }

    #[test]
    fn expiry_is_absent_when_no_source_is_configured() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let svc = RiderInterestService {
            db: Arc::new(sea_orm::DatabaseConnection::Disconnected),
            db_access: DatabaseAccess::new(Arc::new(sea_orm::DatabaseConnection::Disconnected)),
            event_sender: EventSender::new(tx),
            authorizer: Arc::new(crate::auth::RoleAuthorizer::new()),
            default_expiry_minutes: 0,
        };

        assert!(svc.compute_expiry(Utc::now(), None).is_none());
    }
}
