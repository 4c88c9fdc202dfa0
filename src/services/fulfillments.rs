use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{permissions::consts as perm, Actor, Authorizer},
    db::{DatabaseAccess, DbPool},
    entities::{
        fulfillment::{self, ActiveModel as FulfillmentActiveModel, Entity as FulfillmentEntity},
        sale_order::{ActiveModel as SaleOrderActiveModel, Entity as SaleOrderEntity},
        FulfillmentStatus, SaleOrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Walks a fulfillment through its delivery lifecycle once a rider is
/// assigned. Completion closes out the sale order.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DbPool>,
    db_access: DatabaseAccess,
    event_sender: EventSender,
    authorizer: Arc<dyn Authorizer>,
}

impl FulfillmentService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            db_access: DatabaseAccess::new(db.clone()),
            db,
            event_sender,
            authorizer,
        }
    }

    /// Pending -> Assigned | Cancelled
    /// Assigned -> InProgress | Cancelled
    /// InProgress -> Completed | Cancelled
    /// Completed / Cancelled are terminal.
    fn is_valid_transition(from: FulfillmentStatus, to: FulfillmentStatus) -> bool {
        use FulfillmentStatus::*;
        matches!(
            (from, to),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, InProgress)
                | (Assigned, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    /// Fetches the fulfillment attached to a sale order.
    #[instrument(skip(self), fields(sale_order_id = %sale_order_id))]
    pub async fn get_by_sale_order(
        &self,
        sale_order_id: Uuid,
    ) -> Result<fulfillment::Model, ServiceError> {
        FulfillmentEntity::find()
            .filter(fulfillment::Column::SaleOrderId.eq(sale_order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Fulfillment for sale order {} not found",
                    sale_order_id
                ))
            })
    }

    /// Applies a fulfillment status transition. Completing a delivery
    /// also marks the sale order Fulfilled, in the same transaction.
    #[instrument(skip(self, actor), fields(sale_order_id = %sale_order_id, target = %target, actor_id = %actor.id))]
    pub async fn update_status(
        &self,
        sale_order_id: Uuid,
        target: FulfillmentStatus,
        actor: &Actor,
    ) -> Result<fulfillment::Model, ServiceError> {
        self.authorizer
            .authorize(actor, perm::FULFILLMENTS_UPDATE)
            .await?;

        let now = Utc::now();

        let (updated, old_status) = self
            .db_access
            .transaction::<_, (fulfillment::Model, FulfillmentStatus), ServiceError>(move |txn| {
                Box::pin(async move {
                    let fulfillment = FulfillmentEntity::find()
                        .filter(fulfillment::Column::SaleOrderId.eq(sale_order_id))
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Fulfillment for sale order {} not found",
                                sale_order_id
                            ))
                        })?;

                    let old_status = fulfillment.status;
                    if !Self::is_valid_transition(old_status, target) {
                        return Err(ServiceError::InvalidTransition(format!(
                            "Fulfillment cannot move from {} to {}",
                            old_status, target
                        )));
                    }

                    let mut active: FulfillmentActiveModel = fulfillment.into();
                    active.status = Set(target);
                    active.updated_at = Set(Some(now));
                    let updated = active.update(txn).await?;

                    if target == FulfillmentStatus::Completed {
                        let order = SaleOrderEntity::find_by_id(sale_order_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Sale order {} not found",
                                    sale_order_id
                                ))
                            })?;
                        let version = order.version;
                        let mut order_active: SaleOrderActiveModel = order.into();
                        order_active.status = Set(SaleOrderStatus::Fulfilled);
                        order_active.updated_at = Set(Some(now));
                        order_active.version = Set(version + 1);
                        order_active.update(txn).await?;
                    }

                    Ok((updated, old_status))
                })
            })
            .await?;

        info!(
            fulfillment_id = %updated.id,
            old_status = %old_status,
            new_status = %target,
            "Fulfillment status updated"
        );
        self.event_sender
            .send_best_effort(Event::FulfillmentStatusChanged {
                fulfillment_id: updated.id,
                old_status,
                new_status: target,
            })
            .await;

        Ok(updated)
    }
}
