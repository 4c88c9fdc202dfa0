use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{permissions::consts as perm, Actor, Authorizer, Role},
    db::{DatabaseAccess, DbPool},
    entities::{
        fulfillment::{self, ActiveModel as FulfillmentActiveModel},
        quotation::{self, ActiveModel as QuotationActiveModel, Entity as QuotationEntity},
        quotation_item::{self, ActiveModel as ItemActiveModel, Entity as ItemEntity},
        sale_order::{self, ActiveModel as SaleOrderActiveModel},
        FulfillmentStatus, FulfillmentType, OrderPhase, QuotationStatus, SaleOrderStatus, SaleType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref QUOTATIONS_APPROVED: IntCounter = IntCounter::new(
        "quotations_approved_total",
        "Total number of quotations approved into sale orders"
    )
    .expect("metric can be created");
    static ref QUOTATION_TRANSITION_FAILURES: IntCounter = IntCounter::new(
        "quotation_transition_failures_total",
        "Total number of rejected quotation status transitions"
    )
    .expect("metric can be created");
}

/// Request/response types for the quotation service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuotationDraftRequest {
    pub sale_type: SaleType,
    pub store_id: Uuid,
    pub consumer_id: Option<Uuid>,
    pub reseller_id: Option<Uuid>,
    pub biller_id: Option<Uuid>,
    #[serde(default)]
    pub requires_delivery: bool,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<QuotationItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotationItemInput {
    pub product_variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Field patch permitted while the quotation is still Draft or Sent.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateQuotationFieldsRequest {
    pub items: Option<Vec<QuotationItemInput>>,
    pub requires_delivery: Option<bool>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotationResponse {
    pub id: Uuid,
    pub quote_number: String,
    pub sale_type: SaleType,
    pub status: QuotationStatus,
    pub store_id: Uuid,
    pub consumer_id: Option<Uuid>,
    pub reseller_id: Option<Uuid>,
    pub biller_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub requires_delivery: bool,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub sale_order_id: Option<Uuid>,
    pub items: Vec<quotation_item::Model>,
    pub version: i32,
}

/// What the approval transition produced, all committed atomically.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub quotation: quotation::Model,
    pub sale_order: sale_order::Model,
    pub fulfillment: Option<fulfillment::Model>,
}

/// Owns the quotation state machine and the conversion of an approved
/// quotation into a sale order.
#[derive(Clone)]
pub struct QuotationService {
    db: Arc<DbPool>,
    db_access: DatabaseAccess,
    event_sender: EventSender,
    authorizer: Arc<dyn Authorizer>,
}

impl QuotationService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            db_access: DatabaseAccess::new(db.clone()),
            db,
            event_sender,
            authorizer,
        }
    }

    /// Validates a status transition against the lifecycle table.
    ///
    /// Draft -> Sent | Confirmed | Rejected | Cancelled
    /// Sent -> Confirmed | Rejected | Cancelled
    /// Confirmed -> Approved | Rejected
    /// Approved / Rejected / Cancelled are terminal.
    fn is_valid_transition(from: QuotationStatus, to: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (from, to),
            (Draft, Sent)
                | (Draft, Confirmed)
                | (Draft, Rejected)
                | (Draft, Cancelled)
                | (Sent, Confirmed)
                | (Sent, Rejected)
                | (Sent, Cancelled)
                | (Confirmed, Approved)
                | (Confirmed, Rejected)
        )
    }

    fn capability_for_target(target: QuotationStatus) -> &'static str {
        match target {
            QuotationStatus::Confirmed => perm::QUOTATIONS_CONFIRM,
            QuotationStatus::Rejected => perm::QUOTATIONS_REJECT,
            QuotationStatus::Approved => perm::QUOTATIONS_APPROVE,
            _ => perm::QUOTATIONS_UPDATE,
        }
    }

    /// The party the quotation belongs to, depending on how the actor
    /// participates in it.
    fn is_owner(quotation: &quotation::Model, actor: &Actor) -> bool {
        match actor.role {
            Role::Consumer => quotation.consumer_id == Some(actor.id),
            Role::Reseller => quotation.reseller_id == Some(actor.id),
            Role::Biller => quotation.biller_id == Some(actor.id),
            _ => false,
        }
    }

    /// Stakeholder rules layered over the transition table. The table
    /// decides whether the edge exists; this decides who may walk it.
    fn authorize_transition(
        quotation: &quotation::Model,
        actor: &Actor,
        target: QuotationStatus,
    ) -> Result<(), ServiceError> {
        let owner = Self::is_owner(quotation, actor);
        match target {
            QuotationStatus::Confirmed => {
                if !owner {
                    return Err(ServiceError::Forbidden(
                        "Only the owning stakeholder may confirm a quotation".to_string(),
                    ));
                }
            }
            QuotationStatus::Rejected => {
                let owner_may = owner && quotation.status.is_editable();
                if !owner_may && !actor.is_privileged() {
                    return Err(ServiceError::Forbidden(
                        "Only the owning stakeholder or staff may reject a quotation".to_string(),
                    ));
                }
            }
            QuotationStatus::Approved => {
                if !actor.is_privileged() {
                    return Err(ServiceError::Forbidden(
                        "Only staff may approve a quotation".to_string(),
                    ));
                }
            }
            _ => {
                if !owner && !actor.is_privileged() {
                    return Err(ServiceError::Forbidden(
                        "Not a stakeholder on this quotation".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_items(items: &[QuotationItemInput]) -> Result<Decimal, ServiceError> {
        let mut total = Decimal::ZERO;
        for item in items {
            if item.quantity <= 0 {
                return Err(ServiceError::BadRequest(
                    "Line item quantity must be positive".to_string(),
                ));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::BadRequest(
                    "Line item unit price must not be negative".to_string(),
                ));
            }
            total += Decimal::from(item.quantity) * item.unit_price;
        }
        Ok(total)
    }

    fn short_ref(id: Uuid) -> String {
        id.simple().to_string()[..8].to_uppercase()
    }

    /// Creates a new quotation in Draft status together with its items.
    #[instrument(skip(self, request, actor), fields(actor_id = %actor.id, store_id = %request.store_id))]
    pub async fn create_draft(
        &self,
        request: CreateQuotationDraftRequest,
        actor: &Actor,
    ) -> Result<QuotationResponse, ServiceError> {
        self.authorizer
            .authorize(actor, perm::QUOTATIONS_CREATE)
            .await?;
        request.validate()?;

        match request.sale_type {
            SaleType::Consumer if request.consumer_id.is_none() => {
                return Err(ServiceError::BadRequest(
                    "consumer_id is required for Consumer quotations".to_string(),
                ));
            }
            SaleType::Reseller if request.reseller_id.is_none() => {
                return Err(ServiceError::BadRequest(
                    "reseller_id is required for Reseller quotations".to_string(),
                ));
            }
            _ => {}
        }

        let total = Self::validate_items(&request.items)?;
        let quotation_id = Uuid::new_v4();
        let now = Utc::now();
        let items = request.items.clone();

        let (created, created_items) = self
            .db_access
            .transaction::<_, (quotation::Model, Vec<quotation_item::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let quotation = QuotationActiveModel {
                            id: Set(quotation_id),
                            quote_number: Set(format!("QT-{}", Self::short_ref(quotation_id))),
                            sale_type: Set(request.sale_type),
                            status: Set(QuotationStatus::Draft),
                            store_id: Set(request.store_id),
                            consumer_id: Set(request.consumer_id),
                            reseller_id: Set(request.reseller_id),
                            biller_id: Set(request.biller_id),
                            total_amount: Set(total),
                            requires_delivery: Set(request.requires_delivery),
                            delivery_address: Set(request.delivery_address),
                            notes: Set(request.notes),
                            sale_order_id: Set(None),
                            created_at: Set(now),
                            updated_at: Set(Some(now)),
                            version: Set(1),
                        }
                        .insert(txn)
                        .await?;

                        let mut created_items = Vec::with_capacity(items.len());
                        for item in items {
                            let row = ItemActiveModel {
                                id: Set(Uuid::new_v4()),
                                quotation_id: Set(quotation_id),
                                product_variant_id: Set(item.product_variant_id),
                                quantity: Set(item.quantity),
                                unit_price: Set(item.unit_price),
                                created_at: Set(now),
                            }
                            .insert(txn)
                            .await?;
                            created_items.push(row);
                        }

                        Ok((quotation, created_items))
                    })
                },
            )
            .await?;

        info!(quotation_id = %quotation_id, total = %total, "Quotation draft created");
        self.event_sender
            .send_best_effort(Event::QuotationDraftCreated { quotation_id })
            .await;

        Ok(Self::to_response(created, created_items))
    }

    /// Retrieves a quotation with its line items.
    #[instrument(skip(self), fields(quotation_id = %id))]
    pub async fn get_quotation(&self, id: Uuid) -> Result<QuotationResponse, ServiceError> {
        let db = &*self.db;

        let quotation = QuotationEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quotation {} not found", id)))?;

        let items = ItemEntity::find()
            .filter(quotation_item::Column::QuotationId.eq(id))
            .order_by_asc(quotation_item::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(Self::to_response(quotation, items))
    }

    /// Replaces editable fields while the quotation is Draft or Sent.
    /// Replacing items recomputes the derived total.
    #[instrument(skip(self, patch, actor), fields(quotation_id = %id, actor_id = %actor.id))]
    pub async fn update_fields(
        &self,
        id: Uuid,
        patch: UpdateQuotationFieldsRequest,
        actor: &Actor,
    ) -> Result<QuotationResponse, ServiceError> {
        self.authorizer
            .authorize(actor, perm::QUOTATIONS_UPDATE)
            .await?;

        let new_total = match &patch.items {
            Some(items) if items.is_empty() => {
                return Err(ServiceError::BadRequest(
                    "At least one line item is required".to_string(),
                ));
            }
            Some(items) => Some(Self::validate_items(items)?),
            None => None,
        };

        let actor = actor.clone();
        let now = Utc::now();

        let (updated, items) = self
            .db_access
            .transaction::<_, (quotation::Model, Vec<quotation_item::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let quotation = QuotationEntity::find_by_id(id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("Quotation {} not found", id))
                            })?;

                        if !Self::is_owner(&quotation, &actor) && !actor.is_privileged() {
                            return Err(ServiceError::Forbidden(
                                "Not a stakeholder on this quotation".to_string(),
                            ));
                        }
                        if !quotation.status.is_editable() {
                            return Err(ServiceError::BadRequest(format!(
                                "Quotation {} is {} and can no longer be edited",
                                id, quotation.status
                            )));
                        }

                        let mut active: QuotationActiveModel = quotation.into();
                        if let Some(items) = &patch.items {
                            ItemEntity::delete_many()
                                .filter(quotation_item::Column::QuotationId.eq(id))
                                .exec(txn)
                                .await?;
                            for item in items {
                                ItemActiveModel {
                                    id: Set(Uuid::new_v4()),
                                    quotation_id: Set(id),
                                    product_variant_id: Set(item.product_variant_id),
                                    quantity: Set(item.quantity),
                                    unit_price: Set(item.unit_price),
                                    created_at: Set(now),
                                }
                                .insert(txn)
                                .await?;
                            }
                        }
                        if let Some(total) = new_total {
                            active.total_amount = Set(total);
                        }
                        if let Some(requires_delivery) = patch.requires_delivery {
                            active.requires_delivery = Set(requires_delivery);
                        }
                        if let Some(address) = patch.delivery_address {
                            active.delivery_address = Set(Some(address));
                        }
                        if let Some(notes) = patch.notes {
                            active.notes = Set(Some(notes));
                        }
                        active.updated_at = Set(Some(now));
                        let version = *active.version.as_ref();
                        active.version = Set(version + 1);

                        let updated = active.update(txn).await?;
                        let items = ItemEntity::find()
                            .filter(quotation_item::Column::QuotationId.eq(id))
                            .order_by_asc(quotation_item::Column::CreatedAt)
                            .all(txn)
                            .await?;

                        Ok((updated, items))
                    })
                },
            )
            .await?;

        info!(quotation_id = %id, "Quotation fields updated");
        Ok(Self::to_response(updated, items))
    }

    /// Applies a lifecycle transition. Approval additionally creates the
    /// sale order (and fulfillment, for deliveries) in the same
    /// transaction; everything commits or nothing does.
    #[instrument(skip(self, actor), fields(quotation_id = %id, target = %target, actor_id = %actor.id))]
    pub async fn update_status(
        &self,
        id: Uuid,
        target: QuotationStatus,
        actor: &Actor,
    ) -> Result<QuotationResponse, ServiceError> {
        self.authorizer
            .authorize(actor, Self::capability_for_target(target))
            .await?;

        let actor_cloned = actor.clone();
        let now = Utc::now();

        let outcome = self
            .db_access
            .transaction::<_, (quotation::Model, QuotationStatus, Option<ApprovalOutcome>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let quotation = QuotationEntity::find_by_id(id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("Quotation {} not found", id))
                            })?;

                        let old_status = quotation.status;
                        if !Self::is_valid_transition(old_status, target) {
                            QUOTATION_TRANSITION_FAILURES.inc();
                            return Err(ServiceError::InvalidTransition(format!(
                                "Quotation {} cannot move from {} to {}",
                                id, old_status, target
                            )));
                        }
                        Self::authorize_transition(&quotation, &actor_cloned, target)?;

                        if target == QuotationStatus::Approved {
                            let approval =
                                Self::approve_in_txn(txn, quotation, &actor_cloned, now).await?;
                            let quotation = approval.quotation.clone();
                            return Ok((quotation, old_status, Some(approval)));
                        }

                        let mut active: QuotationActiveModel = quotation.into();
                        active.status = Set(target);
                        active.updated_at = Set(Some(now));
                        let version = *active.version.as_ref();
                        active.version = Set(version + 1);
                        let updated = active.update(txn).await?;

                        Ok((updated, old_status, None))
                    })
                },
            )
            .await?;

        let (updated, old_status, approval) = outcome;

        info!(
            quotation_id = %id,
            old_status = %old_status,
            new_status = %updated.status,
            "Quotation status updated"
        );

        self.event_sender
            .send_best_effort(Event::QuotationStatusChanged {
                quotation_id: id,
                old_status,
                new_status: updated.status,
            })
            .await;

        if let Some(approval) = &approval {
            QUOTATIONS_APPROVED.inc();
            self.event_sender
                .send_best_effort(Event::QuotationApproved {
                    quotation_id: id,
                    sale_order_id: approval.sale_order.id,
                    total_amount: approval.sale_order.total_amount,
                })
                .await;
            if let Some(biller_id) = updated.biller_id {
                self.event_sender
                    .send_best_effort(Event::NotificationRequested {
                        user_id: biller_id,
                        kind: "ORDER_ENTERED_SALE_PHASE".to_string(),
                        message: format!(
                            "Order {} approved; awaiting payment/credit check.",
                            approval.sale_order.id
                        ),
                    })
                    .await;
            }
        }

        let items = ItemEntity::find()
            .filter(quotation_item::Column::QuotationId.eq(id))
            .order_by_asc(quotation_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(Self::to_response(updated, items))
    }

    /// The approval side effect: sale order + optional fulfillment +
    /// quotation link, inside the caller's transaction.
    async fn approve_in_txn(
        txn: &sea_orm::DatabaseTransaction,
        quotation: quotation::Model,
        actor: &Actor,
        now: chrono::DateTime<Utc>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        if quotation.sale_order_id.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Quotation {} was already converted",
                quotation.id
            )));
        }

        let order_id = Uuid::new_v4();
        let sale_order = SaleOrderActiveModel {
            id: Set(order_id),
            order_number: Set(format!("SO-{}", Self::short_ref(order_id))),
            store_id: Set(quotation.store_id),
            biller_id: Set(quotation.biller_id.or(Some(actor.id))),
            sale_type: Set(quotation.sale_type),
            status: Set(SaleOrderStatus::Pending),
            phase: Set(OrderPhase::Sale),
            total_amount: Set(quotation.total_amount),
            quotation_id: Set(Some(quotation.id)),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!(error = %e, quotation_id = %quotation.id, "Failed to create sale order");
            ServiceError::DatabaseError(e)
        })?;

        let created_fulfillment = if quotation.requires_delivery {
            let fulfillment = FulfillmentActiveModel {
                id: Set(Uuid::new_v4()),
                sale_order_id: Set(order_id),
                fulfillment_type: Set(FulfillmentType::Delivery),
                status: Set(FulfillmentStatus::Pending),
                delivery_personnel_id: Set(None),
                delivery_address: Set(quotation.delivery_address.clone()),
                delivery_latitude: Set(None),
                delivery_longitude: Set(None),
                cost: Set(None),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            }
            .insert(txn)
            .await?;
            Some(fulfillment)
        } else {
            None
        };

        let version = quotation.version;
        let mut active: QuotationActiveModel = quotation.into();
        active.status = Set(QuotationStatus::Approved);
        active.sale_order_id = Set(Some(order_id));
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let quotation = active.update(txn).await?;

        Ok(ApprovalOutcome {
            quotation,
            sale_order,
            fulfillment: created_fulfillment,
        })
    }

    fn to_response(model: quotation::Model, items: Vec<quotation_item::Model>) -> QuotationResponse {
        QuotationResponse {
            id: model.id,
            quote_number: model.quote_number,
            sale_type: model.sale_type,
            status: model.status,
            store_id: model.store_id,
            consumer_id: model.consumer_id,
            reseller_id: model.reseller_id,
            biller_id: model.biller_id,
            total_amount: model.total_amount,
            requires_delivery: model.requires_delivery,
            delivery_address: model.delivery_address,
            notes: model.notes,
            sale_order_id: model.sale_order_id,
            items,
            version: model.version,
        }
    }
}
