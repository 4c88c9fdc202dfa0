use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order_override::{self, Entity as OverrideEntity},
        quotation::Entity as QuotationEntity,
        sale_order::{self, Entity as SaleOrderEntity},
        OrderPhase, OverrideKind, SaleOrderStatus, SaleType,
    },
    errors::ServiceError,
    services::credit::CreditService,
};

/// Point-in-time projection of where a sale order stands. Derived on
/// every call; nothing here is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleWorkflowSnapshot {
    pub sale_order_id: Uuid,
    pub status: SaleOrderStatus,
    pub phase: OrderPhase,
    pub grand_total: Decimal,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub credit_limit: Decimal,
    pub credit_exposure: Decimal,
    pub can_advance_by_payment: bool,
    pub can_advance_by_credit: bool,
    pub has_admin_override: bool,
    pub has_credit_override: bool,
}

/// Computes the sale workflow projection. Consults the credit ledger
/// and any unexpired overrides; never mutates state.
#[derive(Clone)]
pub struct SaleWorkflowService {
    db: Arc<DbPool>,
    credit: CreditService,
}

impl SaleWorkflowService {
    pub fn new(db: Arc<DbPool>, credit: CreditService) -> Self {
        Self { db, credit }
    }

    /// Fetches a sale order or fails NotFound.
    #[instrument(skip(self), fields(sale_order_id = %id))]
    pub async fn get_order(&self, id: Uuid) -> Result<sale_order::Model, ServiceError> {
        SaleOrderEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale order {} not found", id)))
    }

    /// Recomputes the full workflow snapshot for a sale order.
    #[instrument(skip(self), fields(sale_order_id = %sale_order_id))]
    pub async fn snapshot(
        &self,
        sale_order_id: Uuid,
    ) -> Result<SaleWorkflowSnapshot, ServiceError> {
        let db = &*self.db;
        let order = self.get_order(sale_order_id).await?;
        let now = Utc::now();

        let paid = self.credit.confirmed_paid(db, sale_order_id).await?;
        let outstanding = order.total_amount - paid;

        // Expired overrides are ignored here, never deleted.
        let overrides = OverrideEntity::find()
            .filter(order_override::Column::SaleOrderId.eq(sale_order_id))
            .all(db)
            .await?;
        let active: Vec<&order_override::Model> = overrides
            .iter()
            .filter(|o| o.is_unexpired(now))
            .collect();

        let has_admin_override = active.iter().any(|o| o.kind == OverrideKind::Admin);
        let credit_override_ceiling: Option<Decimal> = active
            .iter()
            .filter(|o| o.kind == OverrideKind::Credit)
            .filter_map(|o| o.approved_amount)
            .max();
        let has_credit_override = credit_override_ceiling.is_some();

        let (credit_limit, credit_exposure, available_credit) =
            match self.reseller_for_order(&order).await? {
                Some(reseller_id) => match self.credit.credit_standing(reseller_id).await {
                    Ok(standing) => (
                        standing.credit_limit,
                        standing.outstanding,
                        Some(standing.available),
                    ),
                    // A reseller without a profile has no credit line.
                    Err(ServiceError::NotFound(_)) => (Decimal::ZERO, Decimal::ZERO, None),
                    Err(e) => return Err(e),
                },
                None => (Decimal::ZERO, Decimal::ZERO, None),
            };

        let can_advance_by_payment = outstanding <= Decimal::ZERO;

        let within_credit_line = order.sale_type == SaleType::Reseller
            && available_credit.map_or(false, |available| available >= outstanding);
        let within_credit_override =
            credit_override_ceiling.map_or(false, |ceiling| ceiling >= outstanding);
        let can_advance_by_credit =
            within_credit_line || within_credit_override || has_admin_override;

        Ok(SaleWorkflowSnapshot {
            sale_order_id,
            status: order.status,
            phase: order.phase,
            grand_total: order.total_amount,
            paid,
            outstanding,
            credit_limit,
            credit_exposure,
            can_advance_by_payment,
            can_advance_by_credit,
            has_admin_override,
            has_credit_override,
        })
    }

    /// Resolves the reseller behind a reseller-type order via its
    /// quotation. Consumer orders have no credit party.
    async fn reseller_for_order(
        &self,
        order: &sale_order::Model,
    ) -> Result<Option<Uuid>, ServiceError> {
        if order.sale_type != SaleType::Reseller {
            return Ok(None);
        }
        let Some(quotation_id) = order.quotation_id else {
            return Ok(None);
        };
        let quotation = QuotationEntity::find_by_id(quotation_id)
            .one(&*self.db)
            .await?;
        Ok(quotation.and_then(|q| q.reseller_id))
    }
}
