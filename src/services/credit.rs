use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        payment::{self, Entity as PaymentEntity},
        quotation::{self, Entity as QuotationEntity},
        reseller_profile::Entity as ResellerProfileEntity,
        sale_order::{self, Entity as SaleOrderEntity, Model as SaleOrderModel},
        PaymentStatus, SaleOrderStatus,
    },
    errors::ServiceError,
};

/// A reseller's credit position, derived entirely from stored history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditStanding {
    pub reseller_id: Uuid,
    pub credit_limit: Decimal,
    /// Unpaid portion summed across the reseller's open orders.
    pub outstanding: Decimal,
    pub available: Decimal,
}

/// Read-only view over payment and sale history. Never mutates; callers
/// that need credit allocated go through overrides instead.
#[derive(Clone)]
pub struct CreditService {
    db: Arc<DbPool>,
}

impl CreditService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Sum of confirmed payments recorded against one sale order.
    pub async fn confirmed_paid<C: ConnectionTrait>(
        &self,
        conn: &C,
        sale_order_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let payments = PaymentEntity::find()
            .filter(payment::Column::SaleOrderId.eq(sale_order_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Confirmed))
            .all(conn)
            .await?;

        Ok(payments.iter().map(|p| p.amount).sum())
    }

    /// Outstanding amount on one order: total minus confirmed payments.
    /// May be negative when an order is overpaid.
    pub async fn outstanding_for_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: &SaleOrderModel,
    ) -> Result<Decimal, ServiceError> {
        let paid = self.confirmed_paid(conn, order.id).await?;
        Ok(order.total_amount - paid)
    }

    /// Unpaid exposure summed across every non-cancelled order belonging
    /// to the reseller. Each order contributes max(total - paid, 0).
    #[instrument(skip(self), fields(reseller_id = %reseller_id))]
    pub async fn outstanding_across_orders(
        &self,
        reseller_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let db = &*self.db;

        let order_ids: Vec<Uuid> = QuotationEntity::find()
            .filter(quotation::Column::ResellerId.eq(reseller_id))
            .filter(quotation::Column::SaleOrderId.is_not_null())
            .all(db)
            .await?
            .into_iter()
            .filter_map(|q| q.sale_order_id)
            .collect();

        if order_ids.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let orders = SaleOrderEntity::find()
            .filter(sale_order::Column::Id.is_in(order_ids))
            .filter(sale_order::Column::Status.ne(SaleOrderStatus::Cancelled))
            .all(db)
            .await?;

        let mut exposure = Decimal::ZERO;
        for order in &orders {
            let unpaid = self.outstanding_for_order(db, order).await?;
            if unpaid > Decimal::ZERO {
                exposure += unpaid;
            }
        }

        Ok(exposure)
    }

    /// Credit limit, current exposure and the remaining headroom for a
    /// reseller. Fails NotFound when no profile exists.
    #[instrument(skip(self), fields(reseller_id = %reseller_id))]
    pub async fn credit_standing(&self, reseller_id: Uuid) -> Result<CreditStanding, ServiceError> {
        let db = &*self.db;

        let profile = ResellerProfileEntity::find()
            .filter(crate::entities::reseller_profile::Column::ResellerId.eq(reseller_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reseller profile for {} not found", reseller_id))
            })?;

        let outstanding = self.outstanding_across_orders(reseller_id).await?;

        Ok(CreditStanding {
            reseller_id,
            credit_limit: profile.credit_limit,
            outstanding,
            available: profile.credit_limit - outstanding,
        })
    }
}
