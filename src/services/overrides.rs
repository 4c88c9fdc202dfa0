use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{permissions::consts as perm, Actor, Authorizer},
    db::DbPool,
    entities::{
        order_override::{self, ActiveModel as OverrideActiveModel},
        sale_order::Entity as SaleOrderEntity,
        OverrideKind,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Grants time-boxed administrative exceptions on sale orders. Grants
/// are append-only; expiry at read time is the only removal mechanism.
#[derive(Clone)]
pub struct OverrideService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    authorizer: Arc<dyn Authorizer>,
}

impl OverrideService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            db,
            event_sender,
            authorizer,
        }
    }

    /// Grants an admin override bypassing the credit arithmetic until
    /// `expires_at` (or indefinitely when unset).
    #[instrument(skip(self, actor), fields(sale_order_id = %sale_order_id, actor_id = %actor.id))]
    pub async fn grant_admin_override(
        &self,
        sale_order_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<order_override::Model, ServiceError> {
        self.grant(sale_order_id, OverrideKind::Admin, None, expires_at, actor)
            .await
    }

    /// Grants a credit override permitting advancement while the
    /// outstanding amount stays within `approved_amount`.
    #[instrument(skip(self, actor), fields(sale_order_id = %sale_order_id, actor_id = %actor.id))]
    pub async fn grant_credit_override(
        &self,
        sale_order_id: Uuid,
        approved_amount: Decimal,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<order_override::Model, ServiceError> {
        if approved_amount <= Decimal::ZERO {
            return Err(ServiceError::BadRequest(
                "Approved amount must be positive".to_string(),
            ));
        }
        self.grant(
            sale_order_id,
            OverrideKind::Credit,
            Some(approved_amount),
            expires_at,
            actor,
        )
        .await
    }

    async fn grant(
        &self,
        sale_order_id: Uuid,
        kind: OverrideKind,
        approved_amount: Option<Decimal>,
        expires_at: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<order_override::Model, ServiceError> {
        self.authorizer
            .authorize(actor, perm::ORDERS_OVERRIDE)
            .await?;

        let db = &*self.db;

        SaleOrderEntity::find_by_id(sale_order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Sale order {} not found", sale_order_id))
            })?;

        let granted = OverrideActiveModel {
            id: Set(Uuid::new_v4()),
            sale_order_id: Set(sale_order_id),
            kind: Set(kind),
            approved_amount: Set(approved_amount),
            granted_by: Set(Some(actor.id)),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(
            sale_order_id = %sale_order_id,
            kind = %kind,
            expires_at = ?expires_at,
            "Override granted"
        );
        self.event_sender
            .send_best_effort(Event::OverrideGranted {
                sale_order_id,
                kind,
                expires_at,
            })
            .await;

        Ok(granted)
    }
}
