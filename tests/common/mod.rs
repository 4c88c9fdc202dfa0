//! Test harness: in-memory SQLite database with the full migration set
//! applied and every workflow service wired against it.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orderflow_api::{
    auth::{Actor, Authorizer, Role, RoleAuthorizer},
    config::AppConfig,
    db::DbPool,
    entities::{
        fulfillment, payment, reseller_profile, rider, sale_order, store, FulfillmentStatus,
        FulfillmentType, OrderPhase, PaymentStatus, SaleOrderStatus, SaleType,
    },
    errors::ServiceError,
    events::EventSender,
    handlers::AppServices,
    migrator::Migrator,
    services::routing::{Coordinates, RouteEstimate, RouteEstimator, RoutingProfile},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Routing stub: a fixed distance, or an outage when `distance_meters`
/// is None.
pub struct StubRouteEstimator {
    pub distance_meters: Option<f64>,
}

#[async_trait]
impl RouteEstimator for StubRouteEstimator {
    async fn estimate_route(
        &self,
        profile: RoutingProfile,
        _from: Coordinates,
        _to: Coordinates,
    ) -> Result<RouteEstimate, ServiceError> {
        match self.distance_meters {
            Some(distance_meters) => Ok(RouteEstimate {
                distance_meters,
                duration_seconds: distance_meters / 10.0,
                provider: "stub".to_string(),
                profile,
            }),
            None => Err(ServiceError::ExternalServiceError(
                "Routing provider unavailable".to_string(),
            )),
        }
    }
}

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub authorizer: Arc<dyn Authorizer>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh application state over an in-memory database.
    pub async fn new() -> Self {
        Self::with_routing(StubRouteEstimator {
            distance_meters: None,
        })
        .await
    }

    pub async fn with_routing(routing: StubRouteEstimator) -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        // A single connection keeps every session on the same in-memory
        // database.
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let db = Database::connect(opt).await.expect("sqlite connects");
        Migrator::up(&db, None).await.expect("migrations apply");
        let db = Arc::new(db);

        let (event_tx, mut event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(async move { while event_rx.recv().await.is_some() {} });

        let authorizer: Arc<dyn Authorizer> = Arc::new(RoleAuthorizer::new());
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let services = AppServices::build(
            db.clone(),
            event_sender,
            authorizer.clone(),
            Arc::new(routing),
            &cfg,
        );

        Self {
            db,
            services,
            authorizer,
            _event_task: event_task,
        }
    }

    pub fn staff(&self) -> Actor {
        Actor::new(Uuid::new_v4(), Role::Staff)
    }

    pub fn reseller(&self, id: Uuid) -> Actor {
        Actor::new(id, Role::Reseller)
    }

    pub fn rider_actor(&self, id: Uuid) -> Actor {
        Actor::new(id, Role::Rider)
    }

    pub async fn seed_store(&self, name: &str) -> store::Model {
        store::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            latitude: Set(Some(14.5995)),
            longitude: Set(Some(120.9842)),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("store seeds")
    }

    pub async fn seed_rider(&self, name: &str) -> rider::Model {
        rider::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(name.to_string()),
            email: Set(Some(format!(
                "{}@riders.test",
                name.to_lowercase().replace(' ', ".")
            ))),
            phone: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("rider seeds")
    }

    pub async fn seed_reseller_profile(
        &self,
        reseller_id: Uuid,
        credit_limit: Decimal,
    ) -> reseller_profile::Model {
        reseller_profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            reseller_id: Set(reseller_id),
            credit_limit: Set(credit_limit),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("reseller profile seeds")
    }

    /// Seeds a sale order directly, for tests that start downstream of
    /// the quotation lifecycle.
    pub async fn seed_sale_order(
        &self,
        store_id: Uuid,
        sale_type: SaleType,
        total_amount: Decimal,
    ) -> sale_order::Model {
        let id = Uuid::new_v4();
        sale_order::ActiveModel {
            id: Set(id),
            order_number: Set(format!("SO-{}", &id.simple().to_string()[..8])),
            store_id: Set(store_id),
            biller_id: Set(None),
            sale_type: Set(sale_type),
            status: Set(SaleOrderStatus::Pending),
            phase: Set(OrderPhase::Sale),
            total_amount: Set(total_amount),
            quotation_id: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            version: Set(1),
        }
        .insert(&*self.db)
        .await
        .expect("sale order seeds")
    }

    pub async fn seed_fulfillment(
        &self,
        sale_order_id: Uuid,
        fulfillment_type: FulfillmentType,
    ) -> fulfillment::Model {
        fulfillment::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_order_id: Set(sale_order_id),
            fulfillment_type: Set(fulfillment_type),
            status: Set(FulfillmentStatus::Pending),
            delivery_personnel_id: Set(None),
            delivery_address: Set(Some("221B Baker Street".to_string())),
            delivery_latitude: Set(Some(14.62)),
            delivery_longitude: Set(Some(121.0)),
            cost: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .expect("fulfillment seeds")
    }

    pub async fn seed_confirmed_payment(
        &self,
        sale_order_id: Uuid,
        amount: Decimal,
    ) -> payment::Model {
        let now = Utc::now();
        payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_order_id: Set(sale_order_id),
            amount: Set(amount),
            status: Set(PaymentStatus::Confirmed),
            method: Set(Some("bank_transfer".to_string())),
            reference: Set(None),
            created_at: Set(now),
            confirmed_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await
        .expect("payment seeds")
    }
}
