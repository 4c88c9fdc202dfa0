//! HTTP surface for the workflow engine. Handlers stay thin: extract
//! the caller, delegate to a service, wrap the result.

pub mod workflow;

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    auth::{Actor, Authorizer, Role},
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        credit::CreditService, fulfillments::FulfillmentService, overrides::OverrideService,
        quotations::QuotationService, rider_coverage::RiderCoverageService,
        rider_interest::RiderInterestService, routing::RouteEstimator,
        sale_workflow::SaleWorkflowService,
    },
};

/// Bundle of constructed services shared through the application state.
#[derive(Clone)]
pub struct AppServices {
    pub quotations: Arc<QuotationService>,
    pub credit: Arc<CreditService>,
    pub sale_workflow: Arc<SaleWorkflowService>,
    pub overrides: Arc<OverrideService>,
    pub rider_coverage: Arc<RiderCoverageService>,
    pub rider_interest: Arc<RiderInterestService>,
    pub fulfillments: Arc<FulfillmentService>,
}

impl AppServices {
    pub fn build(
        db: Arc<DbPool>,
        event_sender: EventSender,
        authorizer: Arc<dyn Authorizer>,
        routing: Arc<dyn RouteEstimator>,
        config: &AppConfig,
    ) -> Self {
        let credit = CreditService::new(db.clone());
        Self {
            quotations: Arc::new(QuotationService::new(
                db.clone(),
                event_sender.clone(),
                authorizer.clone(),
            )),
            sale_workflow: Arc::new(SaleWorkflowService::new(db.clone(), credit.clone())),
            credit: Arc::new(credit),
            overrides: Arc::new(OverrideService::new(
                db.clone(),
                event_sender.clone(),
                authorizer.clone(),
            )),
            rider_coverage: Arc::new(RiderCoverageService::new(db.clone(), routing)),
            rider_interest: Arc::new(RiderInterestService::new(
                db.clone(),
                event_sender.clone(),
                authorizer.clone(),
                config.rider_interest_default_expiry_minutes,
            )),
            fulfillments: Arc::new(FulfillmentService::new(db, event_sender, authorizer)),
        }
    }
}

/// Caller identity, injected by the upstream authentication gate as
/// `x-actor-id` / `x-actor-role` headers. Token validation happened
/// before the request reached this service.
#[derive(Debug, Clone)]
pub struct ActorContext(pub Actor);

fn parse_role(raw: &str) -> Option<Role> {
    match raw.to_ascii_lowercase().as_str() {
        "consumer" => Some(Role::Consumer),
        "reseller" => Some(Role::Reseller),
        "biller" => Some(Role::Biller),
        "rider" => Some(Role::Rider),
        "staff" => Some(Role::Staff),
        "admin" => Some(Role::Admin),
        _ => None,
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| uuid::Uuid::parse_str(v).ok())
            .ok_or_else(|| ServiceError::Forbidden("Caller identity missing".to_string()))?;

        let role = parts
            .headers
            .get("x-actor-role")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_role)
            .ok_or_else(|| ServiceError::Forbidden("Caller role missing".to_string()))?;

        Ok(ActorContext(Actor::new(id, role)))
    }
}
