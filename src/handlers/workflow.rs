use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::permissions::consts as perm,
    entities::{FulfillmentStatus, QuotationStatus},
    errors::ServiceError,
    services::{
        quotations::{CreateQuotationDraftRequest, UpdateQuotationFieldsRequest},
        rider_coverage::CoverageEntryInput,
        rider_interest::RegisterInterestRequest,
    },
    ApiResponse, AppState,
};

use super::ActorContext;

#[derive(Debug, Deserialize)]
pub struct UpdateQuotationStatusRequest {
    pub status: QuotationStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantAdminOverrideRequest {
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantCreditOverrideRequest {
    pub approved_amount: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertCoverageRequest {
    pub entries: Vec<CoverageEntryInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRiderRequest {
    pub rider_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFulfillmentStatusRequest {
    pub status: FulfillmentStatus,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub assigned_rider_id: Uuid,
    pub fulfillment_id: Uuid,
    pub fulfillment_status: FulfillmentStatus,
    pub rejected_riders: Vec<Uuid>,
}

/// Routes for the workflow surface, mounted under /api/v1.
pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/quotations", post(create_quotation_draft))
        .route(
            "/quotations/:id",
            get(get_quotation).put(update_quotation_fields),
        )
        .route("/quotations/:id/status", post(update_quotation_status))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/workflow", get(get_sale_workflow))
        .route("/orders/:id/overrides/admin", post(grant_admin_override))
        .route("/orders/:id/overrides/credit", post(grant_credit_override))
        .route(
            "/orders/:id/fulfillment/status",
            post(update_fulfillment_status),
        )
        .route(
            "/riders/:id/coverage",
            get(list_rider_coverage).put(upsert_rider_coverage),
        )
        .route("/fulfillments/available", get(available_deliveries))
        .route("/fulfillments/interests/mine", get(my_interests))
        .route(
            "/fulfillments/:id/interest",
            post(register_interest)
                .get(list_interests)
                .delete(withdraw_interest),
        )
        .route("/fulfillments/:id/eligible-riders", get(eligible_riders))
        .route("/fulfillments/:id/assign", post(assign_rider))
}

async fn create_quotation_draft(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
    Json(request): Json<CreateQuotationDraftRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotation = state.services.quotations.create_draft(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(quotation))))
}

async fn get_quotation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotation = state.services.quotations.get_quotation(id).await?;
    Ok(Json(ApiResponse::success(quotation)))
}

async fn update_quotation_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(patch): Json<UpdateQuotationFieldsRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotation = state
        .services
        .quotations
        .update_fields(id, patch, &actor)
        .await?;
    Ok(Json(ApiResponse::success(quotation)))
}

async fn update_quotation_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<UpdateQuotationStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotation = state
        .services
        .quotations
        .update_status(id, request.status, &actor)
        .await?;
    Ok(Json(ApiResponse::success(quotation)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.sale_workflow.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn get_sale_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let snapshot = state.services.sale_workflow.snapshot(id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

async fn grant_admin_override(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<GrantAdminOverrideRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .overrides
        .grant_admin_override(id, request.expires_at, &actor)
        .await?;
    let order = state.services.sale_workflow.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn grant_credit_override(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<GrantCreditOverrideRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .overrides
        .grant_credit_override(id, request.approved_amount, request.expires_at, &actor)
        .await?;
    let order = state.services.sale_workflow.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn update_fulfillment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<UpdateFulfillmentStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let fulfillment = state
        .services
        .fulfillments
        .update_status(id, request.status, &actor)
        .await?;
    Ok(Json(ApiResponse::success(fulfillment)))
}

async fn list_rider_coverage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
) -> Result<impl IntoResponse, ServiceError> {
    state.authorizer.authorize(&actor, perm::COVERAGE_READ).await?;
    let rows = state.services.rider_coverage.list_for_rider(id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn upsert_rider_coverage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<UpsertCoverageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .authorizer
        .authorize(&actor, perm::COVERAGE_UPDATE)
        .await?;
    // Riders manage their own coverage; staff may manage anyone's.
    if actor.id != id && !actor.is_privileged() {
        return Err(ServiceError::Forbidden(
            "Cannot modify another rider's coverage".to_string(),
        ));
    }
    let rows = state
        .services
        .rider_coverage
        .upsert_coverage(id, request.entries)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn available_deliveries(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .rider_interest
        .available_deliveries(actor.id)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn my_interests(
    State(state): State<AppState>,
    ActorContext(actor): ActorContext,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.services.rider_interest.my_interests(actor.id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn register_interest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<RegisterInterestRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let interest = state
        .services
        .rider_interest
        .register_interest(id, request, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(interest))))
}

async fn list_interests(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.services.rider_interest.list_for_fulfillment(id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn withdraw_interest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
) -> Result<impl IntoResponse, ServiceError> {
    let interest = state
        .services
        .rider_interest
        .withdraw_interest(id, actor.id)
        .await?;
    Ok(Json(ApiResponse::success(interest)))
}

async fn eligible_riders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state.services.rider_coverage.eligible_riders(id).await?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn assign_rider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ActorContext(actor): ActorContext,
    Json(request): Json<AssignRiderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .rider_interest
        .assign_rider(id, request.rider_id, &actor)
        .await?;
    Ok(Json(ApiResponse::success(AssignmentResponse {
        assigned_rider_id: outcome.assigned.rider_id,
        fulfillment_id: outcome.fulfillment.id,
        fulfillment_status: outcome.fulfillment.status,
        rejected_riders: outcome.rejected_riders,
    })))
}
