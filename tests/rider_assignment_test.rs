//! Tests for the rider interest and assignment engine, including the
//! exclusivity guarantee under competing assignment attempts.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use orderflow_api::{
    entities::{
        fulfillment, fulfillment_rider_interest, FulfillmentStatus, FulfillmentType,
        RiderInterestStatus, SaleType,
    },
    errors::ServiceError,
    services::rider_interest::RegisterInterestRequest,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

fn bid(eta_minutes: Option<i32>) -> RegisterInterestRequest {
    RegisterInterestRequest {
        eta_minutes,
        message: Some("On my way".to_string()),
        proposed_cost: Some(dec!(120.00)),
    }
}

async fn interest_rows(
    app: &TestApp,
    fulfillment_id: uuid::Uuid,
) -> Vec<fulfillment_rider_interest::Model> {
    fulfillment_rider_interest::Entity::find()
        .filter(fulfillment_rider_interest::Column::FulfillmentId.eq(fulfillment_id))
        .all(&*app.db)
        .await
        .expect("query runs")
}

#[tokio::test]
async fn competing_bids_resolve_to_one_assignment() {
    let app = TestApp::new().await;
    let store = app.seed_store("Dispatch Hub").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(900.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;

    let r1 = app.seed_rider("Ana Cruz").await;
    let r2 = app.seed_rider("Ben Reyes").await;
    let staff = app.staff();

    // Both riders bid; both rows are Active.
    app.services
        .rider_interest
        .register_interest(fulfillment.id, bid(Some(20)), &app.rider_actor(r1.id))
        .await
        .expect("first bid lands");
    app.services
        .rider_interest
        .register_interest(fulfillment.id, bid(Some(35)), &app.rider_actor(r2.id))
        .await
        .expect("second bid lands");

    let rows = interest_rows(&app, fulfillment.id).await;
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|row| row.status == RiderInterestStatus::Active));

    // Assign R1: the winner is Assigned, the competitor Rejected, the
    // fulfillment stamped.
    let outcome = app
        .services
        .rider_interest
        .assign_rider(fulfillment.id, r1.id, &staff)
        .await
        .expect("assignment succeeds");
    assert_eq!(outcome.assigned.rider_id, r1.id);
    assert_eq!(outcome.rejected_riders, vec![r2.id]);
    assert_eq!(outcome.fulfillment.status, FulfillmentStatus::Assigned);
    assert_eq!(outcome.fulfillment.delivery_personnel_id, Some(r1.id));
    assert_eq!(outcome.fulfillment.cost, Some(dec!(120.00)));

    let rows = interest_rows(&app, fulfillment.id).await;
    let assigned: Vec<_> = rows
        .iter()
        .filter(|row| row.status == RiderInterestStatus::Assigned)
        .collect();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].rider_id, r1.id);
    assert!(rows
        .iter()
        .all(|row| row.status != RiderInterestStatus::Active));

    // The losing rider cannot be assigned afterwards.
    let second = app
        .services
        .rider_interest
        .assign_rider(fulfillment.id, r2.id, &staff)
        .await;
    assert_matches!(second, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_assignments_cannot_both_win() {
    let app = TestApp::new().await;
    let store = app.seed_store("Dispatch Hub").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(500.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;

    let r1 = app.seed_rider("Ana Cruz").await;
    let r2 = app.seed_rider("Ben Reyes").await;
    let staff = app.staff();

    for rider in [&r1, &r2] {
        app.services
            .rider_interest
            .register_interest(fulfillment.id, bid(Some(15)), &app.rider_actor(rider.id))
            .await
            .expect("bid lands");
    }

    // Fire both assignments at once; the Pending re-check inside the
    // transaction must let exactly one through.
    let (first, second) = tokio::join!(
        app.services
            .rider_interest
            .assign_rider(fulfillment.id, r1.id, &staff),
        app.services
            .rider_interest
            .assign_rider(fulfillment.id, r2.id, &staff),
    );

    let successes = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1, "exactly one assignment may commit");

    let assigned_count = interest_rows(&app, fulfillment.id)
        .await
        .iter()
        .filter(|row| row.status == RiderInterestStatus::Assigned)
        .count();
    assert_eq!(assigned_count, 1);
}

#[tokio::test]
async fn rebidding_updates_in_place() {
    let app = TestApp::new().await;
    let store = app.seed_store("Dispatch Hub").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(250.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;
    let rider = app.seed_rider("Ana Cruz").await;
    let actor = app.rider_actor(rider.id);

    let first = app
        .services
        .rider_interest
        .register_interest(fulfillment.id, bid(Some(10)), &actor)
        .await
        .expect("first bid lands");

    let refreshed = app
        .services
        .rider_interest
        .register_interest(
            fulfillment.id,
            RegisterInterestRequest {
                eta_minutes: Some(25),
                message: Some("Traffic on the bridge".to_string()),
                proposed_cost: Some(dec!(150.00)),
            },
            &actor,
        )
        .await
        .expect("re-bid lands");

    assert_eq!(first.id, refreshed.id, "same row, refreshed");
    assert_eq!(refreshed.eta_minutes, Some(25));
    assert_eq!(refreshed.proposed_cost, Some(dec!(150.00)));
    assert_eq!(interest_rows(&app, fulfillment.id).await.len(), 1);
}

#[tokio::test]
async fn withdrawn_interest_can_be_reactivated_by_rebidding() {
    let app = TestApp::new().await;
    let store = app.seed_store("Dispatch Hub").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(250.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;
    let rider = app.seed_rider("Ana Cruz").await;
    let actor = app.rider_actor(rider.id);

    app.services
        .rider_interest
        .register_interest(fulfillment.id, bid(None), &actor)
        .await
        .expect("bid lands");

    let withdrawn = app
        .services
        .rider_interest
        .withdraw_interest(fulfillment.id, rider.id)
        .await
        .expect("withdrawal applies");
    assert_eq!(withdrawn.status, RiderInterestStatus::Withdrawn);

    // Withdrawing again is a no-op, not an error.
    let again = app
        .services
        .rider_interest
        .withdraw_interest(fulfillment.id, rider.id)
        .await
        .expect("idempotent withdrawal");
    assert_eq!(again.status, RiderInterestStatus::Withdrawn);

    // A withdrawn rider cannot be assigned.
    let staff = app.staff();
    let denied = app
        .services
        .rider_interest
        .assign_rider(fulfillment.id, rider.id, &staff)
        .await;
    assert_matches!(denied, Err(ServiceError::BadRequest(_)));

    // Re-bidding reactivates the same row.
    let reactivated = app
        .services
        .rider_interest
        .register_interest(fulfillment.id, bid(Some(5)), &actor)
        .await
        .expect("re-bid lands");
    assert_eq!(reactivated.status, RiderInterestStatus::Active);
    assert_eq!(interest_rows(&app, fulfillment.id).await.len(), 1);
}

#[tokio::test]
async fn preconditions_guard_registration_and_assignment() {
    let app = TestApp::new().await;
    let store = app.seed_store("Dispatch Hub").await;
    let rider = app.seed_rider("Ana Cruz").await;
    let actor = app.rider_actor(rider.id);
    let staff = app.staff();

    // Pickup fulfillments never accept riders.
    let pickup_order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let pickup = app
        .seed_fulfillment(pickup_order.id, FulfillmentType::Pickup)
        .await;
    let denied = app
        .services
        .rider_interest
        .register_interest(pickup.id, bid(None), &actor)
        .await;
    assert_matches!(denied, Err(ServiceError::BadRequest(_)));

    // Unknown fulfillment.
    let missing = app
        .services
        .rider_interest
        .register_interest(uuid::Uuid::new_v4(), bid(None), &actor)
        .await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));

    // Assigning without any interest row.
    let delivery_order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let delivery = app
        .seed_fulfillment(delivery_order.id, FulfillmentType::Delivery)
        .await;
    let no_interest = app
        .services
        .rider_interest
        .assign_rider(delivery.id, rider.id, &staff)
        .await;
    assert_matches!(no_interest, Err(ServiceError::NotFound(_)));

    // Non-positive proposed cost.
    let bad_cost = app
        .services
        .rider_interest
        .register_interest(
            delivery.id,
            RegisterInterestRequest {
                eta_minutes: None,
                message: None,
                proposed_cost: Some(dec!(0.00)),
            },
            &actor,
        )
        .await;
    assert_matches!(bad_cost, Err(ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn expired_interest_cannot_be_assigned() {
    let app = TestApp::new().await;
    let store = app.seed_store("Dispatch Hub").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(300.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;
    let rider = app.seed_rider("Ana Cruz").await;

    let interest = app
        .services
        .rider_interest
        .register_interest(fulfillment.id, bid(Some(5)), &app.rider_actor(rider.id))
        .await
        .expect("bid lands");

    // Age the bid past its expiry; the row stays Active in storage.
    let mut active: fulfillment_rider_interest::ActiveModel = interest.into();
    active.expires_at = Set(Some(Utc::now() - Duration::minutes(1)));
    active.update(&*app.db).await.expect("expiry backdated");

    let staff = app.staff();
    let denied = app
        .services
        .rider_interest
        .assign_rider(fulfillment.id, rider.id, &staff)
        .await;
    assert_matches!(denied, Err(ServiceError::BadRequest(_)));

    let stored = fulfillment_rider_interest::Entity::find()
        .filter(fulfillment_rider_interest::Column::RiderId.eq(rider.id))
        .one(&*app.db)
        .await
        .expect("query runs")
        .expect("row still exists");
    assert_eq!(stored.status, RiderInterestStatus::Active);
}

#[tokio::test]
async fn coverage_restricts_bidding_when_declared() {
    let app = TestApp::new().await;
    let covered_store = app.seed_store("Covered Branch").await;
    let other_store = app.seed_store("Far Branch").await;
    let rider = app.seed_rider("Ana Cruz").await;
    let actor = app.rider_actor(rider.id);

    app.services
        .rider_coverage
        .upsert_coverage(
            rider.id,
            vec![orderflow_api::services::rider_coverage::CoverageEntryInput {
                store_id: covered_store.id,
                service_radius_km: None,
            }],
        )
        .await
        .expect("coverage set");

    let far_order = app
        .seed_sale_order(other_store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let far_delivery = app
        .seed_fulfillment(far_order.id, FulfillmentType::Delivery)
        .await;
    let denied = app
        .services
        .rider_interest
        .register_interest(far_delivery.id, bid(None), &actor)
        .await;
    assert_matches!(denied, Err(ServiceError::BadRequest(_)));

    let near_order = app
        .seed_sale_order(covered_store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let near_delivery = app
        .seed_fulfillment(near_order.id, FulfillmentType::Delivery)
        .await;
    app.services
        .rider_interest
        .register_interest(near_delivery.id, bid(None), &actor)
        .await
        .expect("bid inside coverage lands");
}

#[tokio::test]
async fn available_deliveries_exclude_existing_bids_and_foreign_stores() {
    let app = TestApp::new().await;
    let covered_store = app.seed_store("Covered Branch").await;
    let other_store = app.seed_store("Far Branch").await;
    let rider = app.seed_rider("Ana Cruz").await;
    let actor = app.rider_actor(rider.id);

    app.services
        .rider_coverage
        .upsert_coverage(
            rider.id,
            vec![orderflow_api::services::rider_coverage::CoverageEntryInput {
                store_id: covered_store.id,
                service_radius_km: None,
            }],
        )
        .await
        .expect("coverage set");

    let in_coverage = app
        .seed_sale_order(covered_store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let open = app
        .seed_fulfillment(in_coverage.id, FulfillmentType::Delivery)
        .await;

    let already_bid_order = app
        .seed_sale_order(covered_store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let already_bid = app
        .seed_fulfillment(already_bid_order.id, FulfillmentType::Delivery)
        .await;
    app.services
        .rider_interest
        .register_interest(already_bid.id, bid(Some(10)), &actor)
        .await
        .expect("bid lands");

    let foreign_order = app
        .seed_sale_order(other_store.id, SaleType::Consumer, dec!(100.00))
        .await;
    app.seed_fulfillment(foreign_order.id, FulfillmentType::Delivery)
        .await;

    let available: Vec<fulfillment::Model> = app
        .services
        .rider_interest
        .available_deliveries(rider.id)
        .await
        .expect("listing succeeds");

    let ids: Vec<_> = available.iter().map(|f| f.id).collect();
    assert!(ids.contains(&open.id), "open delivery is offered");
    assert!(
        !ids.contains(&already_bid.id),
        "fulfillments with a live bid are excluded"
    );
    assert_eq!(ids.len(), 1, "foreign-store delivery is filtered out");
}
