//! Tests for the rider coverage registry: full-replacement semantics,
//! validation, and routing-degraded eligibility listings.

mod common;

use assert_matches::assert_matches;
use common::{StubRouteEstimator, TestApp};
use orderflow_api::{
    entities::{FulfillmentType, SaleType},
    errors::ServiceError,
    services::rider_coverage::CoverageEntryInput,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn entry(store_id: Uuid, service_radius_km: Option<f64>) -> CoverageEntryInput {
    CoverageEntryInput {
        store_id,
        service_radius_km,
    }
}

#[tokio::test]
async fn coverage_replace_is_a_full_replacement() {
    let app = TestApp::new().await;
    let rider = app.seed_rider("Ana Cruz").await;
    let store_a = app.seed_store("Branch A").await;
    let store_b = app.seed_store("Branch B").await;
    let store_c = app.seed_store("Branch C").await;

    // Start with {A, B}.
    app.services
        .rider_coverage
        .upsert_coverage(
            rider.id,
            vec![entry(store_a.id, Some(5.0)), entry(store_b.id, None)],
        )
        .await
        .expect("initial coverage set");

    // Replace with {B, C}: A disappears, B persists, C appears.
    let rows = app
        .services
        .rider_coverage
        .upsert_coverage(
            rider.id,
            vec![entry(store_b.id, Some(8.0)), entry(store_c.id, None)],
        )
        .await
        .expect("replacement applies");

    let mut store_ids: Vec<_> = rows.iter().map(|r| r.store_id).collect();
    store_ids.sort();
    let mut expected = vec![store_b.id, store_c.id];
    expected.sort();
    assert_eq!(store_ids, expected);

    let b_row = rows.iter().find(|r| r.store_id == store_b.id).expect("B kept");
    assert_eq!(b_row.service_radius_km, Some(8.0));
}

#[tokio::test]
async fn coverage_validation_rejects_bad_entries() {
    let app = TestApp::new().await;
    let rider = app.seed_rider("Ana Cruz").await;
    let store = app.seed_store("Branch A").await;

    // Unknown rider.
    let missing = app
        .services
        .rider_coverage
        .upsert_coverage(Uuid::new_v4(), vec![entry(store.id, None)])
        .await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));

    // Duplicate store in one call.
    let duplicate = app
        .services
        .rider_coverage
        .upsert_coverage(
            rider.id,
            vec![entry(store.id, None), entry(store.id, Some(3.0))],
        )
        .await;
    assert_matches!(duplicate, Err(ServiceError::BadRequest(_)));

    // Negative radius.
    let negative = app
        .services
        .rider_coverage
        .upsert_coverage(rider.id, vec![entry(store.id, Some(-1.0))])
        .await;
    assert_matches!(negative, Err(ServiceError::BadRequest(_)));

    // Non-finite radius.
    let non_finite = app
        .services
        .rider_coverage
        .upsert_coverage(rider.id, vec![entry(store.id, Some(f64::NAN))])
        .await;
    assert_matches!(non_finite, Err(ServiceError::BadRequest(_)));
}

#[tokio::test]
async fn failed_replacement_leaves_the_existing_set_untouched() {
    let app = TestApp::new().await;
    let rider = app.seed_rider("Ana Cruz").await;
    let store_a = app.seed_store("Branch A").await;
    let store_b = app.seed_store("Branch B").await;

    app.services
        .rider_coverage
        .upsert_coverage(rider.id, vec![entry(store_a.id, None)])
        .await
        .expect("initial coverage set");

    // The duplicate is rejected before any row changes.
    let rejected = app
        .services
        .rider_coverage
        .upsert_coverage(
            rider.id,
            vec![entry(store_b.id, None), entry(store_b.id, None)],
        )
        .await;
    assert_matches!(rejected, Err(ServiceError::BadRequest(_)));

    let rows = app
        .services
        .rider_coverage
        .list_for_rider(rider.id)
        .await
        .expect("listing succeeds");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].store_id, store_a.id);
}

#[tokio::test]
async fn routing_outage_degrades_to_distance_unknown() {
    // Stub estimator fails every call.
    let app = TestApp::with_routing(StubRouteEstimator {
        distance_meters: None,
    })
    .await;
    let rider = app.seed_rider("Ana Cruz").await;
    let store = app.seed_store("Branch A").await;

    app.services
        .rider_coverage
        .upsert_coverage(rider.id, vec![entry(store.id, Some(5.0))])
        .await
        .expect("coverage set");

    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;

    let eligible = app
        .services
        .rider_coverage
        .eligible_riders(fulfillment.id)
        .await
        .expect("listing survives the outage");

    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].rider_id, rider.id);
    assert!(eligible[0].distance_meters.is_none());
}

#[tokio::test]
async fn radius_filter_applies_when_distance_is_known() {
    // 12 km estimated distance.
    let app = TestApp::with_routing(StubRouteEstimator {
        distance_meters: Some(12_000.0),
    })
    .await;
    let near = app.seed_rider("Near Rider").await;
    let far = app.seed_rider("Far Rider").await;
    let unbounded = app.seed_rider("Unbounded Rider").await;
    let store = app.seed_store("Branch A").await;

    app.services
        .rider_coverage
        .upsert_coverage(near.id, vec![entry(store.id, Some(20.0))])
        .await
        .expect("coverage set");
    app.services
        .rider_coverage
        .upsert_coverage(far.id, vec![entry(store.id, Some(5.0))])
        .await
        .expect("coverage set");
    app.services
        .rider_coverage
        .upsert_coverage(unbounded.id, vec![entry(store.id, None)])
        .await
        .expect("coverage set");

    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let fulfillment = app
        .seed_fulfillment(order.id, FulfillmentType::Delivery)
        .await;

    let eligible = app
        .services
        .rider_coverage
        .eligible_riders(fulfillment.id)
        .await
        .expect("listing succeeds");

    let ids: Vec<_> = eligible.iter().map(|e| e.rider_id).collect();
    assert!(ids.contains(&near.id), "20km radius covers 12km");
    assert!(!ids.contains(&far.id), "5km radius excludes 12km");
    assert!(ids.contains(&unbounded.id), "no radius means no filter");
}

#[tokio::test]
async fn eligibility_rejects_pickup_fulfillments() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch A").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(100.00))
        .await;
    let pickup = app
        .seed_fulfillment(order.id, FulfillmentType::Pickup)
        .await;

    let denied = app.services.rider_coverage.eligible_riders(pickup.id).await;
    assert_matches!(denied, Err(ServiceError::BadRequest(_)));
}
