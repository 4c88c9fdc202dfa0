//! Tests for the sale workflow snapshot: outstanding arithmetic, the
//! credit gate, and override handling.

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use orderflow_api::{
    auth::{Actor, Role},
    entities::{QuotationStatus, SaleType},
    errors::ServiceError,
    services::quotations::{CreateQuotationDraftRequest, QuotationItemInput},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Runs a reseller quotation through the lifecycle and returns the
/// resulting sale order id.
async fn approved_reseller_order(
    app: &TestApp,
    store_id: Uuid,
    reseller_id: Uuid,
    total: Decimal,
) -> Uuid {
    let staff = app.staff();
    let owner = app.reseller(reseller_id);

    let quotation = app
        .services
        .quotations
        .create_draft(
            CreateQuotationDraftRequest {
                sale_type: SaleType::Reseller,
                store_id,
                consumer_id: None,
                reseller_id: Some(reseller_id),
                biller_id: None,
                requires_delivery: false,
                delivery_address: None,
                notes: None,
                items: vec![QuotationItemInput {
                    product_variant_id: Uuid::new_v4(),
                    quantity: 1,
                    unit_price: total,
                }],
            },
            &staff,
        )
        .await
        .expect("draft created");

    app.services
        .quotations
        .update_status(quotation.id, QuotationStatus::Confirmed, &owner)
        .await
        .expect("owner confirms");
    app.services
        .quotations
        .update_status(quotation.id, QuotationStatus::Approved, &staff)
        .await
        .expect("staff approves")
        .sale_order_id
        .expect("sale order linked")
}

#[tokio::test]
async fn full_payment_advances_regardless_of_credit() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(10000.00))
        .await;
    app.seed_confirmed_payment(order.id, dec!(10000.00)).await;

    let snapshot = app
        .services
        .sale_workflow
        .snapshot(order.id)
        .await
        .expect("snapshot computes");

    assert_eq!(snapshot.grand_total, dec!(10000.00));
    assert_eq!(snapshot.paid, dec!(10000.00));
    assert_eq!(snapshot.outstanding, dec!(0.00));
    assert!(snapshot.can_advance_by_payment);
    assert!(!snapshot.can_advance_by_credit);
}

#[tokio::test]
async fn partial_payment_leaves_outstanding() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(10000.00))
        .await;
    app.seed_confirmed_payment(order.id, dec!(4000.00)).await;

    let snapshot = app
        .services
        .sale_workflow
        .snapshot(order.id)
        .await
        .expect("snapshot computes");

    assert_eq!(snapshot.outstanding, dec!(6000.00));
    assert!(!snapshot.can_advance_by_payment);
}

#[tokio::test]
async fn reseller_credit_line_gates_advancement() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;

    // Headroom 15,000 against outstanding 10,000: advance allowed.
    let funded = Uuid::new_v4();
    app.seed_reseller_profile(funded, dec!(15000.00)).await;
    let funded_order = approved_reseller_order(&app, store.id, funded, dec!(10000.00)).await;
    let snapshot = app
        .services
        .sale_workflow
        .snapshot(funded_order)
        .await
        .expect("snapshot computes");
    assert_eq!(snapshot.credit_limit, dec!(15000.00));
    assert!(snapshot.can_advance_by_credit);
    assert!(!snapshot.can_advance_by_payment);

    // Headroom 5,000 against outstanding 10,000: blocked.
    let constrained = Uuid::new_v4();
    app.seed_reseller_profile(constrained, dec!(5000.00)).await;
    let constrained_order =
        approved_reseller_order(&app, store.id, constrained, dec!(10000.00)).await;
    let snapshot = app
        .services
        .sale_workflow
        .snapshot(constrained_order)
        .await
        .expect("snapshot computes");
    assert!(!snapshot.can_advance_by_credit);
}

#[tokio::test]
async fn credit_exposure_spans_all_open_orders() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;
    let reseller_id = Uuid::new_v4();
    app.seed_reseller_profile(reseller_id, dec!(20000.00)).await;

    let first = approved_reseller_order(&app, store.id, reseller_id, dec!(8000.00)).await;
    let _second = approved_reseller_order(&app, store.id, reseller_id, dec!(5000.00)).await;
    app.seed_confirmed_payment(first, dec!(3000.00)).await;

    let standing = app
        .services
        .credit
        .credit_standing(reseller_id)
        .await
        .expect("standing computes");

    // 8,000 - 3,000 paid plus 5,000 untouched.
    assert_eq!(standing.outstanding, dec!(10000.00));
    assert_eq!(standing.available, dec!(10000.00));
}

#[tokio::test]
async fn credit_override_substitutes_for_headroom() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;
    let reseller_id = Uuid::new_v4();
    app.seed_reseller_profile(reseller_id, dec!(1000.00)).await;
    let order = approved_reseller_order(&app, store.id, reseller_id, dec!(10000.00)).await;
    let staff = app.staff();

    // Without an override, the thin credit line blocks.
    let before = app
        .services
        .sale_workflow
        .snapshot(order)
        .await
        .expect("snapshot computes");
    assert!(!before.can_advance_by_credit);

    // An undersized override changes nothing.
    app.services
        .overrides
        .grant_credit_override(order, dec!(2000.00), None, &staff)
        .await
        .expect("grant applies");
    let undersized = app
        .services
        .sale_workflow
        .snapshot(order)
        .await
        .expect("snapshot computes");
    assert!(!undersized.can_advance_by_credit);

    // A covering override opens the gate. Overrides are additive; the
    // snapshot takes the most permissive one.
    app.services
        .overrides
        .grant_credit_override(order, dec!(10000.00), None, &staff)
        .await
        .expect("grant applies");
    let covered = app
        .services
        .sale_workflow
        .snapshot(order)
        .await
        .expect("snapshot computes");
    assert!(covered.can_advance_by_credit);
    assert!(covered.has_credit_override);
}

#[tokio::test]
async fn admin_override_bypasses_credit_arithmetic_until_expiry() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(500.00))
        .await;
    let staff = app.staff();

    // Expired on arrival: ignored at read time, never deleted.
    app.services
        .overrides
        .grant_admin_override(order.id, Some(Utc::now() - Duration::hours(1)), &staff)
        .await
        .expect("grant applies");
    let expired = app
        .services
        .sale_workflow
        .snapshot(order.id)
        .await
        .expect("snapshot computes");
    assert!(!expired.can_advance_by_credit);
    assert!(!expired.has_admin_override);

    // A live override bypasses the arithmetic even on a consumer order.
    app.services
        .overrides
        .grant_admin_override(order.id, Some(Utc::now() + Duration::hours(1)), &staff)
        .await
        .expect("grant applies");
    let live = app
        .services
        .sale_workflow
        .snapshot(order.id)
        .await
        .expect("snapshot computes");
    assert!(live.can_advance_by_credit);
    assert!(live.has_admin_override);
}

#[tokio::test]
async fn override_grants_are_validated_and_authorized() {
    let app = TestApp::new().await;
    let store = app.seed_store("Branch").await;
    let order = app
        .seed_sale_order(store.id, SaleType::Consumer, dec!(500.00))
        .await;
    let staff = app.staff();

    // Riders hold no override capability.
    let rider = Actor::new(Uuid::new_v4(), Role::Rider);
    let denied = app
        .services
        .overrides
        .grant_admin_override(order.id, None, &rider)
        .await;
    assert_matches!(denied, Err(ServiceError::Forbidden(_)));

    // Credit overrides need a positive amount.
    let non_positive = app
        .services
        .overrides
        .grant_credit_override(order.id, dec!(0.00), None, &staff)
        .await;
    assert_matches!(non_positive, Err(ServiceError::BadRequest(_)));

    // And an existing order.
    let missing = app
        .services
        .overrides
        .grant_admin_override(Uuid::new_v4(), None, &staff)
        .await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}
