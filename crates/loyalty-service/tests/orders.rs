//! Order intake and listing integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use loyalty_store::Store;
use rust_decimal_macros::dec;

// ============================================================================
// Intake
// ============================================================================

#[tokio::test]
async fn new_order_is_accepted() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    assert_eq!(
        harness.submit_order(&alice, "3182649").await,
        StatusCode::ACCEPTED
    );
}

#[tokio::test]
async fn resubmission_by_owner_is_ok_and_single() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    assert_eq!(
        harness.submit_order(&alice, "3182649").await,
        StatusCode::ACCEPTED
    );
    assert_eq!(harness.submit_order(&alice, "3182649").await, StatusCode::OK);

    let orders = harness.store.list_orders_by_user(&alice.user_id).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn order_of_another_user_conflicts() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;
    let bob = harness.register("bob").await;

    assert_eq!(
        harness.submit_order(&bob, "3182649").await,
        StatusCode::ACCEPTED
    );
    assert_eq!(
        harness.submit_order(&alice, "3182649").await,
        StatusCode::CONFLICT
    );

    let order = harness
        .store
        .get_order_by_number("3182649")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.user_id, bob.user_id);
}

#[tokio::test]
async fn checksum_failure_is_unprocessable() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    assert_eq!(
        harness.submit_order(&alice, "11111111").await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        harness.submit_order(&alice, "31826x9").await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn empty_body_is_a_bad_request() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    assert_eq!(
        harness.submit_order(&alice, "  \n").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn surrounding_whitespace_is_ignored() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    assert_eq!(
        harness.submit_order(&alice, "3182649\n").await,
        StatusCode::ACCEPTED
    );
    assert!(harness
        .store
        .get_order_by_number("3182649")
        .await
        .unwrap()
        .is_some());
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn listing_without_orders_is_no_content() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    let (name, value) = alice.auth();
    harness
        .server
        .get("/api/user/orders")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn listing_shows_status_and_accrual() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;

    harness.submit_order(&alice, "3182649").await;
    harness.submit_order(&alice, "79927398713").await;
    harness.settle("3182649", dec!(729.98)).await;

    let (name, value) = alice.auth();
    let response = harness
        .server
        .get("/api/user/orders")
        .add_header(name, value)
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 2);

    assert_eq!(orders[0]["number"], "3182649");
    assert_eq!(orders[0]["status"], "PROCESSED");
    assert_eq!(orders[0]["accrual"], 729.98);
    assert!(orders[0]["uploaded_at"].is_string());

    assert_eq!(orders[1]["number"], "79927398713");
    assert_eq!(orders[1]["status"], "NEW");
    assert!(orders[1].get("accrual").is_none());
}

#[tokio::test]
async fn listing_is_per_user() {
    let harness = TestHarness::new();
    let alice = harness.register("alice").await;
    let bob = harness.register("bob").await;

    harness.submit_order(&alice, "3182649").await;

    let (name, value) = bob.auth();
    harness
        .server
        .get("/api/user/orders")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}
