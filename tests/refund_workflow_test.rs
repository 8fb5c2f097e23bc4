//! Cancellation request and refund adjudication: the nested refund
//! sub-state machine and its gating against fulfillment status.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    auth::Actor,
    entities::order::{OrderStatus, RefundStatus},
    errors::ServiceError,
    services::{checkout::CheckoutRequest, refunds::RefundDecision},
};
use uuid::Uuid;

async fn place_order(app: &TestApp, seller: Uuid, buyer: Uuid) -> Uuid {
    let store = app.seed_store(seller, "Refund Store").await;
    let prod = app.seed_product(store.id, "Kettle", dec!(40.00), 50).await;
    app.add_to_cart(buyer, prod.id, 1).await;

    app.services()
        .checkout
        .checkout(
            buyer,
            CheckoutRequest {
                shipping_address: "9 Mill Road".to_string(),
                promo_code: None,
            },
        )
        .await
        .expect("checkout should succeed")
        .order
        .id
}

#[tokio::test]
async fn request_then_approve_cancels_the_order() {
    let app = TestApp::new().await;
    let seller_id = Uuid::new_v4();
    let buyer_id = Uuid::new_v4();
    let order_id = place_order(&app, seller_id, buyer_id).await;

    let order = app
        .services()
        .refunds
        .request_cancellation(order_id, buyer_id, "changed my mind".to_string())
        .await
        .expect("request on a pending order should succeed");
    assert_eq!(order.refund_status, RefundStatus::Requested);
    assert_eq!(order.status, OrderStatus::Pending, "a request is not a cancellation");
    assert_eq!(order.cancellation_reason.as_deref(), Some("changed my mind"));

    let seller = Actor::seller(seller_id);
    let order = app
        .services()
        .refunds
        .adjudicate(order_id, &seller, RefundDecision::Approve, None)
        .await
        .expect("seller approval should succeed");
    assert_eq!(order.refund_status, RefundStatus::Approved);
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.cancelled_at.is_some());

    // A second request is rejected outright.
    let again = app
        .services()
        .refunds
        .request_cancellation(order_id, buyer_id, "again".to_string())
        .await;
    assert_matches!(again, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn rejection_requires_notes_and_leaves_the_order_running() {
    let app = TestApp::new().await;
    let seller_id = Uuid::new_v4();
    let buyer_id = Uuid::new_v4();
    let order_id = place_order(&app, seller_id, buyer_id).await;

    app.services()
        .refunds
        .request_cancellation(order_id, buyer_id, "wrong size".to_string())
        .await
        .unwrap();

    let seller = Actor::seller(seller_id);
    let missing_notes = app
        .services()
        .refunds
        .adjudicate(order_id, &seller, RefundDecision::Reject, None)
        .await;
    assert_matches!(missing_notes, Err(ServiceError::ValidationError(_)));

    let order = app
        .services()
        .refunds
        .adjudicate(
            order_id,
            &seller,
            RefundDecision::Reject,
            Some("already packed".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(order.refund_status, RefundStatus::Rejected);
    assert_eq!(order.status, OrderStatus::Pending, "order proceeds");
    assert_eq!(order.seller_notes.as_deref(), Some("already packed"));

    // rejected → approved is an illegal edge.
    let flip = app
        .services()
        .refunds
        .adjudicate(order_id, &seller, RefundDecision::Approve, None)
        .await;
    assert_matches!(flip, Err(ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn completion_is_only_reachable_from_approved() {
    let app = TestApp::new().await;
    let seller_id = Uuid::new_v4();
    let buyer_id = Uuid::new_v4();
    let order_id = place_order(&app, seller_id, buyer_id).await;
    let seller = Actor::seller(seller_id);

    // Completing before any request exists is illegal.
    let premature = app
        .services()
        .refunds
        .complete_refund(order_id, &seller)
        .await;
    assert_matches!(premature, Err(ServiceError::InvalidTransition(_)));

    app.services()
        .refunds
        .request_cancellation(order_id, buyer_id, "never mind".to_string())
        .await
        .unwrap();
    app.services()
        .refunds
        .adjudicate(order_id, &seller, RefundDecision::Approve, None)
        .await
        .unwrap();

    let order = app
        .services()
        .refunds
        .complete_refund(order_id, &seller)
        .await
        .expect("approved refunds can be completed");
    assert_eq!(order.refund_status, RefundStatus::Completed);
    // Completion is bookkeeping only.
    assert_eq!(order.status, OrderStatus::Cancelled);

    let twice = app
        .services()
        .refunds
        .complete_refund(order_id, &seller)
        .await;
    assert_matches!(twice, Err(ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn cancellation_window_closes_once_fulfillment_starts() {
    let app = TestApp::new().await;
    let seller_id = Uuid::new_v4();
    let buyer_id = Uuid::new_v4();
    let order_id = place_order(&app, seller_id, buyer_id).await;

    let seller = Actor::seller(seller_id);
    app.services()
        .fulfillment
        .update_status(order_id, &seller, OrderStatus::Processing)
        .await
        .unwrap();

    let result = app
        .services()
        .refunds
        .request_cancellation(order_id, buyer_id, "too late?".to_string())
        .await;
    assert_matches!(result, Err(ServiceError::InvalidTransition(_)));
}

#[tokio::test]
async fn only_the_owning_buyer_may_request_cancellation() {
    let app = TestApp::new().await;
    let order_id = place_order(&app, Uuid::new_v4(), Uuid::new_v4()).await;

    let stranger = Uuid::new_v4();
    let result = app
        .services()
        .refunds
        .request_cancellation(order_id, stranger, "not mine".to_string())
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn adjudication_is_limited_to_owning_sellers_and_admins() {
    let app = TestApp::new().await;
    let buyer_id = Uuid::new_v4();
    let order_id = place_order(&app, Uuid::new_v4(), buyer_id).await;

    app.services()
        .refunds
        .request_cancellation(order_id, buyer_id, "please".to_string())
        .await
        .unwrap();

    let unrelated_seller = Actor::seller(Uuid::new_v4());
    let forbidden = app
        .services()
        .refunds
        .adjudicate(order_id, &unrelated_seller, RefundDecision::Approve, None)
        .await;
    assert_matches!(forbidden, Err(ServiceError::Forbidden(_)));

    let admin = Actor::admin(Uuid::new_v4());
    let order = app
        .services()
        .refunds
        .adjudicate(order_id, &admin, RefundDecision::Approve, None)
        .await
        .expect("admins may adjudicate any order");
    assert_eq!(order.refund_status, RefundStatus::Approved);
}

#[tokio::test]
async fn empty_reason_is_a_validation_error() {
    let app = TestApp::new().await;
    let buyer_id = Uuid::new_v4();
    let order_id = place_order(&app, Uuid::new_v4(), buyer_id).await;

    let result = app
        .services()
        .refunds
        .request_cancellation(order_id, buyer_id, "   ".to_string())
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}
