//! Checkout orchestration: price snapshots, discounting, atomicity and the
//! conditional inventory/promo-usage updates.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    entities::{cart_item, order, order_item, product, promotion, Promotion},
    errors::ServiceError,
    services::checkout::CheckoutRequest,
};
use uuid::Uuid;

fn checkout_request(promo_code: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "12 Harbor Lane, Portsmouth".to_string(),
        promo_code: promo_code.map(str::to_string),
    }
}

#[tokio::test]
async fn checkout_creates_order_clears_cart_and_decrements_stock() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();

    let store = app.seed_store(seller, "Harbor Goods").await;
    let prod = app.seed_product(store.id, "Lantern", dec!(10.00), 5).await;
    app.add_to_cart(buyer, prod.id, 2).await;

    let outcome = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(None))
        .await
        .expect("checkout should succeed");

    assert_eq!(outcome.order.status, order::OrderStatus::Pending);
    assert_eq!(outcome.order.refund_status, order::RefundStatus::None);
    assert_eq!(outcome.order.subtotal_amount, dec!(20.00));
    assert_eq!(outcome.order.discount_amount, dec!(0));
    assert_eq!(outcome.order.total_amount, dec!(20.00));
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].price_at_time, dec!(10.00));
    assert_eq!(outcome.items[0].quantity, 2);
    assert_eq!(outcome.items[0].store_id, store.id);

    // Cart is emptied by the same transaction.
    let remaining = cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(buyer))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(remaining.is_empty());

    // Stock was decremented conditionally.
    let prod_after = product::Entity::find_by_id(prod.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prod_after.inventory_count, 3);
}

#[tokio::test]
async fn order_totals_are_immune_to_later_price_changes() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Harbor Goods").await;
    let prod = app.seed_product(store.id, "Lantern", dec!(10.00), 5).await;
    app.add_to_cart(buyer, prod.id, 2).await;

    let outcome = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(None))
        .await
        .unwrap();

    // Reprice the product after the order exists.
    let mut active: product::ActiveModel = product::Entity::find_by_id(prod.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .into();
    active.price = sea_orm::Set(dec!(99.00));
    sea_orm::ActiveModelTrait::update(active, &*app.state.db)
        .await
        .unwrap();

    let order_after = order::Entity::find_by_id(outcome.order.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let item_after = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(outcome.order.id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(order_after.total_amount, dec!(20.00));
    assert_eq!(item_after.price_at_time, dec!(10.00));
}

#[tokio::test]
async fn checkout_rejects_an_empty_cart() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    let result = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(None))
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn valid_promo_discounts_total_and_redeems_once() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Harbor Goods").await;
    let prod = app.seed_product(store.id, "Lantern", dec!(10.00), 5).await;
    app.add_to_cart(buyer, prod.id, 2).await;

    let promo = app
        .seed_promotion(
            "save5",
            promotion::DiscountType::Fixed,
            dec!(5.00),
            Some(dec!(15.00)),
            Some(10),
        )
        .await;

    let outcome = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(Some("SAVE5")))
        .await
        .expect("checkout with valid promo should succeed");

    assert_eq!(outcome.order.subtotal_amount, dec!(20.00));
    assert_eq!(outcome.order.discount_amount, dec!(5.00));
    assert_eq!(outcome.order.total_amount, dec!(15.00));
    assert_eq!(outcome.order.promo_code.as_deref(), Some("SAVE5"));

    let promo_after = Promotion::find_by_id(promo.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo_after.usage_count, 1);
}

#[tokio::test]
async fn invalid_promo_fails_the_whole_checkout() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Harbor Goods").await;
    let prod = app.seed_product(store.id, "Lantern", dec!(10.00), 5).await;
    app.add_to_cart(buyer, prod.id, 2).await;

    // Cart totals 20, below the 25 minimum: the evaluator's reason must
    // surface and nothing may be written.
    let promo = app
        .seed_promotion(
            "SAVE5",
            promotion::DiscountType::Fixed,
            dec!(5.00),
            Some(dec!(25.00)),
            None,
        )
        .await;

    let result = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(Some("SAVE5")))
        .await;
    assert_matches!(
        result,
        Err(ServiceError::InvalidPromotion(ref msg)) if msg.contains("minimum purchase")
    );

    // No partial state: cart intact, stock intact, no order, promo unused.
    let cart = cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(buyer))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(cart.len(), 1);

    let prod_after = product::Entity::find_by_id(prod.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prod_after.inventory_count, 5);

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());

    let promo_after = Promotion::find_by_id(promo.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo_after.usage_count, 0);
}

#[tokio::test]
async fn insufficient_stock_rolls_the_transaction_back() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Harbor Goods").await;
    let prod = app.seed_product(store.id, "Lantern", dec!(10.00), 1).await;
    app.add_to_cart(buyer, prod.id, 2).await;

    let result = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(None))
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    let cart = cart_item::Entity::find()
        .filter(cart_item::Column::UserId.eq(buyer))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(cart.len(), 1, "cart must be untouched");

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty(), "no dangling order may exist");

    let prod_after = product::Entity::find_by_id(prod.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(prod_after.inventory_count, 1, "stock must be untouched");
}

#[tokio::test]
async fn evaluation_alone_never_spends_a_promo() {
    let app = TestApp::new().await;
    let promo = app
        .seed_promotion(
            "SAVE5",
            promotion::DiscountType::Fixed,
            dec!(5.00),
            Some(dec!(15.00)),
            Some(1),
        )
        .await;

    for _ in 0..3 {
        let evaluation = app
            .services()
            .promotions
            .evaluate("save5", dec!(20.00))
            .await
            .unwrap();
        assert!(evaluation.valid);
        assert_eq!(evaluation.discount_amount, dec!(5.00));
    }

    let promo_after = Promotion::find_by_id(promo.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo_after.usage_count, 0);
}

#[tokio::test]
async fn exhausted_promo_is_rejected_at_evaluation() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Harbor Goods").await;
    let prod = app.seed_product(store.id, "Lantern", dec!(10.00), 10).await;
    app.add_to_cart(buyer, prod.id, 2).await;

    let promo = app
        .seed_promotion(
            "ONCE",
            promotion::DiscountType::Fixed,
            dec!(5.00),
            None,
            Some(1),
        )
        .await;

    // First redemption consumes the single use.
    app.services()
        .checkout
        .checkout(buyer, checkout_request(Some("ONCE")))
        .await
        .unwrap();

    app.add_to_cart(buyer, prod.id, 2).await;
    let result = app
        .services()
        .checkout
        .checkout(buyer, checkout_request(Some("ONCE")))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidPromotion(_)));

    let promo_after = Promotion::find_by_id(promo.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo_after.usage_count, 1, "usage may never pass the limit");
}
