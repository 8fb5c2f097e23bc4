//! Cart mutations and the live-priced cart view.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::errors::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn adding_the_same_product_accumulates_quantity() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Cart Store").await;
    let prod = app.seed_product(store.id, "Mug", dec!(8.00), 50).await;

    app.add_to_cart(buyer, prod.id, 2).await;
    let line = app.add_to_cart(buyer, prod.id, 3).await;
    assert_eq!(line.quantity, 5);

    let cart = app.services().cart.get_cart(buyer).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.subtotal, dec!(40.00));
}

#[tokio::test]
async fn cart_view_prices_from_the_live_catalog() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Cart Store").await;
    let prod = app.seed_product(store.id, "Mug", dec!(8.00), 50).await;
    app.add_to_cart(buyer, prod.id, 1).await;

    // Reprice: the cart view must follow, since nothing is cached on the row.
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    let mut active: storefront_api::entities::product::ActiveModel =
        storefront_api::entities::product::Entity::find_by_id(prod.id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap()
            .into();
    active.price = Set(dec!(9.50));
    active.update(&*app.state.db).await.unwrap();

    let cart = app.services().cart.get_cart(buyer).await.unwrap();
    assert_eq!(cart.items[0].unit_price, dec!(9.50));
    assert_eq!(cart.subtotal, dec!(9.50));
}

#[tokio::test]
async fn quantity_below_one_is_rejected() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Cart Store").await;
    let prod = app.seed_product(store.id, "Mug", dec!(8.00), 50).await;

    let add = app.services().cart.add_item(buyer, prod.id, 0).await;
    assert_matches!(add, Err(ServiceError::ValidationError(_)));

    app.add_to_cart(buyer, prod.id, 1).await;
    let update = app.services().cart.update_quantity(buyer, prod.id, -2).await;
    assert_matches!(update, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn inactive_products_cannot_be_added() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Cart Store").await;
    let prod = app.seed_product(store.id, "Retired Mug", dec!(8.00), 50).await;

    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    let mut active: storefront_api::entities::product::ActiveModel =
        storefront_api::entities::product::Entity::find_by_id(prod.id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap()
            .into();
    active.is_active = Set(false);
    active.update(&*app.state.db).await.unwrap();

    let result = app.services().cart.add_item(buyer, prod.id, 1).await;
    assert_matches!(result, Err(ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn remove_and_missing_lines_behave() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let store = app.seed_store(Uuid::new_v4(), "Cart Store").await;
    let prod = app.seed_product(store.id, "Mug", dec!(8.00), 50).await;

    app.add_to_cart(buyer, prod.id, 1).await;
    app.services().cart.remove_item(buyer, prod.id).await.unwrap();

    let cart = app.services().cart.get_cart(buyer).await.unwrap();
    assert!(cart.items.is_empty());

    let missing = app.services().cart.remove_item(buyer, prod.id).await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}
