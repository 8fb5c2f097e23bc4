use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{cart_item, product, promotion, store},
    handlers::AppServices,
    AppState,
};

/// Test harness backed by an in-memory SQLite database with the real
/// migrations applied. A single pooled connection keeps the database alive
/// for the lifetime of the test.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db_arc = Arc::new(pool);
        let services = AppServices::new(db_arc.clone(), None);
        let config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );

        Self {
            state: AppState {
                db: db_arc,
                config,
                services,
            },
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    pub async fn seed_store(&self, owner_id: Uuid, name: &str) -> store::Model {
        store::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed store")
    }

    pub async fn seed_product(
        &self,
        store_id: Uuid,
        name: &str,
        price: Decimal,
        inventory: i32,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            name: Set(name.to_string()),
            sku: Set(format!("SKU-{}", name.to_ascii_uppercase())),
            price: Set(price),
            inventory_count: Set(inventory),
            is_active: Set(true),
            image_url: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_promotion(
        &self,
        code: &str,
        discount_type: promotion::DiscountType,
        value: Decimal,
        min_purchase: Option<Decimal>,
        usage_limit: Option<i32>,
    ) -> promotion::Model {
        let now = Utc::now();
        promotion::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(promotion::normalize_code(code)),
            description: Set(None),
            discount_type: Set(discount_type),
            discount_value: Set(value),
            min_purchase_amount: Set(min_purchase),
            max_discount_amount: Set(None),
            usage_limit: Set(usage_limit),
            usage_count: Set(0),
            valid_from: Set(now - Duration::days(1)),
            valid_until: Set(Some(now + Duration::days(30))),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed promotion")
    }

    pub async fn add_to_cart(
        &self,
        buyer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> cart_item::Model {
        self.services()
            .cart
            .add_item(buyer_id, product_id, quantity)
            .await
            .expect("failed to add cart item")
    }
}
