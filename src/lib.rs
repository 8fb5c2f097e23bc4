//! Storefront API Library
//!
//! Order lifecycle and fulfillment workflow for a multi-seller marketplace:
//! carts, promo-priced checkout, the order/refund state machine and the
//! reporting projections built on top of it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// API v1 routes
pub fn api_v1_routes() -> Router<AppState> {
    let cart = Router::new()
        .route("/cart", get(handlers::carts::get_cart))
        .route(
            "/cart/items",
            axum::routing::post(handlers::carts::add_item),
        )
        .route(
            "/cart/items/:product_id",
            axum::routing::put(handlers::carts::update_item)
                .delete(handlers::carts::remove_item),
        );

    let checkout = Router::new()
        .route(
            "/checkout",
            axum::routing::post(handlers::checkout::checkout),
        )
        .route(
            "/promotions/evaluate",
            axum::routing::post(handlers::checkout::evaluate_promotion),
        );

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/export", get(handlers::orders::export_orders_csv))
        .route(
            "/orders/bulk-status",
            axum::routing::post(handlers::orders::bulk_update_status),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            axum::routing::put(handlers::orders::update_order_status),
        )
        .route(
            "/orders/:id/tracking",
            axum::routing::put(handlers::orders::update_tracking),
        )
        .route(
            "/orders/:id/cancellation",
            axum::routing::post(handlers::refunds::request_cancellation),
        )
        .route(
            "/orders/:id/refund",
            axum::routing::post(handlers::refunds::adjudicate_refund),
        )
        .route(
            "/orders/:id/refund/complete",
            axum::routing::post(handlers::refunds::complete_refund),
        );

    let seller = Router::new()
        .route("/seller/orders", get(handlers::orders::list_seller_orders))
        .route("/seller/analytics", get(handlers::reports::seller_analytics));

    let admin = Router::new().route("/admin/stats", get(handlers::reports::platform_stats));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(cart)
        .merge(checkout)
        .merge(orders)
        .merge(seller)
        .merge(admin)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "storefront-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
