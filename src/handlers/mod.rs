pub mod carts;
pub mod checkout;
pub mod orders;
pub mod refunds;
pub mod reports;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services;

/// Aggregate of the workflow services shared by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub cart: services::carts::CartService,
    pub promotions: services::promotions::PromotionService,
    pub checkout: services::checkout::CheckoutService,
    pub orders: services::orders::OrderService,
    pub fulfillment: services::fulfillment::FulfillmentService,
    pub refunds: services::refunds::RefundService,
    pub reports: services::reports::ReportService,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        let promotions = services::promotions::PromotionService::new(db_pool.clone());
        let checkout = services::checkout::CheckoutService::new(
            db_pool.clone(),
            promotions.clone(),
            event_sender.clone(),
        );

        Self {
            cart: services::carts::CartService::new(db_pool.clone()),
            promotions,
            checkout,
            orders: services::orders::OrderService::new(db_pool.clone()),
            fulfillment: services::fulfillment::FulfillmentService::new(
                db_pool.clone(),
                event_sender.clone(),
            ),
            refunds: services::refunds::RefundService::new(db_pool.clone(), event_sender),
            reports: services::reports::ReportService::new(db_pool),
        }
    }
}
