use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItem},
        order::{self, OrderStatus, RefundStatus},
        order_item,
        product::{self, Entity as Product},
        promotion::normalize_code,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::promotions::{self, PromotionService},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    pub promo_code: Option<String>,
}

/// The created aggregate, returned directly so callers need not re-fetch.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Converts a buyer's cart into an immutable order.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    promotions: PromotionService,
    event_sender: Option<Arc<EventSender>>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        promotions: PromotionService,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            promotions,
            event_sender,
        }
    }

    /// Runs the whole checkout as one transaction: price snapshot, discount,
    /// conditional inventory decrements, order + item inserts, cart clear
    /// and promo redemption. Any failure rolls everything back — no dangling
    /// order, no lost stock, cart untouched.
    #[instrument(skip(self, request), fields(buyer_id = %buyer_id))]
    pub async fn checkout(
        &self,
        buyer_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await?;

        let cart_lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(buyer_id))
            .all(&txn)
            .await?;

        if cart_lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cart is empty".to_string(),
            ));
        }

        // Price each line from the current catalog, not from anything cached
        // on the cart.
        let mut priced: Vec<(cart_item::Model, product::Model)> =
            Vec::with_capacity(cart_lines.len());
        let mut subtotal = Decimal::ZERO;

        for line in cart_lines {
            let prod = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "Product {} is no longer available",
                        line.product_id
                    ))
                })?;

            if !prod.is_active {
                return Err(ServiceError::InvalidInput(format!(
                    "Product {} is no longer available",
                    prod.name
                )));
            }

            subtotal += prod.price * Decimal::from(line.quantity);
            priced.push((line, prod));
        }

        // An invalid promo fails the whole checkout; there is no partial
        // discount.
        let mut discount = Decimal::ZERO;
        let mut applied_promo: Option<(Uuid, Option<i32>, String)> = None;
        if let Some(code) = request.promo_code.as_deref() {
            let evaluation = self.promotions.evaluate_with(&txn, code, subtotal).await?;
            if !evaluation.valid {
                return Err(ServiceError::InvalidPromotion(evaluation.message));
            }
            discount = evaluation.discount_amount;
            let promo_id = evaluation.promotion_id.ok_or_else(|| {
                ServiceError::InternalError("valid evaluation without promotion id".to_string())
            })?;
            let usage_limit = crate::entities::Promotion::find_by_id(promo_id)
                .one(&txn)
                .await?
                .and_then(|p| p.usage_limit);
            applied_promo = Some((promo_id, usage_limit, normalize_code(code)));
        }

        let total = subtotal - discount;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        // Conditional decrement: only succeeds while enough stock is still
        // present at write time, which closes the oversell race between
        // concurrent checkouts of the same low-stock item.
        for (line, prod) in &priced {
            let result = Product::update_many()
                .col_expr(
                    product::Column::InventoryCount,
                    Expr::col(product::Column::InventoryCount).sub(line.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(Some(now)))
                .filter(product::Column::Id.eq(prod.id))
                .filter(product::Column::InventoryCount.gte(line.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                warn!(product_id = %prod.id, requested = line.quantity, "Checkout lost the stock race");
                return Err(ServiceError::InsufficientStock(format!(
                    "Not enough stock for {}",
                    prod.name
                )));
            }
        }

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(buyer_id),
            status: Set(OrderStatus::Pending),
            refund_status: Set(RefundStatus::None),
            subtotal_amount: Set(subtotal),
            discount_amount: Set(discount),
            total_amount: Set(total),
            promo_code: Set(applied_promo.as_ref().map(|(_, _, code)| code.clone())),
            shipping_address: Set(request.shipping_address.trim().to_string()),
            tracking_number: Set(None),
            seller_notes: Set(None),
            cancellation_reason: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(priced.len());
        for (line, prod) in &priced {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(prod.id),
                store_id: Set(prod.store_id),
                product_name: Set(prod.name.clone()),
                quantity: Set(line.quantity),
                price_at_time: Set(prod.price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(buyer_id))
            .exec(&txn)
            .await?;

        // Redeem last, inside the same transaction, so usage_count only ever
        // advances with a committed order.
        if let Some((promo_id, usage_limit, _)) = &applied_promo {
            promotions::redeem(&txn, *promo_id, *usage_limit).await?;
        }

        txn.commit().await?;

        info!(order_id = %order_id, total = %total, "Checkout completed");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::CheckoutCompleted { buyer_id, order_id })
                .await
            {
                warn!(error = %e, "Failed to send checkout completed event");
            }
            if let Err(e) = sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, "Failed to send order created event");
            }
            if let Some((promo_id, _, _)) = &applied_promo {
                if let Err(e) = sender
                    .send(Event::PromotionRedeemed {
                        promotion_id: *promo_id,
                        order_id,
                    })
                    .await
                {
                    warn!(error = %e, "Failed to send promotion redeemed event");
                }
            }
        }

        Ok(CheckoutOutcome {
            order: order_model,
            items,
        })
    }
}
