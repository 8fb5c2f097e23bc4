use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::promotion::{self, normalize_code, DiscountType, Entity as Promotion},
    errors::ServiceError,
};

/// Outcome of pricing a promo code against a cart total.
///
/// Invalid codes are a result, not an error: callers decide whether an
/// invalid code is fatal (checkout) or informational (pre-checkout preview).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromoEvaluation {
    pub valid: bool,
    pub discount_amount: Decimal,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<Uuid>,
}

impl PromoEvaluation {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            discount_amount: Decimal::ZERO,
            message: message.into(),
            promotion_id: None,
        }
    }
}

#[derive(Clone)]
pub struct PromotionService {
    db: Arc<DbPool>,
}

impl PromotionService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Validate and price a promo code against a cart total.
    ///
    /// Never touches `usage_count`: only a committed checkout that applies
    /// the code redeems it (see [`redeem`]), so lookups cannot exhaust a
    /// usage limit.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn evaluate(
        &self,
        code: &str,
        cart_total: Decimal,
    ) -> Result<PromoEvaluation, ServiceError> {
        self.evaluate_with(&*self.db, code, cart_total).await
    }

    /// Same as [`Self::evaluate`], against an explicit connection so checkout
    /// can read inside its own transaction.
    pub async fn evaluate_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        code: &str,
        cart_total: Decimal,
    ) -> Result<PromoEvaluation, ServiceError> {
        let normalized = normalize_code(code);
        if normalized.is_empty() {
            return Ok(PromoEvaluation::invalid("No promo code provided"));
        }

        let promo = Promotion::find()
            .filter(promotion::Column::Code.eq(normalized.clone()))
            .one(conn)
            .await?;

        let Some(promo) = promo else {
            debug!(code = %normalized, "Promo code not found");
            return Ok(PromoEvaluation::invalid("This promo code does not exist"));
        };

        let now = Utc::now();
        if !promo.is_active {
            return Ok(PromoEvaluation::invalid(
                "This promo code is no longer active",
            ));
        }
        if now < promo.valid_from {
            return Ok(PromoEvaluation::invalid("This promo code is not active yet"));
        }
        if let Some(until) = promo.valid_until {
            if now > until {
                return Ok(PromoEvaluation::invalid("This promo code has expired"));
            }
        }
        if let Some(limit) = promo.usage_limit {
            if promo.usage_count >= limit {
                warn!(code = %promo.code, "Promotion has reached its usage limit");
                return Ok(PromoEvaluation::invalid(
                    "This promo code has reached its usage limit",
                ));
            }
        }
        if let Some(min) = promo.min_purchase_amount {
            if cart_total < min {
                return Ok(PromoEvaluation::invalid(format!(
                    "This promo code requires a minimum purchase of {}",
                    min
                )));
            }
        }

        let discount = calculate_discount(&promo, cart_total);

        Ok(PromoEvaluation {
            valid: true,
            discount_amount: discount,
            message: format!("Promo code {} applied", promo.code),
            promotion_id: Some(promo.id),
        })
    }
}

/// Discount for an eligible promotion. Percentage discounts are capped by
/// `max_discount_amount`; no discount ever exceeds the cart total.
pub fn calculate_discount(promo: &promotion::Model, cart_total: Decimal) -> Decimal {
    let discount = match promo.discount_type {
        DiscountType::Percentage => {
            let raw = cart_total * promo.discount_value / Decimal::from(100);
            match promo.max_discount_amount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountType::Fixed => promo.discount_value,
    };

    discount.min(cart_total).max(Decimal::ZERO)
}

/// Record one redemption, guarded against the usage limit.
///
/// Runs inside the committing checkout transaction as a conditional UPDATE
/// so two concurrent checkouts cannot push `usage_count` past `usage_limit`.
/// Zero affected rows means the code was exhausted since evaluation.
pub async fn redeem<C: ConnectionTrait>(
    conn: &C,
    promo_id: Uuid,
    usage_limit: Option<i32>,
) -> Result<(), ServiceError> {
    let mut update = Promotion::update_many()
        .col_expr(
            promotion::Column::UsageCount,
            Expr::col(promotion::Column::UsageCount).add(1),
        )
        .col_expr(promotion::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(promotion::Column::Id.eq(promo_id));

    if let Some(limit) = usage_limit {
        update = update.filter(promotion::Column::UsageCount.lt(limit));
    }

    let result = update.exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InvalidPromotion(
            "This promo code has reached its usage limit".to_string(),
        ));
    }

    Ok(())
}
