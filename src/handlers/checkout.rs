use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::Actor,
    errors::ServiceError,
    services::{
        checkout::{CheckoutOutcome, CheckoutRequest},
        promotions::PromoEvaluation,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EvaluatePromotionRequest {
    #[validate(length(min = 1, message = "Promo code is required"))]
    pub code: String,
}

/// Converts the caller's cart into an order.
pub async fn checkout(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<CheckoutOutcome> {
    if !actor.is_buyer() {
        return Err(ServiceError::Forbidden(
            "Only buyers can check out".to_string(),
        ));
    }

    let outcome = state.services.checkout.checkout(actor.user_id, payload).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Prices a promo code against the caller's current cart without redeeming
/// it, so storefronts can preview the discount before checkout.
pub async fn evaluate_promotion(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<EvaluatePromotionRequest>,
) -> ApiResult<PromoEvaluation> {
    if !actor.is_buyer() {
        return Err(ServiceError::Forbidden(
            "Only buyers can evaluate promo codes".to_string(),
        ));
    }
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let cart = state.services.cart.get_cart(actor.user_id).await?;
    let evaluation = state
        .services
        .promotions
        .evaluate(&payload.code, cart.subtotal)
        .await?;
    Ok(Json(ApiResponse::success(evaluation)))
}
