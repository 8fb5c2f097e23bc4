use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    entities::order,
    errors::ServiceError,
    services::refunds::RefundDecision,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancellationRequest {
    #[validate(length(min = 1, message = "A cancellation reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjudicationRequest {
    pub decision: RefundDecision,
    pub notes: Option<String>,
}

/// Buyer files a cancellation request on their own pending order.
pub async fn request_cancellation(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CancellationRequest>,
) -> ApiResult<order::Model> {
    if !actor.is_buyer() {
        return Err(ServiceError::Forbidden(
            "Only the buyer may request a cancellation".to_string(),
        ));
    }
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let order = state
        .services
        .refunds
        .request_cancellation(order_id, actor.user_id, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Seller/admin approves or rejects a pending cancellation request.
pub async fn adjudicate_refund(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<AdjudicationRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .refunds
        .adjudicate(order_id, &actor, payload.decision, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Marks an approved refund as issued out-of-band.
pub async fn complete_refund(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .refunds
        .complete_refund(order_id, &actor)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
