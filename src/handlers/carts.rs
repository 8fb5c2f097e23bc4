use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor, entities::cart_item, errors::ServiceError, services::carts::CartView,
    ApiResponse, ApiResult, AppState,
};

fn require_buyer(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_buyer() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Only buyers have a cart".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

pub async fn get_cart(State(state): State<AppState>, actor: Actor) -> ApiResult<CartView> {
    require_buyer(&actor)?;
    let cart = state.services.cart.get_cart(actor.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

pub async fn add_item(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<AddCartItemRequest>,
) -> ApiResult<cart_item::Model> {
    require_buyer(&actor)?;
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let item = state
        .services
        .cart
        .add_item(actor.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> ApiResult<cart_item::Model> {
    require_buyer(&actor)?;
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let item = state
        .services
        .cart
        .update_quantity(actor.user_id, product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Value> {
    require_buyer(&actor)?;
    state
        .services
        .cart
        .remove_item(actor.user_id, product_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "removed": product_id }))))
}
