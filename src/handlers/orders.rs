use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{Actor, Role},
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    services::{
        fulfillment::{BulkStatusOutcome, UpdateTrackingRequest},
        orders::{OrderFilters, OrderListPage, OrderWithItems},
        reports::ExportScope,
    },
    ApiResponse, ApiResult, AppState,
};

/// Query parameters shared by order listings and the CSV export.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl OrderListQuery {
    fn filters(&self) -> OrderFilters {
        OrderFilters {
            search: self.search.clone(),
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkStatusRequest {
    pub order_ids: Vec<Uuid>,
    pub status: OrderStatus,
}

fn require_seller(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_seller() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Seller or admin role required".to_string(),
        ))
    }
}

/// Buyer's own order history.
pub async fn list_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<OrderListPage> {
    let page = state
        .services
        .orders
        .list_orders(actor.user_id, &query.filters(), query.page, query.per_page)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
) -> ApiResult<OrderWithItems> {
    let aggregate = state.services.orders.get_order(order_id, &actor).await?;
    Ok(Json(ApiResponse::success(aggregate)))
}

/// Orders carrying items from the calling seller's stores.
pub async fn list_seller_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<OrderListPage> {
    require_seller(&actor)?;
    let page = state
        .services
        .orders
        .list_seller_orders(actor.user_id, &query.filters(), query.page, query.per_page)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .fulfillment
        .update_status(order_id, &actor, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn update_tracking(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateTrackingRequest>,
) -> ApiResult<order::Model> {
    let order = state
        .services
        .fulfillment
        .update_tracking(order_id, &actor, payload)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Applies one status across many orders with per-id outcomes; a failed
/// order never rolls back the ones that succeeded.
pub async fn bulk_update_status(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<BulkStatusRequest>,
) -> ApiResult<Vec<BulkStatusOutcome>> {
    let outcomes = state
        .services
        .fulfillment
        .bulk_update_status(payload.order_ids, &actor, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(outcomes)))
}

/// CSV download of the filtered order set, scoped by the caller's role.
pub async fn export_orders_csv(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    let scope = if actor.is_admin() {
        ExportScope::All
    } else if actor.has_role(Role::Seller) {
        ExportScope::Seller(actor.user_id)
    } else {
        ExportScope::Buyer(actor.user_id)
    };

    let csv = state
        .services
        .reports
        .export_csv(scope, &query.filters())
        .await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"orders.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
