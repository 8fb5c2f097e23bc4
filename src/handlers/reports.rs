use axum::{extract::State, Json};

use crate::{
    auth::Actor,
    errors::ServiceError,
    services::reports::{PlatformStats, SellerAnalytics},
    ApiResponse, ApiResult, AppState,
};

/// Revenue and order analytics for the calling seller's stores.
pub async fn seller_analytics(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<SellerAnalytics> {
    if !actor.is_seller() {
        return Err(ServiceError::Forbidden(
            "Seller or admin role required".to_string(),
        ));
    }

    let analytics = state.services.reports.seller_analytics(actor.user_id).await?;
    Ok(Json(ApiResponse::success(analytics)))
}

/// Platform-wide totals for the admin console.
pub async fn platform_stats(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<PlatformStats> {
    if !actor.is_admin() {
        return Err(ServiceError::Forbidden(
            "Admin role required".to_string(),
        ));
    }

    let stats = state.services.reports.platform_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
