use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    entities::order::{OrderStatus, RefundStatus},
    errors::ErrorResponse,
    handlers,
    services::{
        carts::{CartLine, CartView},
        checkout::CheckoutRequest,
        fulfillment::{BulkStatusOutcome, UpdateTrackingRequest},
        promotions::PromoEvaluation,
        refunds::RefundDecision,
        reports::{MonthlyRevenue, PlatformStats, SellerAnalytics, TopProduct},
    },
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Order lifecycle and fulfillment workflow for a multi-seller marketplace storefront"
    ),
    components(schemas(
        ErrorResponse,
        OrderStatus,
        RefundStatus,
        CartLine,
        CartView,
        CheckoutRequest,
        PromoEvaluation,
        RefundDecision,
        UpdateTrackingRequest,
        BulkStatusOutcome,
        MonthlyRevenue,
        TopProduct,
        SellerAnalytics,
        PlatformStats,
        handlers::carts::AddCartItemRequest,
        handlers::carts::UpdateCartItemRequest,
        handlers::checkout::EvaluatePromotionRequest,
        handlers::orders::UpdateStatusRequest,
        handlers::orders::BulkStatusRequest,
        handlers::refunds::CancellationRequest,
        handlers::refunds::AdjudicationRequest,
    )),
    tags(
        (name = "cart", description = "Buyer cart management"),
        (name = "checkout", description = "Cart to order conversion"),
        (name = "orders", description = "Order queries and fulfillment"),
        (name = "refunds", description = "Cancellation and refund adjudication"),
        (name = "reports", description = "Seller analytics and admin dashboards"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
