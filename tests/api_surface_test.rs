//! HTTP surface: actor resolution from headers, role guards and error
//! mapping through the real router.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::TestApp;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::api_v1_routes;

fn router(app: &TestApp) -> Router {
    api_v1_routes().with_state(app.state.clone())
}

fn authed(method: Method, uri: &str, user_id: Uuid, roles: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .header("x-user-roles", roles)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(Request::builder().uri("/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_roles_are_rejected() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(authed(Method::GET, "/cart", Uuid::new_v4(), "superuser"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn buyer_reads_an_empty_cart() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(authed(Method::GET, "/cart", Uuid::new_v4(), "buyer"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn role_guards_map_to_forbidden() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();

    // A buyer has no business on the admin dashboard or seller analytics.
    for uri in ["/admin/stats", "/seller/analytics"] {
        let response = router(&app)
            .oneshot(authed(Method::GET, uri, buyer, "buyer"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "uri: {uri}");
    }

    // Sellers still cannot see platform stats.
    let response = router(&app)
        .oneshot(authed(Method::GET, "/admin/stats", buyer, "seller"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_orders_surface_as_not_found() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(authed(
            Method::GET,
            &format!("/orders/{}", Uuid::new_v4()),
            Uuid::new_v4(),
            "buyer",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn csv_export_sets_the_content_type() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(authed(
            Method::GET,
            "/orders/export",
            Uuid::new_v4(),
            "admin",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/csv"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("order_id,date,status,total,item_count"));
}

#[tokio::test]
async fn status_endpoint_is_public() {
    let app = TestApp::new().await;

    let response = router(&app)
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["data"]["service"], "storefront-api");
}
