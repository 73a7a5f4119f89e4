mod common;

use axum::{
    body::to_bytes,
    http::{Method, StatusCode},
};
use common::{json_body, TestApp};
use office_transfer_api::auth::Role;
use serde_json::json;

#[tokio::test]
async fn status_and_health_need_no_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["environment"], "test");

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "up");
    assert_eq!(body["data"]["database"], "up");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/distributions", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["details"]["code"], "AUTH_MISSING");

    let response = app
        .request(Method::GET, "/api/v1/distributions", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_id_is_echoed_on_errors() {
    let app = TestApp::new().await;
    let response = app
        .request_with_headers(
            Method::GET,
            "/api/v1/distributions/1",
            None,
            None,
            &[("x-request-id", "trace-me-123")],
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
    assert_eq!(json_body(response).await["request_id"], "trace-me-123");

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_fields_and_bad_values_are_rejected() {
    let app = TestApp::new().await;
    let office = app.seed_office("A", None).await.id;
    let token = app.token(10, Role::User, Some(office));

    let response = app
        .request(
            Method::POST,
            "/api/v1/distributions",
            Some(json!({
                "itemId": 1,
                "fromOfficeId": office,
                "toOfficeId": 2,
                "quantity": 1,
                "status": "COMPLETED"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/distributions",
            Some(json!({
                "itemId": 1,
                "fromOfficeId": office,
                "toOfficeId": 2,
                "quantity": 0
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["details"]["quantity"].is_array());

    let response = app
        .request(
            Method::POST,
            "/api/v1/distributions",
            Some(json!({
                "itemId": 1,
                "fromOfficeId": office,
                "toOfficeId": office,
                "quantity": 1
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_is_managed_by_super_admins_only() {
    let app = TestApp::new().await;
    let office = app.seed_office("HQ", None).await.id;
    let admin = app.token(2, Role::Admin, Some(office));
    let root = app.super_admin_token();

    let new_office = json!({ "name": "North Branch", "code": "NB-1", "parentId": office });
    let response = app
        .request(Method::POST, "/api/v1/offices", Some(new_office.clone()), Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(Method::POST, "/api/v1/offices", Some(new_office.clone()), Some(&root))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["data"]["parentId"], office);

    let response = app
        .request(Method::POST, "/api/v1/offices", Some(new_office), Some(&root))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(
            Method::POST,
            "/api/v1/items",
            Some(json!({ "name": "Projector", "itemCode": "bad code!" })),
            Some(&root),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(Method::GET, "/api/v1/offices", None, Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["total"], 2);
}

#[tokio::test]
async fn guests_see_the_catalog_but_not_stock() {
    let app = TestApp::new().await;
    let office = app.seed_office("HQ", None).await.id;
    let guest = app.token(9, Role::Guest, Some(office));

    let response = app.request(Method::GET, "/api/v1/items", None, Some(&guest)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/office-inventory/my-office", None, Some(&guest))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    let app = TestApp::new().await;
    let office = app.seed_office("HQ", None).await.id;
    let item = app.seed_item("PEN").await.id;
    app.seed_stock(office, item, 1).await;

    let response = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE"));
}
