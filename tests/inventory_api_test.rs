mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, TestApp};
use office_transfer_api::auth::Role;
use serde_json::json;

#[tokio::test]
async fn offices_read_only_their_own_stock() {
    let app = TestApp::new().await;
    let a = app.seed_office("A", None).await.id;
    let b = app.seed_office("B", None).await.id;
    let item = app.seed_item("STAPLER").await.id;
    app.seed_stock(a, item, 7).await;
    app.seed_stock(b, item, 3).await;
    let user = app.token(10, Role::User, Some(a));

    let response = app
        .request(Method::GET, "/api/v1/office-inventory/my-office", None, Some(&user))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["quantity"], 7);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/office-inventory/office/{}/item/{}", a, item),
            None,
            Some(&user),
        )
        .await;
    assert_eq!(json_body(response).await["data"]["quantity"], 7);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/office-inventory/office/{}", b),
            None,
            Some(&user),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/office-inventory/item/{}", item),
            None,
            Some(&user),
        )
        .await;
    assert_eq!(json_body(response).await["data"].as_array().unwrap().len(), 1);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/office-inventory/item/{}", item),
            None,
            Some(&app.super_admin_token()),
        )
        .await;
    assert_eq!(json_body(response).await["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admins_adjust_with_a_reason() {
    let app = TestApp::new().await;
    let a = app.seed_office("A", None).await.id;
    let item = app.seed_item("STAPLER").await.id;
    app.seed_stock(a, item, 7).await;
    let admin = app.token(2, Role::Admin, Some(a));

    let response = app
        .request(
            Method::POST,
            "/api/v1/office-inventory/adjust",
            Some(json!({ "officeId": a, "itemId": item, "delta": -2, "reason": "stocktake" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["newQuantity"], 5);
    let reference = body["data"]["referenceNumber"].as_str().unwrap().to_string();
    assert!(reference.starts_with("ADJ-"));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/office-distributions/reference/{}", reference),
            None,
            Some(&admin),
        )
        .await;
    let row = json_body(response).await;
    assert_eq!(row["data"]["transactionType"], "ADJUSTMENT");
    assert_eq!(row["data"]["quantity"], 2);

    // Never below zero.
    let response = app
        .request(
            Method::POST,
            "/api/v1/office-inventory/adjust",
            Some(json!({ "officeId": a, "itemId": item, "delta": -9, "reason": "stocktake" })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.quantity(a, item).await, 5);

    let user = app.token(10, Role::User, Some(a));
    let response = app
        .request(
            Method::POST,
            "/api/v1/office-inventory/adjust",
            Some(json!({ "officeId": a, "itemId": item, "delta": 1, "reason": "found one" })),
            Some(&user),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
