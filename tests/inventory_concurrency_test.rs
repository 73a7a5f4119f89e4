mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, TestApp};
use futures::future::join_all;
use office_transfer_api::{auth::Role, entities::transfer};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

#[tokio::test]
async fn concurrent_requests_never_oversell() {
    let app = TestApp::new().await;
    let source = app.seed_office("A", None).await.id;
    let destination = app.seed_office("B", None).await.id;
    let item = app.seed_item("TONER").await.id;
    app.seed_stock(source, item, 10).await;
    let sender = app.token(10, Role::User, Some(source));

    let requests = (0..20).map(|_| {
        app.request(
            Method::POST,
            "/api/v1/distributions",
            Some(json!({
                "itemId": item,
                "fromOfficeId": source,
                "toOfficeId": destination,
                "quantity": 1
            })),
            Some(&sender),
        )
    });
    let statuses: Vec<StatusCode> = join_all(requests)
        .await
        .into_iter()
        .map(|response| response.status())
        .collect();

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let refused = statuses
        .iter()
        .filter(|s| **s == StatusCode::UNPROCESSABLE_ENTITY)
        .count();
    assert_eq!(created, 10, "statuses: {:?}", statuses);
    assert_eq!(refused, 10, "statuses: {:?}", statuses);
    assert_eq!(app.quantity(source, item).await, 0);

    let pending = transfer::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(pending, 10);
}

#[tokio::test]
async fn concurrent_approvals_apply_once() {
    let app = TestApp::new().await;
    let source = app.seed_office("A", None).await.id;
    let destination = app.seed_office("B", None).await.id;
    let item = app.seed_item("TONER").await.id;
    app.seed_stock(source, item, 10).await;
    let sender = app.token(10, Role::User, Some(source));
    let receiver = app.token(20, Role::User, Some(destination));

    let response = app
        .request(
            Method::POST,
            "/api/v1/distributions",
            Some(json!({
                "itemId": item,
                "fromOfficeId": source,
                "toOfficeId": destination,
                "quantity": 4
            })),
            Some(&sender),
        )
        .await;
    let id = json_body(response).await["data"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/distributions/{}/approve", id);

    let statuses: Vec<StatusCode> = join_all(
        (0..5).map(|_| app.request(Method::PUT, &uri, None, Some(&receiver))),
    )
    .await
    .into_iter()
    .map(|response| response.status())
    .collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
        4
    );
    assert_eq!(app.quantity(source, item).await, 6);
    assert_eq!(app.quantity(destination, item).await, 4);
}
