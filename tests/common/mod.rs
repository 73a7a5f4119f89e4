#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use office_transfer_api::{
    app_router,
    auth::{Role, TokenSubject},
    config::AppConfig,
    db,
    entities::{item, office},
    events::{self, EventSender},
    services::ledger,
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "k3Jd9Qw7Lm2Xp5Rt8Vb1Nc4Hy6Gz0Fs-integration-test-secret";

/// Helper harness for spinning up the full application against a throwaway
/// SQLite database file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("office_transfer_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection serializes SQLite writers instead of failing them
        // with "database is locked".
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = app_router(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Signed token for a user with the given role and office.
    pub fn token(&self, user_id: i32, role: Role, office_id: Option<i32>) -> String {
        self.state
            .auth
            .issue_token(&TokenSubject {
                user_id,
                name: Some(format!("User {}", user_id)),
                email: None,
                role,
                office_id,
                permissions: Vec::new(),
            })
            .expect("issue test token")
    }

    pub fn super_admin_token(&self) -> String {
        self.token(1, Role::SuperAdmin, None)
    }

    pub async fn seed_office(&self, code: &str, parent_id: Option<i32>) -> office::Model {
        office::ActiveModel {
            name: Set(format!("{} Office", code)),
            code: Set(code.to_string()),
            parent_id: Set(parent_id),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed office")
    }

    pub async fn seed_item(&self, code: &str) -> item::Model {
        item::ActiveModel {
            name: Set(format!("Item {}", code)),
            item_code: Set(code.to_string()),
            description: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed item")
    }

    pub async fn seed_stock(&self, office_id: i32, item_id: i32, quantity: i32) {
        ledger::commit_receive(&*self.state.db, office_id, item_id, quantity)
            .await
            .expect("seed stock");
    }

    pub async fn quantity(&self, office_id: i32, item_id: i32) -> i32 {
        ledger::get_quantity(&*self.state.db, office_id, item_id)
            .await
            .expect("read stock")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON.
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}
