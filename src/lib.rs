//! Office Transfer API Library
//!
//! Inter-office stock transfers: per-office inventory ledger, barcoded item
//! instances, the transfer approval workflow and its audit trail.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use http::HeaderValue;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AccessPolicy, AuthConfig, AuthRouterExt, AuthService};
use crate::config::AppConfig;
use crate::db::{ContentionRetry, DbPool};
use crate::events::EventSender;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Builds the access policy, token service and domain services around
    /// one connection pool and event channel.
    pub fn new(db: Arc<DbPool>, config: AppConfig, event_sender: EventSender) -> Self {
        let policy = Arc::new(AccessPolicy::default());
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), policy.clone()));
        let services = handlers::AppServices::new(
            db.clone(),
            policy,
            Arc::new(event_sender),
            ContentionRetry::from(&config),
        );
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        Self {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{
        catalog, distributions, health, item_instances, office_distributions, office_inventory,
        purchases,
    };

    // Transfers; each group is gated by its coarse permission, services
    // apply the office scope.
    let transfers_read = Router::new()
        .route("/distributions", get(distributions::list_distributions))
        .route("/distributions/recent", get(distributions::recent_distributions))
        .route(
            "/distributions/date-range",
            get(distributions::distributions_by_date_range),
        )
        .route("/distributions/:id", get(distributions::get_distribution))
        .route(
            "/distributions/:id/barcodes",
            get(distributions::distribution_barcodes),
        )
        // Initiators cancel their own requests; the service checks who may.
        .route(
            "/distributions/:id/cancel",
            put(distributions::cancel_distribution),
        )
        .with_permission(perm::TRANSFERS_VIEW);

    let transfers_create = Router::new()
        .route("/distributions", post(distributions::create_distribution))
        .with_permission(perm::TRANSFERS_CREATE);

    let transfers_edit = Router::new()
        .route("/distributions/:id", put(distributions::update_distribution))
        .with_permission(perm::TRANSFERS_EDIT);

    let transfers_delete = Router::new()
        .route(
            "/distributions/:id",
            axum::routing::delete(distributions::delete_distribution),
        )
        .with_permission(perm::TRANSFERS_DELETE);

    let transfers_approve = Router::new()
        .route(
            "/distributions/:id/approve",
            put(distributions::approve_distribution),
        )
        .route(
            "/distributions/:id/accept",
            put(distributions::accept_distribution),
        )
        .route(
            "/distributions/:id/reject",
            put(distributions::reject_distribution),
        )
        .with_permission(perm::TRANSFERS_APPROVE);

    // Office inventory
    let inventory_read = Router::new()
        .route(
            "/office-inventory/my-office",
            get(office_inventory::my_office_inventory),
        )
        .route(
            "/office-inventory/my-office/item-instances",
            get(office_inventory::my_office_instances),
        )
        .route(
            "/office-inventory/office/:office_id",
            get(office_inventory::office_inventory),
        )
        .route(
            "/office-inventory/office/:office_id/item-instances",
            get(office_inventory::office_instances),
        )
        .route(
            "/office-inventory/office/:office_id/item/:item_id",
            get(office_inventory::office_item_quantity),
        )
        .route(
            "/office-inventory/item/:item_id",
            get(office_inventory::item_inventory),
        )
        .with_permission(perm::OFFICE_INVENTORY_VIEW);

    let inventory_adjust = Router::new()
        .route(
            "/office-inventory/adjust",
            post(office_inventory::adjust_inventory),
        )
        .with_permission(perm::OFFICE_INVENTORY_ADJUST);

    // Office distributions
    let distributions_read = Router::new()
        .route(
            "/office-distributions/office/:office_id/transactions",
            get(office_distributions::office_transactions),
        )
        .route(
            "/office-distributions/office/:office_id/pending",
            get(office_distributions::pending_transactions),
        )
        .route(
            "/office-distributions/office/:office_id/children",
            get(office_distributions::child_offices),
        )
        .route(
            "/office-distributions/office/:office_id/parent",
            get(office_distributions::parent_office),
        )
        .route(
            "/office-distributions/office/:office_id/distribution-history",
            get(office_distributions::distribution_history),
        )
        .route(
            "/office-distributions/office/:office_id/return-history",
            get(office_distributions::return_history),
        )
        .route(
            "/office-distributions/item/:item_id/history",
            get(office_distributions::item_history),
        )
        .route(
            "/office-distributions/reference/:reference_number",
            get(office_distributions::transaction_by_reference),
        )
        .with_permission(perm::OFFICE_DISTRIBUTIONS_VIEW);

    let distributions_create = Router::new()
        .route(
            "/office-distributions/distribute",
            post(office_distributions::distribute),
        )
        .route(
            "/office-distributions/return",
            post(office_distributions::return_to_parent),
        )
        .with_permission(perm::OFFICE_DISTRIBUTIONS_CREATE);

    // Item instances
    let instances_read = Router::new()
        .route(
            "/item-instances/barcode/:barcode",
            get(item_instances::get_by_barcode),
        )
        .route("/item-instances/:id", get(item_instances::get_instance))
        .with_permission(perm::ITEM_INSTANCES_VIEW);

    let instances_edit = Router::new()
        .route(
            "/item-instances/:id/status",
            put(item_instances::update_instance_status),
        )
        .with_permission(perm::ITEM_INSTANCES_EDIT);

    // Purchases
    let purchases_read = Router::new()
        .route("/purchases", get(purchases::list_purchases))
        .route("/purchases/:id", get(purchases::get_purchase))
        .route(
            "/purchases/:id/item-instances",
            get(purchases::purchase_item_instances),
        )
        .with_permission(perm::PURCHASES_VIEW);

    let purchases_create = Router::new()
        .route("/purchases", post(purchases::receive_purchase))
        .with_permission(perm::PURCHASES_CREATE);

    // Catalog
    let catalog_read = Router::new()
        .route("/offices", get(catalog::list_offices))
        .route("/offices/:id", get(catalog::get_office))
        .route("/items", get(catalog::list_items))
        .route("/items/:id", get(catalog::get_item))
        .with_permission(perm::CATALOG_VIEW);

    let catalog_manage = Router::new()
        .route("/offices", post(catalog::create_office))
        .route("/items", post(catalog::create_item))
        .with_permission(perm::CATALOG_MANAGE);

    Router::new()
        // Status and health endpoints
        .route("/status", get(health::api_status))
        .route("/health", get(health::health_check))
        .merge(transfers_read)
        .merge(transfers_create)
        .merge(transfers_edit)
        .merge(transfers_delete)
        .merge(transfers_approve)
        .merge(inventory_read)
        .merge(inventory_adjust)
        .merge(distributions_read)
        .merge(distributions_create)
        .merge(instances_read)
        .merge(instances_edit)
        .merge(purchases_read)
        .merge(purchases_create)
        .merge(catalog_read)
        .merge(catalog_manage)
}

/// CORS from configuration. Config validation already guarantees that
/// non-development deployments either list origins or opted into `Any`.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials)
    }
}

/// The complete HTTP application: v1 API, metrics, Swagger UI and the
/// shared middleware stack.
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs.max(1));
    let cors = cors_layer(&state.config);
    let auth = state.auth.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "office-transfer-api up" }))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        // Auth middleware finds the token service in request extensions
        .layer(Extension(auth))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}

