use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Office Transfer API",
        version = "1.0.0",
        description = r#"
# Office Transfer API

Moves stock between offices with an approval workflow, and keeps the
per-office ledger, barcoded item instances and an audit trail in step.

## Authentication

Every endpoint except `/status` and `/health` needs a JWT, either in the
Authorization header or in the auth cookie:

```
Authorization: Bearer <your-jwt-token>
```

Tokens can be minted with `office-transfer-api issue-token`.

## Errors

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock: requested 15, available 10",
  "details": { "requested": 15, "available": 10 },
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints take `page` (default 1) and `limit` (default and maximum are
configured per deployment).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "distributions", description = "Transfer requests and their approval workflow"),
        (name = "office-inventory", description = "Per-office stock and manual corrections"),
        (name = "office-distributions", description = "Immediate moves along the office tree and the audit trail"),
        (name = "item-instances", description = "Barcoded units"),
        (name = "purchases", description = "Stock intake"),
        (name = "catalog", description = "Offices and items"),
        (name = "system", description = "Status and health")
    ),
    paths(
        // Transfers
        crate::handlers::distributions::list_distributions,
        crate::handlers::distributions::recent_distributions,
        crate::handlers::distributions::distributions_by_date_range,
        crate::handlers::distributions::get_distribution,
        crate::handlers::distributions::distribution_barcodes,
        crate::handlers::distributions::create_distribution,
        crate::handlers::distributions::update_distribution,
        crate::handlers::distributions::delete_distribution,
        crate::handlers::distributions::approve_distribution,
        crate::handlers::distributions::accept_distribution,
        crate::handlers::distributions::reject_distribution,
        crate::handlers::distributions::cancel_distribution,

        // Office inventory
        crate::handlers::office_inventory::my_office_inventory,
        crate::handlers::office_inventory::my_office_instances,
        crate::handlers::office_inventory::office_inventory,
        crate::handlers::office_inventory::office_instances,
        crate::handlers::office_inventory::office_item_quantity,
        crate::handlers::office_inventory::item_inventory,
        crate::handlers::office_inventory::adjust_inventory,

        // Office distributions
        crate::handlers::office_distributions::distribute,
        crate::handlers::office_distributions::return_to_parent,
        crate::handlers::office_distributions::office_transactions,
        crate::handlers::office_distributions::pending_transactions,
        crate::handlers::office_distributions::distribution_history,
        crate::handlers::office_distributions::return_history,
        crate::handlers::office_distributions::child_offices,
        crate::handlers::office_distributions::parent_office,
        crate::handlers::office_distributions::item_history,
        crate::handlers::office_distributions::transaction_by_reference,

        // Item instances
        crate::handlers::item_instances::get_by_barcode,
        crate::handlers::item_instances::get_instance,
        crate::handlers::item_instances::update_instance_status,

        // Purchases
        crate::handlers::purchases::receive_purchase,
        crate::handlers::purchases::get_purchase,
        crate::handlers::purchases::list_purchases,
        crate::handlers::purchases::purchase_item_instances,

        // Catalog
        crate::handlers::catalog::list_offices,
        crate::handlers::catalog::get_office,
        crate::handlers::catalog::create_office,
        crate::handlers::catalog::list_items,
        crate::handlers::catalog::get_item,
        crate::handlers::catalog::create_item,

        // System
        crate::handlers::health::api_status,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::services::transfers::Direction,
            crate::entities::transfer::TransferStatus,
            crate::entities::transfer::TransferType,
            crate::entities::item_instance::InstanceStatus,
            crate::entities::office_transaction::TransactionType,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
