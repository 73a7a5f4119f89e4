pub mod catalog;
pub mod common;
pub mod distributions;
pub mod health;
pub mod item_instances;
pub mod office_distributions;
pub mod office_inventory;
pub mod purchases;

use crate::{
    auth::AccessPolicy,
    db::{ContentionRetry, DbPool},
    events::EventSender,
    services::{
        catalog::CatalogService, item_instances::ItemInstanceService,
        office_distribution::OfficeDistributionService, office_inventory::OfficeInventoryService,
        purchases::PurchaseService, transfers::TransferService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub transfers: Arc<TransferService>,
    pub office_inventory: Arc<OfficeInventoryService>,
    pub office_distribution: Arc<OfficeDistributionService>,
    pub item_instances: Arc<ItemInstanceService>,
    pub purchases: Arc<PurchaseService>,
    pub catalog: Arc<CatalogService>,
}

impl AppServices {
    /// Wires every service to the same pool, policy and event channel.
    pub fn new(
        db_pool: Arc<DbPool>,
        policy: Arc<AccessPolicy>,
        event_sender: Arc<EventSender>,
        retry: ContentionRetry,
    ) -> Self {
        Self {
            transfers: Arc::new(TransferService::new(
                db_pool.clone(),
                policy.clone(),
                event_sender.clone(),
                retry,
            )),
            office_inventory: Arc::new(OfficeInventoryService::new(
                db_pool.clone(),
                policy.clone(),
                event_sender.clone(),
                retry,
            )),
            office_distribution: Arc::new(OfficeDistributionService::new(
                db_pool.clone(),
                policy.clone(),
                event_sender.clone(),
                retry,
            )),
            item_instances: Arc::new(ItemInstanceService::new(
                db_pool.clone(),
                policy.clone(),
                event_sender.clone(),
                retry,
            )),
            purchases: Arc::new(PurchaseService::new(
                db_pool.clone(),
                policy.clone(),
                event_sender,
                retry,
            )),
            catalog: Arc::new(CatalogService::new(db_pool, policy)),
        }
    }
}
