//! Domain services.
//!
//! `ledger`, `item_instances` and `audit` are building blocks that take any
//! connection, so the workflow services (`transfers`,
//! `office_distribution`, `purchases`, `office_inventory`) can compose
//! them inside one database transaction.

pub mod audit;
pub mod catalog;
pub mod item_instances;
pub mod ledger;
pub mod office_distribution;
pub mod office_inventory;
pub mod purchases;
pub mod transfers;

use crate::auth::{AccessPolicy, Action, Actor, Resource};
use crate::errors::ServiceError;
use chrono::Utc;
use uuid::Uuid;

/// Human-readable reference such as `DIST-20240501093015-3fa2c1d9`.
pub fn reference_number(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

/// Fails with the generic denial unless the actor may perform `action` on
/// `resource` for `office_id`.
pub(crate) fn require(
    policy: &AccessPolicy,
    actor: &Actor,
    resource: Resource,
    action: Action,
    office_id: i32,
) -> Result<(), ServiceError> {
    if policy.permits(actor, resource, action, office_id) {
        Ok(())
    } else {
        Err(ServiceError::access_denied())
    }
}

/// What a caller learns about a record it cannot find. Scoped actors get the
/// same denial they would get for somebody else's record.
pub(crate) fn missing(policy: &AccessPolicy, actor: &Actor, what: String) -> ServiceError {
    if policy.overrides_scope(actor) {
        ServiceError::NotFound(what)
    } else {
        ServiceError::access_denied()
    }
}

/// Zero-based page index for a 1-based page number.
pub(crate) fn page_index(page: u64) -> u64 {
    page.max(1) - 1
}
