/*!
 * # Permissions Module
 *
 * Permissions are `resource:action` pairs. Route groups are gated on the
 * coarse permission; services then check it again scoped to an office.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, EnumIter, EnumString};

/// Things a capability can be granted on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Transfers,
    OfficeInventory,
    OfficeDistributions,
    ItemInstances,
    Purchases,
    Catalog,
}

/// What may be done with a resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Approve,
    Adjust,
    Manage,
}

/// A single capability, written `resource:action` on the wire and in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource.as_ref(), self.action.as_ref())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| format!("permission '{}' is not resource:action", s))?;
        let resource =
            Resource::from_str(resource).map_err(|_| format!("unknown resource '{}'", resource))?;
        let action = Action::from_str(action).map_err(|_| format!("unknown action '{}'", action))?;
        Ok(Permission::new(resource, action))
    }
}

/// Permission strings used to gate route groups
pub mod consts {
    // Transfers
    pub const TRANSFERS_VIEW: &str = "transfers:view";
    pub const TRANSFERS_CREATE: &str = "transfers:create";
    pub const TRANSFERS_EDIT: &str = "transfers:edit";
    pub const TRANSFERS_DELETE: &str = "transfers:delete";
    pub const TRANSFERS_APPROVE: &str = "transfers:approve";

    // Office inventory
    pub const OFFICE_INVENTORY_VIEW: &str = "office_inventory:view";
    pub const OFFICE_INVENTORY_ADJUST: &str = "office_inventory:adjust";

    // Parent/child distributions
    pub const OFFICE_DISTRIBUTIONS_VIEW: &str = "office_distributions:view";
    pub const OFFICE_DISTRIBUTIONS_CREATE: &str = "office_distributions:create";

    // Item instances
    pub const ITEM_INSTANCES_VIEW: &str = "item_instances:view";
    pub const ITEM_INSTANCES_EDIT: &str = "item_instances:edit";

    // Purchases
    pub const PURCHASES_VIEW: &str = "purchases:view";
    pub const PURCHASES_CREATE: &str = "purchases:create";

    // Offices and items
    pub const CATALOG_VIEW: &str = "catalog:view";
    pub const CATALOG_MANAGE: &str = "catalog:manage";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_strings_parse() {
        let perm: Permission = consts::OFFICE_INVENTORY_ADJUST.parse().unwrap();
        assert_eq!(perm, Permission::new(Resource::OfficeInventory, Action::Adjust));
        assert_eq!(perm.to_string(), consts::OFFICE_INVENTORY_ADJUST);
    }

    #[test]
    fn malformed_permissions_are_rejected() {
        assert!("transfers".parse::<Permission>().is_err());
        assert!("orders:view".parse::<Permission>().is_err());
        assert!("transfers:fly".parse::<Permission>().is_err());
    }
}
