/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Roles map to sets of capabilities. A role either holds a capability
 * everywhere (the global override) or only for its holder's own office.
 */

use super::permissions::{Action, Permission, Resource};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use strum::{AsRefStr, EnumString, IntoEnumIterator};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Role {
    Guest,
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Picks the most privileged recognised role out of a token's role list.
    /// Unrecognised names are ignored; no recognised role means `Guest`.
    pub fn highest<S: AsRef<str>>(names: &[S]) -> Role {
        names
            .iter()
            .filter_map(|name| Role::from_str(name.as_ref().trim()).ok())
            .max()
            .unwrap_or(Role::Guest)
    }
}

fn grants(pairs: Vec<(Resource, Vec<Action>)>) -> HashSet<Permission> {
    pairs
        .into_iter()
        .flat_map(|(resource, actions)| {
            actions
                .into_iter()
                .map(move |action| Permission::new(resource, action))
        })
        .collect()
}

lazy_static! {
    /// Capability table used when no other policy is injected.
    pub static ref DEFAULT_GRANTS: HashMap<Role, HashSet<Permission>> = {
        use Action::*;
        use Resource::*;

        let mut roles = HashMap::new();

        roles.insert(
            Role::SuperAdmin,
            Resource::iter()
                .flat_map(|r| Action::iter().map(move |a| Permission::new(r, a)))
                .collect(),
        );

        roles.insert(
            Role::Admin,
            grants(vec![
                (Transfers, vec![View, Create, Edit, Delete, Approve]),
                (OfficeInventory, vec![View, Adjust]),
                (OfficeDistributions, vec![View, Create]),
                (ItemInstances, vec![View, Edit]),
                (Purchases, vec![View, Create]),
                (Catalog, vec![View]),
            ]),
        );

        roles.insert(
            Role::User,
            grants(vec![
                (Transfers, vec![View, Create, Approve]),
                (OfficeInventory, vec![View]),
                (OfficeDistributions, vec![View]),
                (ItemInstances, vec![View]),
                (Catalog, vec![View]),
            ]),
        );

        roles.insert(Role::Guest, grants(vec![(Catalog, vec![View])]));

        roles
    };
}

/// The capability table as a value, so services can be handed a different
/// one in tests.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    grants: HashMap<Role, HashSet<Permission>>,
    global: HashSet<Role>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            grants: DEFAULT_GRANTS.clone(),
            global: [Role::SuperAdmin].into_iter().collect(),
        }
    }
}

impl AccessPolicy {
    pub fn new(grants: HashMap<Role, HashSet<Permission>>, global: HashSet<Role>) -> Self {
        Self { grants, global }
    }

    /// Whether the role's capabilities ignore office scope.
    pub fn is_global(&self, role: Role) -> bool {
        self.global.contains(&role)
    }

    /// Unscoped check: does the role hold this capability anywhere?
    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .map_or(false, |set| set.contains(&permission))
    }

    /// Scoped check. Global roles pass whenever they hold the capability;
    /// everybody else also needs to belong to the office in question.
    pub fn authorize(
        &self,
        role: Role,
        resource: Resource,
        action: Action,
        scope_office_id: i32,
        actor_office_id: Option<i32>,
    ) -> bool {
        if !self.allows(role, Permission::new(resource, action)) {
            return false;
        }
        self.is_global(role) || actor_office_id == Some(scope_office_id)
    }

    /// All capabilities of a role, formatted as `resource:action`.
    pub fn permissions_for(&self, role: Role) -> Vec<String> {
        let mut perms: Vec<String> = self
            .grants
            .get(&role)
            .map(|set| set.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default();
        perms.sort();
        perms
    }
}
