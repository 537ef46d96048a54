// crates/ytx-core/src/roles.rs
//
// Capability tables mapping addresses to protocol roles.
//
// Administrative rights and fee exemptions are granted per address instead of
// being hard-coded, so deployments and tests can substitute any participant.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::address::Address;
use crate::error::{YtxError, YtxResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May create blueprints and change operational parameters.
    Administrator,
    /// Transfers to or from this address are not charged a fee.
    FeeExempt,
}

/// A set of role grants keyed by address.
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    grants: HashMap<Address, BTreeSet<Role>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `role` to `account`. Returns `false` if it was already held.
    pub fn grant(&mut self, account: Address, role: Role) -> bool {
        self.grants.entry(account).or_default().insert(role)
    }

    /// Revoke `role` from `account`. Returns `false` if it was not held.
    pub fn revoke(&mut self, account: &Address, role: Role) -> bool {
        let Some(roles) = self.grants.get_mut(account) else {
            return false;
        };
        let removed = roles.remove(&role);
        if roles.is_empty() {
            self.grants.remove(account);
        }
        removed
    }

    pub fn has(&self, account: &Address, role: Role) -> bool {
        self.grants
            .get(account)
            .is_some_and(|roles| roles.contains(&role))
    }

    /// Fail with `Unauthorized` unless `account` holds `role`.
    pub fn require(&self, account: &Address, role: Role, action: &'static str) -> YtxResult<()> {
        if self.has(account, role) {
            Ok(())
        } else {
            Err(YtxError::Unauthorized {
                caller: *account,
                action,
            })
        }
    }

    /// All addresses holding `role`, sorted.
    pub fn holders(&self, role: Role) -> Vec<Address> {
        let mut holders: Vec<Address> = self
            .grants
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(account, _)| *account)
            .collect();
        holders.sort();
        holders
    }
}
