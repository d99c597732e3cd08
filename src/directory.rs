//! Read access to the account directory owned by the surrounding dashboard.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::UserId;

/// What the ledger needs to know about an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affiliate {
    pub name: String,
    pub email: Option<String>,
    /// Only approved affiliates may request payouts.
    pub approved: bool,
}

/// Lookup of account identity, role and contact data.
pub trait Directory: Send + Sync {
    fn affiliate(&self, user_id: UserId) -> Option<Affiliate>;

    fn display_name(&self, user_id: UserId) -> Option<String> {
        self.affiliate(user_id).map(|a| a.name)
    }
}

/// In-process directory, used by the replay binary and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    accounts: RwLock<HashMap<UserId, Affiliate>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: UserId, affiliate: Affiliate) {
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        accounts.insert(user_id, affiliate);
    }

    /// Register an approved account with no email.
    pub fn register_approved(&self, user_id: UserId, name: impl Into<String>) {
        self.register(
            user_id,
            Affiliate {
                name: name.into(),
                email: None,
                approved: true,
            },
        );
    }
}

impl Directory for MemoryDirectory {
    fn affiliate(&self, user_id: UserId) -> Option<Affiliate> {
        let accounts = self
            .accounts
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        accounts.get(&user_id).cloned()
    }
}
