use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::model::Account;
use crate::shared::{ConnectionKey, DomainError, PluginId};

/// Everything the host persists for one connection between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub key: ConnectionKey,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Transaction ids already stored, per account id.
    #[serde(default)]
    pub seen_transactions: BTreeMap<String, BTreeSet<String>>,
    pub connection_label: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl ConnectionState {
    pub fn new(key: ConnectionKey) -> Self {
        Self {
            key,
            settings: BTreeMap::new(),
            cookies: BTreeMap::new(),
            accounts: Vec::new(),
            seen_transactions: BTreeMap::new(),
            connection_label: None,
            last_run_at: None,
        }
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Records a user edit of an account title.
    pub fn rename_account(&mut self, account_id: &str, title: &str) -> Result<(), DomainError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::Validation(
                "Account title cannot be empty".to_string(),
            ));
        }
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| {
                DomainError::Validation(format!("Unknown account {} for {}", account_id, self.key))
            })?;
        account.title = title.to_string();
        Ok(())
    }

    pub fn has_seen(&self, account_id: &str, transaction_id: &str) -> bool {
        self.seen_transactions
            .get(account_id)
            .is_some_and(|ids| ids.contains(transaction_id))
    }
}

#[async_trait]
pub trait ConnectionStateRepository: Send + Sync {
    async fn load(&self, key: &ConnectionKey) -> Result<Option<ConnectionState>, DomainError>;

    /// Insert or replace.
    async fn save(&self, state: &ConnectionState) -> Result<(), DomainError>;

    /// Returns whether something was deleted.
    async fn delete(&self, key: &ConnectionKey) -> Result<bool, DomainError>;

    async fn list(&self, plugin_id: &PluginId) -> Result<Vec<ConnectionKey>, DomainError>;
}
