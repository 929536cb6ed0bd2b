use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Checking,
    Savings,
    Investment,
    #[default]
    Other,
}

/// A financial account as reported by a provider.
///
/// `id` is assigned by the provider and must stay stable across runs so the
/// host can match it with its stored snapshot. `title` is user-editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub title: String,
    pub provider_name: String,
    pub account_type: AccountType,
    pub current_balance: f64,
    #[serde(default)]
    pub should_not_be_under: f64,
    #[serde(default)]
    pub must_not_be_under: f64,
    #[serde(default)]
    pub cannot_be_under: f64,
    pub last_update: Option<DateTime<Utc>>,
    /// Provider id of the newest operation already collected.
    pub last_operation_provider_id: Option<String>,
    #[serde(default)]
    pub synchronizing: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        provider_name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            provider_name: provider_name.into(),
            account_type,
            current_balance: 0.0,
            should_not_be_under: 0.0,
            must_not_be_under: 0.0,
            cannot_be_under: 0.0,
            last_update: None,
            last_operation_provider_id: None,
            synchronizing: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_balance(mut self, balance: f64, at: DateTime<Utc>) -> Self {
        self.current_balance = balance;
        self.last_update = Some(at);
        self
    }

    pub fn with_thresholds(mut self, should_not: f64, must_not: f64, cannot: f64) -> Self {
        self.should_not_be_under = should_not;
        self.must_not_be_under = must_not;
        self.cannot_be_under = cannot;
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match value {
            Some(v) => {
                self.metadata.insert(key, v);
            }
            None => {
                self.metadata.remove(&key);
            }
        }
    }

    /// Below the softest threshold.
    pub fn is_under_warning(&self) -> bool {
        self.current_balance < self.should_not_be_under
    }
}
