use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::watch;

use tibu_domain::model::{Account, LoyaltyCard, Transaction};
use tibu_domain::{ConnectionKey, ErrorKind, MessageSet, RunId};

/// One collection request for a connection.
#[derive(Debug)]
pub struct RunRequest {
    pub key: ConnectionKey,
    /// Raw user input by field name, parsed against the plugin's fields.
    pub fields: BTreeMap<String, String>,
    /// Completes a redirect flow instead of applying fields.
    pub callback_uri: Option<String>,
    /// Receives progress in percent while `collect` runs.
    pub progress: Option<watch::Sender<u8>>,
}

impl RunRequest {
    pub fn new(key: ConnectionKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
            callback_uri: None,
            progress: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn callback(mut self, uri: impl Into<String>) -> Self {
        self.callback_uri = Some(uri.into());
        self
    }

    pub fn with_progress(mut self, progress: watch::Sender<u8>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Results of a successful run, already past the host boundary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectSummary {
    pub accounts: Vec<Account>,
    /// Not stored before this run.
    pub new_transactions: Vec<Transaction>,
    /// Already stored; the provider may have changed them.
    pub updated_transactions: Vec<Transaction>,
    pub loyalty_cards: Vec<LoyaltyCard>,
    /// Known from earlier runs but not returned this time.
    pub missing_accounts: Vec<String>,
    /// Non-blocking validation messages.
    pub notices: MessageSet,
    pub connection_label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Collected(CollectSummary),
    ValidationFailed { messages: MessageSet },
    Failed { kind: ErrorKind, messages: MessageSet },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Collected(_))
    }

    /// Failed with a kind the retry policy may repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RunOutcome::Failed { kind, .. } if kind.is_retryable())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub key: ConnectionKey,
    /// 1 for a single run, more when retried.
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}
