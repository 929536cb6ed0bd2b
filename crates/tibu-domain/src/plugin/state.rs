use std::collections::BTreeMap;

use super::Progress;
use crate::model::{Account, LoyaltyCard, Transaction};
use crate::session::CookieJar;

/// Account metadata key remembering the title the provider last reported,
/// so a user rename survives until the provider itself renames the account.
pub const PROVIDER_TITLE_KEY: &str = "tibu:provider_title";

/// Bookkeeping shared by most plugins: persisted settings and cookies, the
/// host's previous account snapshot, progress, and results of the current
/// pass. Results stay private until [`CollectorState::finish`].
#[derive(Debug, Clone, Default)]
pub struct CollectorState {
    settings: BTreeMap<String, String>,
    cookies: CookieJar,
    previous_accounts: BTreeMap<String, Account>,
    progress: Progress,

    pending_accounts: Vec<Account>,
    pending_transactions: Vec<Transaction>,
    pending_cards: Vec<LoyaltyCard>,

    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    loyalty_cards: Vec<LoyaltyCard>,
}

impl CollectorState {
    pub fn new(
        settings: BTreeMap<String, String>,
        cookies: BTreeMap<String, String>,
        previous_accounts: Vec<Account>,
    ) -> Self {
        Self {
            settings,
            cookies: CookieJar::from_map(cookies),
            previous_accounts: previous_accounts
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
            ..Default::default()
        }
    }

    pub fn is_first_run(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// `None` removes the key.
    pub fn set_setting(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match value {
            Some(v) => {
                self.settings.insert(key, v);
            }
            None => {
                self.settings.remove(&key);
            }
        }
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn previous_account(&self, id: &str) -> Option<&Account> {
        self.previous_accounts.get(id)
    }

    /// Adds an account reported by the provider during this pass.
    ///
    /// A known account keeps its stored title unless the provider renamed
    /// it since the last pass. The provider title is recorded in metadata.
    pub fn adopt_account(&mut self, mut account: Account) {
        let provider_title = account.title.clone();

        if let Some(previous) = self.previous_accounts.get(&account.id) {
            // Without a recorded provider title the stored one is the user's.
            let renamed_by_provider = previous
                .metadata_value(PROVIDER_TITLE_KEY)
                .is_some_and(|recorded| recorded != provider_title);
            if !renamed_by_provider {
                account.title = previous.title.clone();
            }
            if account.last_operation_provider_id.is_none() {
                account.last_operation_provider_id = previous.last_operation_provider_id.clone();
            }
        }
        account.set_metadata(PROVIDER_TITLE_KEY, Some(provider_title));

        match self.pending_accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account,
            None => self.pending_accounts.push(account),
        }
    }

    /// Newest operation id already collected for the account, if any.
    pub fn cursor(&self, account_id: &str) -> Option<&str> {
        self.pending_accounts
            .iter()
            .find(|a| a.id == account_id)
            .and_then(|a| a.last_operation_provider_id.as_deref())
            .or_else(|| {
                self.previous_accounts
                    .get(account_id)
                    .and_then(|a| a.last_operation_provider_id.as_deref())
            })
    }

    /// Returns false when the account was not adopted in this pass.
    pub fn advance_cursor(&mut self, account_id: &str, operation_id: impl Into<String>) -> bool {
        match self.pending_accounts.iter_mut().find(|a| a.id == account_id) {
            Some(account) => {
                account.last_operation_provider_id = Some(operation_id.into());
                true
            }
            None => false,
        }
    }

    pub fn push_transaction(&mut self, transaction: Transaction) {
        self.pending_transactions.push(transaction);
    }

    pub fn push_loyalty_card(&mut self, card: LoyaltyCard) {
        self.pending_cards.push(card);
    }

    pub fn pending_accounts(&self) -> &[Account] {
        &self.pending_accounts
    }

    /// Publishes the current pass.
    pub fn finish(&mut self) {
        self.accounts = std::mem::take(&mut self.pending_accounts);
        self.transactions = std::mem::take(&mut self.pending_transactions);
        self.loyalty_cards = std::mem::take(&mut self.pending_cards);
        self.progress.set(Progress::MAX);
    }

    /// Drops partial results of a failed pass. Settings and cookies stay.
    pub fn discard(&mut self) {
        self.pending_accounts.clear();
        self.pending_transactions.clear();
        self.pending_cards.clear();
        self.accounts.clear();
        self.transactions.clear();
        self.loyalty_cards.clear();
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn loyalty_cards(&self) -> &[LoyaltyCard] {
        &self.loyalty_cards
    }
}
