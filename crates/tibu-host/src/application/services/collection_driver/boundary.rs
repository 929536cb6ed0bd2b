use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use tibu_domain::model::{is_valid_currency_code, truncate_chars, Account, LoyaltyCard, Transaction};
use tibu_domain::repository::ConnectionState;
use tibu_domain::CollectorError;

use super::types::CollectSummary;

/// Checks what a plugin returned before anything is stored.
pub fn check_invariants(
    accounts: &[Account],
    transactions: &[Transaction],
) -> Result<(), CollectorError> {
    let account_ids: BTreeSet<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
    if account_ids.len() != accounts.len() {
        return Err(CollectorError::collect("collect.duplicate_account", vec![]));
    }

    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
    for transaction in transactions {
        if !account_ids.contains(transaction.account_id.as_str()) {
            return Err(CollectorError::collect(
                "collect.unknown_account",
                vec![
                    Value::from(transaction.id.clone()),
                    Value::from(transaction.account_id.clone()),
                ],
            ));
        }
        if !seen.insert((transaction.account_id.as_str(), transaction.id.as_str())) {
            return Err(CollectorError::collect(
                "collect.duplicate_transaction",
                vec![Value::from(transaction.id.clone())],
            ));
        }
        let currencies = std::iter::once(&transaction.currency_code)
            .chain(transaction.payments.iter().map(|p| &p.currency_code));
        for code in currencies {
            if !is_valid_currency_code(code) {
                return Err(CollectorError::collect(
                    "collect.invalid_currency",
                    vec![Value::from(transaction.id.clone()), Value::from(code.clone())],
                ));
            }
        }
    }
    Ok(())
}

/// Cuts free text to the stored lengths. Plugins may return longer text.
pub fn apply_limits(transactions: &mut [Transaction], cards: &mut [LoyaltyCard]) {
    for transaction in transactions.iter_mut() {
        transaction.label = truncate_chars(&transaction.label, Transaction::LABEL_MAX_LENGTH);
        if let Some(details) = &transaction.details {
            transaction.details = Some(truncate_chars(details, Transaction::DETAILS_MAX_LENGTH));
        }
    }
    for card in cards.iter_mut() {
        card.issuer = truncate_chars(&card.issuer, LoyaltyCard::ISSUER_MAX_LENGTH);
    }
}

/// Splits new from already stored transactions, reports vanished accounts
/// and folds the run into the stored state.
///
/// Accounts missing from this run stay in the snapshot.
pub fn reconcile(
    state: &mut ConnectionState,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    loyalty_cards: Vec<LoyaltyCard>,
) -> CollectSummary {
    let returned: BTreeSet<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
    let missing_accounts: Vec<String> = state
        .accounts
        .iter()
        .filter(|a| !returned.contains(a.id.as_str()))
        .map(|a| a.id.clone())
        .collect();

    let (updated_transactions, new_transactions): (Vec<_>, Vec<_>) = transactions
        .into_iter()
        .partition(|t| state.has_seen(&t.account_id, &t.id));

    for transaction in &new_transactions {
        state
            .seen_transactions
            .entry(transaction.account_id.clone())
            .or_default()
            .insert(transaction.id.clone());
    }

    let mut snapshot: BTreeMap<String, Account> = state
        .accounts
        .drain(..)
        .filter(|a| missing_accounts.contains(&a.id))
        .map(|a| (a.id.clone(), a))
        .collect();
    snapshot.extend(accounts.iter().map(|a| (a.id.clone(), a.clone())));
    state.accounts = snapshot.into_values().collect();
    state.last_run_at = Some(Utc::now());

    debug!(
        new = new_transactions.len(),
        updated = updated_transactions.len(),
        missing = missing_accounts.len(),
        "Run reconciled"
    );

    CollectSummary {
        accounts,
        new_transactions,
        updated_transactions,
        loyalty_cards,
        missing_accounts,
        ..Default::default()
    }
}
