use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{FileAttachment, Item, LocationInfo, Payment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Bought something, paid in another operation.
    Purchase,
    /// Money left the account to settle a purchase.
    Payment,
    Transfer,
    /// Bank-side operation (fees, interest).
    Internal,
}

impl TransactionType {
    /// Purchase pairs with Payment, Transfer with Transfer. Internal never links.
    pub fn can_link(&self, other: TransactionType) -> bool {
        matches!(
            (self, other),
            (TransactionType::Purchase, TransactionType::Payment)
                | (TransactionType::Payment, TransactionType::Purchase)
                | (TransactionType::Transfer, TransactionType::Transfer)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMetadataKey {
    Reference,
    CounterpartyIban,
    CounterpartyName,
    CounterpartyWebsite,
    CheckNumber,
}

impl TransactionMetadataKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMetadataKey::Reference => "REFERENCE",
            TransactionMetadataKey::CounterpartyIban => "COUNTERPARTY_IBAN",
            TransactionMetadataKey::CounterpartyName => "COUNTERPARTY_NAME",
            TransactionMetadataKey::CounterpartyWebsite => "COUNTERPARTY_WEBSITE",
            TransactionMetadataKey::CheckNumber => "CHECK_NUMBER",
        }
    }
}

impl std::fmt::Display for TransactionMetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operation on an account.
///
/// `label` and `details` are stored as the provider sent them. Limits are
/// applied by the host when results cross into storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique within `account_id`, stable across runs.
    pub id: String,
    pub account_id: String,
    pub transaction_type: TransactionType,
    /// Negative for debits.
    pub amount: f64,
    pub currency_code: String,
    pub date_transaction: DateTime<Utc>,
    pub date_value: Option<DateTime<Utc>>,
    pub label: String,
    pub details: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub counterparty_uuid: Option<Uuid>,
    pub location: Option<LocationInfo>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Transaction {
    pub const LABEL_MAX_LENGTH: usize = 100;
    pub const DETAILS_MAX_LENGTH: usize = 1000;

    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        transaction_type: TransactionType,
        amount: f64,
        currency_code: impl Into<String>,
        date_transaction: DateTime<Utc>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            transaction_type,
            amount,
            currency_code: currency_code.into(),
            date_transaction,
            date_value: None,
            label: label.into(),
            details: None,
            metadata: BTreeMap::new(),
            counterparty_uuid: None,
            location: None,
            payments: Vec::new(),
            files: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_value_date(mut self, date: DateTime<Utc>) -> Self {
        self.date_value = Some(date);
        self
    }

    pub fn with_counterparty(mut self, counterparty: Uuid) -> Self {
        self.counterparty_uuid = Some(counterparty);
        self
    }

    pub fn with_location(mut self, location: LocationInfo) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    /// `None` removes the key.
    pub fn set_metadata(&mut self, key: impl AsRef<str>, value: Option<String>) {
        let key = key.as_ref();
        match value {
            Some(v) => {
                self.metadata.insert(key.to_string(), v);
            }
            None => {
                self.metadata.remove(key);
            }
        }
    }

    pub fn with_metadata(mut self, key: TransactionMetadataKey, value: impl Into<String>) -> Self {
        self.set_metadata(key.as_str(), Some(value.into()));
        self
    }

    pub fn metadata_value(&self, key: impl AsRef<str>) -> Option<&str> {
        self.metadata.get(key.as_ref()).map(String::as_str)
    }

    pub fn reference(&self) -> Option<&str> {
        self.metadata_value(TransactionMetadataKey::Reference.as_str())
            .filter(|r| !r.is_empty())
    }

    /// Two operations describe the same movement: compatible types and the
    /// same non-empty reference. Accounts may differ.
    pub fn links_to(&self, other: &Transaction) -> bool {
        if !self.transaction_type.can_link(other.transaction_type) {
            return false;
        }
        match (self.reference(), other.reference()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
