mod account;
mod file;
mod item;
mod location;
mod loyalty_card;
mod payment;
mod transaction;

pub use account::{Account, AccountType};
pub use file::{content_type_for, FileAttachment, FileType, MAX_FILE_SIZE};
pub use item::{Item, ProductReferenceType, QuantityUnit};
pub use location::LocationInfo;
pub use loyalty_card::{BarcodeType, LoyaltyCard};
pub use payment::{Payment, PaymentType};
pub use transaction::{Transaction, TransactionMetadataKey, TransactionType};

/// Cuts `value` to at most `max` characters (not bytes).
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

/// ISO 4217 shape check: three upper-case ASCII letters.
pub fn is_valid_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
