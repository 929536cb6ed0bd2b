use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Cash,
    Card,
    Check,
    Transfer,
    GiftCard,
    StoreCredit,
    DigitalWallet,
    Discount,
}

impl PaymentType {
    /// Cash, gift cards and store credit are not tied to a payment method.
    pub fn allows_method_reference(&self) -> bool {
        !matches!(
            self,
            PaymentType::Cash | PaymentType::GiftCard | PaymentType::StoreCredit
        )
    }
}

/// One way a transaction was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_type: PaymentType,
    pub amount: f64,
    pub currency_code: String,
    pub reference: Option<String>,
    /// e.g. the masked card number.
    pub payment_method_reference: Option<String>,
    pub provider_name: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(payment_type: PaymentType, amount: f64, currency_code: impl Into<String>) -> Self {
        Self {
            payment_type,
            amount,
            currency_code: currency_code.into(),
            reference: None,
            payment_method_reference: None,
            provider_name: None,
            payment_date: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_method_reference(
        mut self,
        method_reference: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if !self.payment_type.allows_method_reference() {
            return Err(DomainError::Validation(format!(
                "{:?} payments cannot carry a payment method reference",
                self.payment_type
            )));
        }
        self.payment_method_reference = Some(method_reference.into());
        Ok(self)
    }

    pub fn with_provider(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.payment_date = Some(date);
        self
    }
}
