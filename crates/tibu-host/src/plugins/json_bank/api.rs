use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tibu_domain::capability::{HttpResponse, OtpChannel};
use tibu_domain::model::{Account, AccountType, Transaction, TransactionType};
use tibu_domain::CollectorError;

use super::PROVIDER_NAME;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct OtpChallenge {
    pub channel: OtpChannel,
    pub destination: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Present when the bank wants a second factor before `token` is usable.
    pub otp: Option<OtpChallenge>,
    pub device_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OtpVerifyRequest<'a> {
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub device_token: Option<String>,
    /// Account holder, returned by the OAuth token endpoint.
    pub holder: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CodeExchangeRequest<'a> {
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AccountList {
    pub accounts: Vec<AccountDto>,
}

#[derive(Debug, Deserialize)]
pub struct AccountDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
    pub balance: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AccountDto {
    pub fn into_account(self, now: DateTime<Utc>) -> Account {
        let account_type = match self.kind.as_str() {
            "checking" | "current" => AccountType::Checking,
            "savings" => AccountType::Savings,
            "investment" | "securities" => AccountType::Investment,
            _ => AccountType::Other,
        };
        Account::new(self.id, self.name, PROVIDER_NAME, account_type)
            .with_balance(self.balance, self.updated_at.unwrap_or(now))
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionPage {
    /// Oldest first.
    pub transactions: Vec<TransactionDto>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionDto {
    pub id: String,
    pub date: DateTime<Utc>,
    pub value_date: Option<DateTime<Utc>>,
    pub amount: f64,
    pub currency: String,
    pub label: String,
    pub details: Option<String>,
    #[serde(default)]
    pub kind: String,
}

impl TransactionDto {
    pub fn into_transaction(self, account_id: &str) -> Transaction {
        let transaction_type = match self.kind.as_str() {
            "transfer" => TransactionType::Transfer,
            "payment" | "debit" => TransactionType::Payment,
            "fee" | "interest" => TransactionType::Internal,
            _ => TransactionType::Purchase,
        };
        let mut transaction = Transaction::new(
            self.id,
            account_id,
            transaction_type,
            self.amount,
            self.currency,
            self.date,
            self.label,
        );
        if let Some(details) = self.details {
            transaction = transaction.with_details(details);
        }
        if let Some(value_date) = self.value_date {
            transaction = transaction.with_value_date(value_date);
        }
        transaction
    }
}

/// Maps the bank's status codes onto the error taxonomy.
pub fn check_status(response: &HttpResponse, step: &str) -> Result<(), CollectorError> {
    let args = || vec![Value::from(step), Value::from(response.code)];
    match response.code {
        200..=299 => Ok(()),
        401 | 403 => Err(CollectorError::access_deny(
            "json_bank.credentials_rejected",
            args(),
        )),
        408 | 429 | 500..=599 => Err(CollectorError::temporary_unavailable(
            "json_bank.unavailable",
            args(),
        )),
        _ => Err(CollectorError::collect("json_bank.unexpected_status", args())),
    }
}

pub fn parse<T: DeserializeOwned>(response: &HttpResponse, step: &str) -> Result<T, CollectorError> {
    response.json().map_err(|e| {
        CollectorError::collect(
            "json_bank.malformed_response",
            vec![Value::from(step), Value::from(e.to_string())],
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tibu_domain::ErrorKind;

    fn response(code: u16, body: &str) -> HttpResponse {
        HttpResponse {
            code,
            body: body.to_string(),
            ..HttpResponse::default()
        }
    }

    #[test]
    fn test_status_mapping() {
        let kind = |code| check_status(&response(code, ""), "accounts").unwrap_err().kind();
        assert!(check_status(&response(204, ""), "accounts").is_ok());
        assert_eq!(kind(401), Some(ErrorKind::AccessDeny));
        assert_eq!(kind(403), Some(ErrorKind::AccessDeny));
        assert_eq!(kind(429), Some(ErrorKind::TemporaryUnavailable));
        assert_eq!(kind(503), Some(ErrorKind::TemporaryUnavailable));
        assert_eq!(kind(404), Some(ErrorKind::Collect));
        assert_eq!(kind(302), Some(ErrorKind::Collect));
    }

    #[test]
    fn test_malformed_body_is_collect_error() {
        let err = parse::<AccountList>(&response(200, "<html>"), "accounts").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Collect));
        assert!(err.messages().has_key("json_bank.malformed_response"));
    }

    #[test]
    fn test_transaction_conversion() {
        let page: TransactionPage = parse(
            &response(
                200,
                r#"{"transactions":[{"id":"T1","date":"2024-03-01T10:00:00Z","amount":-12.5,
                    "currency":"EUR","label":"CB BOULANGERIE","kind":"fee","details":"Frais"}]}"#,
            ),
            "transactions",
        )
        .unwrap();
        let transaction = page.transactions.into_iter().next().unwrap().into_transaction("A1");
        assert_eq!(transaction.account_id, "A1");
        assert_eq!(transaction.transaction_type, TransactionType::Internal);
        assert_eq!(transaction.details.as_deref(), Some("Frais"));
        assert!(transaction.date_value.is_none());
    }

    #[test]
    fn test_otp_challenge_channel() {
        let login: LoginResponse = parse(
            &response(
                200,
                r#"{"token":"pending","otp":{"channel":"SMS","destination":"+33 6** ** ** 12"}}"#,
            ),
            "login",
        )
        .unwrap();
        assert_eq!(login.otp.unwrap().channel, OtpChannel::Sms);
        assert!(login.device_token.is_none());
    }
}
