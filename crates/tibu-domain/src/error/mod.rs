use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::counterparty::MetadataKeyError;
use crate::capability::internet::{BridgeError, DomainNotAllowed};
use crate::message::{Message, MessageSet};

/// Classification of a collection failure, driving the host retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Provider data could not be understood. Not retried.
    Collect,
    /// Credentials rejected. Never retried without new credentials.
    AccessDeny,
    /// Provider is down or in maintenance.
    TemporaryUnavailable,
    /// Network failure between host and provider.
    ConnectionFailure,
    /// A user input is wrong.
    Parameter,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TemporaryUnavailable | ErrorKind::ConnectionFailure
        )
    }
}

/// Outcome of a failed plugin operation.
///
/// Every variant carries at least one `Error` message. `DomainNotAllowed`
/// is a fatal host misconfiguration and has no [`ErrorKind`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectorError {
    #[error("collect error: {0}")]
    Collect(MessageSet),

    #[error("access denied: {0}")]
    AccessDeny(MessageSet),

    #[error("temporarily unavailable: {0}")]
    TemporaryUnavailable(MessageSet),

    #[error("connection failure: {0}")]
    ConnectionFailure(MessageSet),

    #[error("invalid parameter {field}: {messages}")]
    Parameter { field: String, messages: MessageSet },

    #[error(transparent)]
    DomainNotAllowed(DomainNotAllowed),
}

fn error_set(key: &str, args: Vec<Value>) -> MessageSet {
    MessageSet::single(Message::error(key).with_args(args))
}

impl CollectorError {
    pub fn collect(key: &str, args: Vec<Value>) -> Self {
        CollectorError::Collect(error_set(key, args))
    }

    pub fn access_deny(key: &str, args: Vec<Value>) -> Self {
        CollectorError::AccessDeny(error_set(key, args))
    }

    pub fn temporary_unavailable(key: &str, args: Vec<Value>) -> Self {
        CollectorError::TemporaryUnavailable(error_set(key, args))
    }

    pub fn connection_failure(key: &str, args: Vec<Value>) -> Self {
        CollectorError::ConnectionFailure(error_set(key, args))
    }

    pub fn parameter(field: &str, key: &str, args: Vec<Value>) -> Self {
        CollectorError::Parameter {
            field: field.to_string(),
            messages: MessageSet::single(Message::error(key).for_field(field).with_args(args)),
        }
    }

    /// `None` only for [`CollectorError::DomainNotAllowed`].
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CollectorError::Collect(_) => Some(ErrorKind::Collect),
            CollectorError::AccessDeny(_) => Some(ErrorKind::AccessDeny),
            CollectorError::TemporaryUnavailable(_) => Some(ErrorKind::TemporaryUnavailable),
            CollectorError::ConnectionFailure(_) => Some(ErrorKind::ConnectionFailure),
            CollectorError::Parameter { .. } => Some(ErrorKind::Parameter),
            CollectorError::DomainNotAllowed(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().map(|k| k.is_retryable()).unwrap_or(false)
    }

    pub fn messages(&self) -> MessageSet {
        match self {
            CollectorError::Collect(m)
            | CollectorError::AccessDeny(m)
            | CollectorError::TemporaryUnavailable(m)
            | CollectorError::ConnectionFailure(m)
            | CollectorError::Parameter { messages: m, .. } => m.clone(),
            CollectorError::DomainNotAllowed(refusal) => MessageSet::single(
                Message::error("network.domain_not_allowed").with_arg(refusal.host.clone()),
            ),
        }
    }
}

impl From<BridgeError> for CollectorError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::DomainNotAllowed(refusal) => CollectorError::DomainNotAllowed(refusal),
            BridgeError::Io(detail) => {
                CollectorError::connection_failure("network.io", vec![Value::from(detail)])
            }
            BridgeError::InvalidUrl(url) => {
                CollectorError::collect("network.invalid_url", vec![Value::from(url)])
            }
            BridgeError::FileTooLarge { size, max } => CollectorError::collect(
                "network.file_too_large",
                vec![Value::from(size), Value::from(max)],
            ),
        }
    }
}

impl From<MetadataKeyError> for CollectorError {
    fn from(e: MetadataKeyError) -> Self {
        CollectorError::collect(
            "counterparty.invalid_metadata_key",
            vec![Value::from(e.to_string())],
        )
    }
}
