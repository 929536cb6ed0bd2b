use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plugin::LifecycleState;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from_string(s: &str) -> Self {
                Self(s.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(PluginId);
define_id!(RunId);

/// Identifies one configured connection of a plugin, i.e. one set of
/// persisted settings/cookies/accounts owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub plugin_id: PluginId,
    pub connection: String,
}

impl ConnectionKey {
    pub fn new(plugin_id: PluginId, connection: impl Into<String>) -> Self {
        Self {
            plugin_id,
            connection: connection.into(),
        }
    }
}

impl std::fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.plugin_id, self.connection)
    }
}

/// Contract misuse and host-side failures that are not plugin outcomes.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Lifecycle violation: cannot {action} while {from:?}")]
    Lifecycle {
        from: LifecycleState,
        action: &'static str,
    },

    #[error("File too large: {path} is {size} bytes (max {max})")]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    /// Whether the error comes from the caller using the contract wrongly
    /// rather than from the environment.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            DomainError::Lifecycle { .. } | DomainError::Validation(_)
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Serialization(e.to_string())
    }
}
