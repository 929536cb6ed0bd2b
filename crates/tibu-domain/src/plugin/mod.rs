mod callback;
mod fields;
mod lifecycle;
mod progress;
mod state;


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::capability::{DomainWhitelist, ProviderSet};
use crate::error::CollectorError;
use crate::message::MessageSet;
use crate::model::{Account, LoyaltyCard, Transaction};
use crate::shared::PluginId;

pub use callback::{CallbackParams, CALLBACK_FIELD};
pub use fields::{FieldDescriptor, FieldKind, FieldValue, FormLayout};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use progress::Progress;
pub use state::{CollectorState, PROVIDER_TITLE_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractVersion {
    pub major: u16,
    pub minor: u16,
}

impl ContractVersion {
    pub const CURRENT: ContractVersion = ContractVersion { major: 1, minor: 0 };

    /// Same major, and no newer minor than the host understands.
    pub fn is_supported_by(&self, host: ContractVersion) -> bool {
        self.major == host.major && self.minor <= host.minor
    }
}

impl std::fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Optional capabilities a plugin asks the host for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Uses `init_connection` with a redirect callback.
    pub redirect_flow: bool,
    pub open_id: bool,
    pub human_simulator: bool,
    pub otp: bool,
    pub loyalty_cards: bool,
}

/// Static description of a plugin, declared at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: PluginId,
    pub name: String,
    pub version: String,
    pub contract_version: ContractVersion,
    pub allowed_domains: DomainWhitelist,
}

/// What the host hands a fresh plugin instance.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub providers: ProviderSet,
    /// Empty on the very first run.
    pub settings: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    /// Host snapshot; seeds account identity and user titles.
    pub previous_accounts: Vec<Account>,
}

/// The contract every collector implements.
///
/// The host drives one instance through `init`, then either
/// `init_connection` or field input plus `validate`, then `collect`, and
/// finally reads results and state. Only `collect` and `init_connection`
/// perform I/O.
#[async_trait]
pub trait CollectorPlugin: Send {
    /// Called exactly once, before anything else.
    fn init(&mut self, context: InitContext);

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn contract_version(&self) -> ContractVersion {
        ContractVersion::CURRENT
    }

    fn open_id_configuration(&self) -> Option<Value> {
        None
    }

    fn datadome_client_id(&self) -> Option<String> {
        None
    }

    /// Completes a redirect flow. Returns a display title for the new
    /// connection.
    async fn init_connection(
        &mut self,
        _callback_uri: &str,
    ) -> Result<Option<String>, CollectorError> {
        Ok(None)
    }

    fn fields(&self) -> Vec<FieldDescriptor>;

    fn field_value(&self, name: &str) -> Option<FieldValue>;

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), CollectorError>;

    /// Local checks only. Never touches the network.
    fn validate(&self) -> MessageSet;

    async fn collect(&mut self) -> Result<(), CollectorError>;

    /// Readable after a failed collect too.
    fn settings(&self) -> BTreeMap<String, String>;

    fn cookies(&self) -> BTreeMap<String, String>;

    fn accounts(&self) -> Vec<Account>;

    fn transactions(&self) -> Vec<Transaction>;

    fn loyalty_cards(&self) -> Vec<LoyaltyCard> {
        Vec::new()
    }

    fn progress(&self) -> Progress;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_version_support() {
        let host = ContractVersion { major: 1, minor: 2 };
        assert!(ContractVersion::CURRENT.is_supported_by(host));
        assert!(!ContractVersion { major: 1, minor: 3 }.is_supported_by(host));
        assert!(!ContractVersion { major: 2, minor: 0 }.is_supported_by(host));
        assert_eq!(ContractVersion::CURRENT.to_string(), "1.0");
    }

    #[test]
    fn test_default_capabilities_are_empty() {
        let caps = Capabilities::default();
        assert!(!caps.redirect_flow && !caps.open_id && !caps.human_simulator);
    }
}
