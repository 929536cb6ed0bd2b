use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use tibu_domain::capability::counterparty::MetadataKeyError;
use tibu_domain::capability::{
    BridgeError, CounterpartyProvider, HttpRequest, HttpResponse, InternetProvider, OtpProvider,
    OtpRequest, PdfToolsProvider, ProviderSet,
};
use tibu_domain::model::{Account, AccountType, Transaction, TransactionType};
use tibu_domain::plugin::{CollectorState, FieldDescriptor, FieldValue, Progress};
use tibu_domain::capability::DomainWhitelist;
use tibu_domain::plugin::{Capabilities, ContractVersion};
use tibu_domain::{
    CollectorError, CollectorPlugin, InitContext, Message, MessageSet, PluginId, PluginManifest,
};

use super::error::HostError;
use super::providers::ProviderFactory;

/// Capabilities that never reach anything.
pub struct Offline;

#[async_trait]
impl InternetProvider for Offline {
    async fn get(&self, _request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        Err(BridgeError::Io("offline".into()))
    }

    async fn post(&self, _request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        Err(BridgeError::Io("offline".into()))
    }

    async fn download_file(
        &self,
        _request: HttpRequest,
        _expected_content_type: Option<String>,
    ) -> Result<HttpResponse, BridgeError> {
        Err(BridgeError::Io("offline".into()))
    }
}

#[async_trait]
impl CounterpartyProvider for Offline {
    async fn search(&self, _query: &str) -> Option<Uuid> {
        None
    }

    async fn find(&self, _key: &str, _value: &str) -> Result<Option<Uuid>, MetadataKeyError> {
        Ok(None)
    }

    async fn find_numeric(&self, _key: &str, _value: f64) -> Result<Option<Uuid>, MetadataKeyError> {
        Ok(None)
    }
}

#[async_trait]
impl OtpProvider for Offline {
    async fn request_code(&self, _request: &OtpRequest) -> Result<String, CollectorError> {
        Err(CollectorError::access_deny("otp.cancelled", vec![]))
    }
}

#[async_trait]
impl PdfToolsProvider for Offline {
    async fn extract_text(&self, _path: &Path) -> std::io::Result<String> {
        Ok(String::new())
    }
}

pub fn offline_providers() -> ProviderSet {
    let offline = Arc::new(Offline);
    ProviderSet {
        internet: offline.clone(),
        counterparty: offline.clone(),
        otp: offline.clone(),
        pdf_tools: offline,
        open_id: None,
        human_simulator: None,
    }
}

pub struct OfflineFactory;

impl ProviderFactory for OfflineFactory {
    fn build(
        &self,
        _manifest: &PluginManifest,
        _capabilities: Capabilities,
    ) -> Result<ProviderSet, HostError> {
        Ok(offline_providers())
    }
}

pub fn stub_manifest(id: &str) -> PluginManifest {
    PluginManifest {
        id: PluginId::from_string(id),
        name: "Stub".into(),
        version: "0.1.0".into(),
        contract_version: ContractVersion::CURRENT,
        allowed_domains: DomainWhitelist::default(),
    }
}

/// What the stub's `collect` does.
#[derive(Clone)]
pub enum Script {
    Collect {
        accounts: Vec<Account>,
        transactions: Vec<Transaction>,
    },
    Fail(CollectorError),
    /// Never returns.
    Hang,
}

/// In-memory plugin with one required `code` field. Collect writes the
/// `code` value into its settings, then plays its script.
pub struct StubPlugin {
    script: Script,
    state: CollectorState,
    code: Option<String>,
    warn_on_validate: bool,
}

impl StubPlugin {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            state: CollectorState::default(),
            code: None,
            warn_on_validate: false,
        }
    }

    pub fn with_validation_warning(mut self) -> Self {
        self.warn_on_validate = true;
        self
    }

    pub fn one_account() -> Script {
        Script::Collect {
            accounts: vec![Account::new("A1", "CHECKING 001", "Stub", AccountType::Checking)],
            transactions: vec![Transaction::new(
                "T1",
                "A1",
                TransactionType::Purchase,
                -4.2,
                "EUR",
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                "Bakery",
            )],
        }
    }
}

#[async_trait]
impl CollectorPlugin for StubPlugin {
    fn init(&mut self, context: InitContext) {
        self.state = CollectorState::new(
            context.settings,
            context.cookies,
            context.previous_accounts,
        );
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::text("code")]
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "code" => self.code.clone().map(FieldValue::Text),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), CollectorError> {
        match (name, value) {
            ("code", FieldValue::Text(code)) => {
                self.code = Some(code);
                Ok(())
            }
            _ => Err(CollectorError::parameter(name, "field.unknown", vec![])),
        }
    }

    fn validate(&self) -> MessageSet {
        let mut messages = MessageSet::new();
        if self.code.is_none() && self.state.setting("code").is_none() {
            messages.push(Message::error("field.required").for_field("code"));
        }
        if self.warn_on_validate {
            messages.push(Message::warn("stub.slow_provider"));
        }
        messages
    }

    async fn collect(&mut self) -> Result<(), CollectorError> {
        if let Some(code) = self.code.clone() {
            self.state.set_setting("code", Some(code));
        }
        self.state.cookies_mut().set("sid", "stub-session");
        match self.script.clone() {
            Script::Collect {
                accounts,
                transactions,
            } => {
                for account in accounts {
                    self.state.adopt_account(account);
                }
                for transaction in transactions {
                    self.state.push_transaction(transaction);
                }
                self.state.finish();
                Ok(())
            }
            Script::Fail(e) => {
                self.state.discard();
                Err(e)
            }
            Script::Hang => {
                self.state.progress().set(30);
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    fn settings(&self) -> BTreeMap<String, String> {
        self.state.settings().clone()
    }

    fn cookies(&self) -> BTreeMap<String, String> {
        self.state.cookies().to_request_cookies()
    }

    fn accounts(&self) -> Vec<Account> {
        self.state.accounts().to_vec()
    }

    fn transactions(&self) -> Vec<Transaction> {
        self.state.transactions().to_vec()
    }

    fn progress(&self) -> Progress {
        self.state.progress()
    }
}
