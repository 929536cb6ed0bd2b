use std::collections::BTreeMap;

use tibu_domain::model::{Account, LoyaltyCard, Transaction};
use tibu_domain::plugin::{
    Capabilities, FieldDescriptor, FieldValue, Lifecycle, LifecycleState, Progress,
};
use tibu_domain::{CollectorPlugin, InitContext, MessageSet, PluginManifest};

use super::error::HostError;

/// One plugin instance plus the lifecycle the host enforces around it.
///
/// Out-of-order calls fail with a lifecycle violation before reaching the
/// plugin. Results read as empty until a collect has completed.
pub struct PluginInstance {
    manifest: PluginManifest,
    plugin: Box<dyn CollectorPlugin>,
    lifecycle: Lifecycle,
}

impl PluginInstance {
    pub fn new(manifest: PluginManifest, plugin: Box<dyn CollectorPlugin>) -> Self {
        Self {
            manifest,
            plugin,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Readable before `init`.
    pub fn capabilities(&self) -> Capabilities {
        self.plugin.capabilities()
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.plugin.fields()
    }

    pub fn progress(&self) -> Progress {
        self.plugin.progress()
    }

    pub fn init(&mut self, context: InitContext) -> Result<(), HostError> {
        self.lifecycle.initialize()?;
        self.plugin.init(context);
        Ok(())
    }

    /// Redirect flow. Returns the connection title offered by the plugin.
    pub async fn init_connection(&mut self, callback_uri: &str) -> Result<Option<String>, HostError> {
        self.lifecycle.await_callback()?;
        match self.plugin.init_connection(callback_uri).await {
            Ok(title) => {
                self.lifecycle.connect()?;
                Ok(title)
            }
            Err(e) => {
                self.lifecycle.fail()?;
                Err(e.into())
            }
        }
    }

    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), HostError> {
        if self.lifecycle.state() != LifecycleState::Initialized {
            return Err(tibu_domain::DomainError::Lifecycle {
                from: self.lifecycle.state(),
                action: "set field",
            }
            .into());
        }
        self.plugin.set_field(name, value)?;
        Ok(())
    }

    pub fn field_value(&self, name: &str) -> Option<FieldValue> {
        self.plugin.field_value(name)
    }

    /// Runs the plugin's local checks. `Err(messages)` holds the blocking
    /// errors; the instance stays initialized so fields can be corrected.
    pub fn validate(&mut self) -> Result<Result<MessageSet, MessageSet>, HostError> {
        let messages = self.plugin.validate();
        match self.lifecycle.validated(&messages)? {
            Some(blocking) => Ok(Err(blocking)),
            None => Ok(Ok(messages)),
        }
    }

    pub async fn collect(&mut self) -> Result<(), HostError> {
        self.lifecycle.start_collect()?;
        match self.plugin.collect().await {
            Ok(()) => {
                self.lifecycle.complete()?;
                Ok(())
            }
            Err(e) => {
                self.lifecycle.fail()?;
                Err(e.into())
            }
        }
    }

    /// The in-flight collect was abandoned (timeout, cancellation).
    pub fn abandon(&mut self) -> Result<(), HostError> {
        self.lifecycle.fail()?;
        Ok(())
    }

    pub fn settings(&self) -> BTreeMap<String, String> {
        if !self.lifecycle.state_readable() {
            return BTreeMap::new();
        }
        self.plugin.settings()
    }

    pub fn cookies(&self) -> BTreeMap<String, String> {
        if !self.lifecycle.state_readable() {
            return BTreeMap::new();
        }
        self.plugin.cookies()
    }

    pub fn accounts(&self) -> Vec<Account> {
        if !self.lifecycle.results_readable() {
            return Vec::new();
        }
        self.plugin.accounts()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        if !self.lifecycle.results_readable() {
            return Vec::new();
        }
        self.plugin.transactions()
    }

    pub fn loyalty_cards(&self) -> Vec<LoyaltyCard> {
        if !self.lifecycle.results_readable() {
            return Vec::new();
        }
        self.plugin.loyalty_cards()
    }
}
