use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use tibu_domain::repository::{ConnectionState, ConnectionStateRepository};
use tibu_domain::session::CookieJar;
use tibu_domain::{
    CollectorError, ConnectionKey, DomainError, ErrorKind, InitContext, MessageSet, PluginId,
    RunId,
};
use tibu_infrastructure::config::{RetryConfig, TimeoutConfig};

use crate::application::error::HostError;
use crate::application::instance::PluginInstance;
use crate::application::providers::ProviderFactory;
use crate::application::registry::PluginRegistry;

mod boundary;
mod retry;
mod types;
mod validation;

pub use types::{CollectSummary, RunOutcome, RunReport, RunRequest};

const MIN_PROGRESS_POLL: Duration = Duration::from_millis(10);

/// Marks a connection busy for as long as it lives.
struct RunGuard {
    running: Arc<Mutex<HashSet<ConnectionKey>>>,
    key: ConnectionKey,
}

impl RunGuard {
    fn acquire(
        running: &Arc<Mutex<HashSet<ConnectionKey>>>,
        key: &ConnectionKey,
    ) -> Result<Self, HostError> {
        let mut busy = running.lock().unwrap_or_else(|e| e.into_inner());
        if !busy.insert(key.clone()) {
            return Err(HostError::AlreadyRunning(key.clone()));
        }
        Ok(Self {
            running: running.clone(),
            key: key.clone(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut busy = self.running.lock().unwrap_or_else(|e| e.into_inner());
        busy.remove(&self.key);
    }
}

/// Drives plugin instances through one collection each and owns
/// everything persisted between runs.
pub struct CollectionDriver {
    registry: Arc<PluginRegistry>,
    providers: Arc<dyn ProviderFactory>,
    repository: Arc<dyn ConnectionStateRepository>,
    timeouts: TimeoutConfig,
    retry: RetryConfig,
    running: Arc<Mutex<HashSet<ConnectionKey>>>,
}

impl CollectionDriver {
    pub fn new(
        registry: Arc<PluginRegistry>,
        providers: Arc<dyn ProviderFactory>,
        repository: Arc<dyn ConnectionStateRepository>,
    ) -> Self {
        Self {
            registry,
            providers,
            repository,
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn is_running(&self, key: &ConnectionKey) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    /// One attempt, no retry.
    #[instrument(skip(self, request), fields(plugin = %request.key.plugin_id, connection = %request.key.connection))]
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, HostError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let outcome = self.run_once(request).await?;
        Ok(RunReport {
            run_id,
            key: request.key.clone(),
            attempts: 1,
            started_at,
            finished_at: Utc::now(),
            outcome,
        })
    }

    async fn run_once(&self, request: &RunRequest) -> Result<RunOutcome, HostError> {
        // 1. Single flight per connection
        let _guard = RunGuard::acquire(&self.running, &request.key)?;
        let registration = self.registry.get(&request.key.plugin_id)?;

        // 2. Load what earlier runs left
        let mut state = self
            .repository
            .load(&request.key)
            .await?
            .unwrap_or_else(|| ConnectionState::new(request.key.clone()));

        // 3. Fresh instance with fresh providers
        let mut instance =
            PluginInstance::new(registration.manifest.clone(), registration.instantiate());
        let providers = self
            .providers
            .build(instance.manifest(), instance.capabilities())?;
        instance.init(InitContext {
            providers,
            settings: state.settings.clone(),
            cookies: state.cookies.clone(),
            previous_accounts: state.accounts.clone(),
        })?;
        info!(
            first_run = state.settings.is_empty(),
            known_accounts = state.accounts.len(),
            session_cookie = CookieJar::from_map(state.cookies.clone())
                .session_token()
                .is_some(),
            "Plugin initialized"
        );

        // 4. Redirect flow, or user input plus validation
        let mut notices = MessageSet::new();
        if let Some(callback_uri) = &request.callback_uri {
            match instance.init_connection(callback_uri).await {
                Ok(Some(label)) => state.connection_label = Some(label),
                Ok(None) => {}
                Err(e) => {
                    return self
                        .fail(&mut state, instance.settings(), instance.cookies(), e)
                        .await
                }
            }
        } else {
            let input = validation::apply_fields(&mut instance, &request.fields)?;
            if !input.passes() {
                info!(fields = ?input.fields(), "Field input rejected");
                return Ok(RunOutcome::ValidationFailed {
                    messages: input.errors().cloned().collect(),
                });
            }
            notices.extend(input);

            match instance.validate()? {
                Ok(messages) => notices.extend(messages),
                Err(blocking) => {
                    info!(fields = ?blocking.fields(), "Validation blocked the run");
                    return Ok(RunOutcome::ValidationFailed { messages: blocking });
                }
            }
        }

        // 5. Collect
        if let Err(e) = self.collect(&mut instance, request.progress.as_ref()).await {
            return self
                .fail(&mut state, instance.settings(), instance.cookies(), e)
                .await;
        }

        // 6. Host boundary, reconcile, persist
        let accounts = instance.accounts();
        let mut transactions = instance.transactions();
        let mut loyalty_cards = instance.loyalty_cards();
        if let Err(e) = boundary::check_invariants(&accounts, &transactions) {
            return self
                .fail(&mut state, instance.settings(), instance.cookies(), e.into())
                .await;
        }
        boundary::apply_limits(&mut transactions, &mut loyalty_cards);

        state.settings = instance.settings();
        state.cookies = instance.cookies();
        let mut summary = boundary::reconcile(&mut state, accounts, transactions, loyalty_cards);
        summary.notices = notices;
        summary.connection_label = state.connection_label.clone();
        self.repository.save(&state).await?;

        info!(
            accounts = summary.accounts.len(),
            new_transactions = summary.new_transactions.len(),
            updated_transactions = summary.updated_transactions.len(),
            missing_accounts = summary.missing_accounts.len(),
            "Collection completed"
        );
        Ok(RunOutcome::Collected(summary))
    }

    /// Runs `collect` under the run timeout and mirrors progress onto
    /// `progress` until it returns.
    async fn collect(
        &self,
        instance: &mut PluginInstance,
        progress: Option<&watch::Sender<u8>>,
    ) -> Result<(), HostError> {
        let reader = instance.progress();
        let publish = |value: u8| {
            if let Some(tx) = progress {
                tx.send_replace(value);
            }
        };

        let mut ticker = tokio::time::interval(self.timeouts.progress_poll.max(MIN_PROGRESS_POLL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = {
            let collect = instance.collect();
            tokio::pin!(collect);
            let watched = async {
                loop {
                    tokio::select! {
                        result = &mut collect => break result,
                        _ = ticker.tick() => publish(reader.get()),
                    }
                }
            };
            tokio::time::timeout(self.timeouts.collect_run, watched).await
        };
        publish(reader.get());

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.timeouts.collect_run.as_millis() as u64,
                    "Collect timed out"
                );
                instance.abandon()?;
                Err(CollectorError::temporary_unavailable("collect.timeout", vec![]).into())
            }
        }
    }

    /// Failure path: partial results are dropped, settings and cookies are
    /// kept so the next attempt resumes from them.
    async fn fail(
        &self,
        state: &mut ConnectionState,
        settings: BTreeMap<String, String>,
        cookies: BTreeMap<String, String>,
        error: HostError,
    ) -> Result<RunOutcome, HostError> {
        state.settings = settings;
        state.cookies = cookies;
        self.repository.save(state).await?;

        match error {
            HostError::Collector(e) => {
                let kind = e.kind().unwrap_or(ErrorKind::Collect);
                warn!(kind = ?kind, error = %e, "Collection failed");
                Ok(RunOutcome::Failed {
                    kind,
                    messages: e.messages(),
                })
            }
            other => {
                error!(error = %other, "Run aborted");
                Err(other)
            }
        }
    }

    /// Records a user edit of an account title so the next `init` sees it.
    #[instrument(skip(self), fields(plugin = %key.plugin_id, connection = %key.connection))]
    pub async fn rename_account(
        &self,
        key: &ConnectionKey,
        account_id: &str,
        title: &str,
    ) -> Result<(), HostError> {
        let _guard = RunGuard::acquire(&self.running, key)?;
        let mut state = self
            .repository
            .load(key)
            .await?
            .ok_or_else(|| DomainError::Validation(format!("Unknown connection {}", key)))?;
        state.rename_account(account_id, title)?;
        self.repository.save(&state).await?;
        info!(account_id, "Account renamed");
        Ok(())
    }

    pub async fn connection(&self, key: &ConnectionKey) -> Result<Option<ConnectionState>, HostError> {
        Ok(self.repository.load(key).await?)
    }

    pub async fn connections(&self, plugin_id: &PluginId) -> Result<Vec<ConnectionKey>, HostError> {
        self.registry.get(plugin_id)?;
        Ok(self.repository.list(plugin_id).await?)
    }

    /// Forgets everything stored for the connection.
    pub async fn delete_connection(&self, key: &ConnectionKey) -> Result<bool, HostError> {
        let _guard = RunGuard::acquire(&self.running, key)?;
        let deleted = self.repository.delete(key).await?;
        if deleted {
            info!(connection = %key, "Connection deleted");
        }
        Ok(deleted)
    }
}
