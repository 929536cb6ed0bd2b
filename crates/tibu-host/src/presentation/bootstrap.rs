use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;

use tibu_infrastructure::config::HostConfig;
use tibu_infrastructure::counterparty::InMemoryCounterpartyDirectory;
use tibu_infrastructure::openid::AuthorizationPrompt;
use tibu_infrastructure::otp::OtpPrompt;
use tibu_infrastructure::persistence::JsonFileStateRepository;

use crate::application::{DefaultProviderFactory, HostError, PluginRegistry};
use crate::application::services::CollectionDriver;
use crate::plugins;

/// Everything a command needs, plus the far ends of the prompt channels.
pub struct HostContext {
    pub driver: CollectionDriver,
    pub otp_prompts: mpsc::Receiver<OtpPrompt>,
    pub auth_prompts: mpsc::Receiver<AuthorizationPrompt>,
}

pub fn build_host(config: &HostConfig) -> Result<HostContext, HostError> {
    let started_at = Instant::now();

    let mut registry = PluginRegistry::new();
    plugins::register_builtin(&mut registry)?;
    info!(
        "✓ Registered {} plugin(s) ({}ms)",
        registry.len(),
        started_at.elapsed().as_millis()
    );

    let (otp_tx, otp_prompts) = mpsc::channel(1);
    let (auth_tx, auth_prompts) = mpsc::channel(1);
    let providers = DefaultProviderFactory::new(
        config.clone(),
        Arc::new(InMemoryCounterpartyDirectory::default()),
        otp_tx,
        auth_tx,
    );

    let repository = JsonFileStateRepository::new(config.state_dir.clone());
    info!("State directory: {}", repository.root().display());

    let driver = CollectionDriver::new(
        Arc::new(registry),
        Arc::new(providers),
        Arc::new(repository),
    )
    .with_timeouts(config.timeouts.clone())
    .with_retry(config.retry.clone());

    Ok(HostContext {
        driver,
        otp_prompts,
        auth_prompts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_host_registers_builtin_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig {
            state_dir: dir.path().to_path_buf(),
            ..HostConfig::default()
        };
        let host = build_host(&config).unwrap();
        assert!(host
            .driver
            .registry()
            .manifests()
            .any(|m| m.id.as_str() == plugins::json_bank::PLUGIN_ID));
    }
}
