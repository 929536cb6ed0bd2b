use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use tibu_domain::capability::{
    CounterpartyProvider, HumanSimulatorProvider, InternetProvider, OpenIdAuthenticator,
    ProviderSet,
};
use tibu_domain::plugin::Capabilities;
use tibu_domain::PluginManifest;
use tibu_infrastructure::browser::ChromiumHumanSimulator;
use tibu_infrastructure::config::HostConfig;
use tibu_infrastructure::http::ReqwestInternetProvider;
use tibu_infrastructure::openid::{AuthorizationPrompt, CallbackOpenIdAuthenticator};
use tibu_infrastructure::otp::{ChannelOtpProvider, OtpPrompt};
use tibu_infrastructure::pdf::PdfExtractTools;

use super::error::HostError;

/// Builds the capabilities handed to one plugin instance.
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        manifest: &PluginManifest,
        capabilities: Capabilities,
    ) -> Result<ProviderSet, HostError>;
}

/// Wires the infrastructure implementations. Every call builds new
/// providers scoped to the manifest's whitelist; only the read-only
/// counterparty directory and the prompt channels are shared.
pub struct DefaultProviderFactory {
    config: HostConfig,
    counterparty: Arc<dyn CounterpartyProvider>,
    otp_prompts: mpsc::Sender<OtpPrompt>,
    auth_prompts: mpsc::Sender<AuthorizationPrompt>,
}

impl DefaultProviderFactory {
    pub fn new(
        config: HostConfig,
        counterparty: Arc<dyn CounterpartyProvider>,
        otp_prompts: mpsc::Sender<OtpPrompt>,
        auth_prompts: mpsc::Sender<AuthorizationPrompt>,
    ) -> Self {
        Self {
            config,
            counterparty,
            otp_prompts,
            auth_prompts,
        }
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn build(
        &self,
        manifest: &PluginManifest,
        capabilities: Capabilities,
    ) -> Result<ProviderSet, HostError> {
        let whitelist = manifest.allowed_domains.clone();
        let internet: Arc<dyn InternetProvider> = Arc::new(
            ReqwestInternetProvider::new(
                whitelist.clone(),
                &self.config.timeouts,
                self.config.proxy_url.as_deref(),
            )
            .map_err(|e| HostError::ProviderSetup(e.to_string()))?,
        );

        let open_id = capabilities.open_id.then(|| {
            Arc::new(CallbackOpenIdAuthenticator::new(
                internet.clone(),
                self.auth_prompts.clone(),
                self.config.timeouts.openid_wait,
            )) as Arc<dyn OpenIdAuthenticator>
        });

        let human_simulator = capabilities.human_simulator.then(|| {
            Arc::new(
                ChromiumHumanSimulator::new(
                    whitelist,
                    self.config.headless_browser,
                    self.config.timeouts.clone(),
                )
                .with_proxy(self.config.proxy_url.clone()),
            ) as Arc<dyn HumanSimulatorProvider>
        });

        debug!(
            plugin = %manifest.id,
            open_id = open_id.is_some(),
            human_simulator = human_simulator.is_some(),
            "Providers built"
        );

        Ok(ProviderSet {
            internet,
            counterparty: self.counterparty.clone(),
            otp: Arc::new(ChannelOtpProvider::new(
                self.otp_prompts.clone(),
                self.config.timeouts.otp_wait,
            )),
            pdf_tools: Arc::new(PdfExtractTools::new()),
            open_id,
            human_simulator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tibu_domain::capability::DomainWhitelist;
    use tibu_domain::plugin::ContractVersion;
    use tibu_domain::PluginId;
    use tibu_infrastructure::counterparty::InMemoryCounterpartyDirectory;

    fn factory() -> DefaultProviderFactory {
        let (otp_tx, _) = mpsc::channel(1);
        let (auth_tx, _) = mpsc::channel(1);
        DefaultProviderFactory::new(
            HostConfig::default(),
            Arc::new(InMemoryCounterpartyDirectory::default()),
            otp_tx,
            auth_tx,
        )
    }

    fn manifest() -> PluginManifest {
        PluginManifest {
            id: PluginId::from_string("json-bank"),
            name: "JSON Bank".into(),
            version: "1.0.0".into(),
            contract_version: ContractVersion::CURRENT,
            allowed_domains: DomainWhitelist::new(["bank.example"]),
        }
    }

    #[test]
    fn test_optional_providers_follow_capabilities() {
        let factory = factory();

        let plain = factory.build(&manifest(), Capabilities::default()).unwrap();
        assert!(plain.open_id.is_none());
        assert!(plain.human_simulator.is_none());

        let full = factory
            .build(
                &manifest(),
                Capabilities {
                    open_id: true,
                    human_simulator: true,
                    ..Capabilities::default()
                },
            )
            .unwrap();
        assert!(full.open_id.is_some());
        assert!(full.human_simulator.is_some());
    }

    #[test]
    fn test_each_build_is_fresh() {
        let factory = factory();
        let a = factory.build(&manifest(), Capabilities::default()).unwrap();
        let b = factory.build(&manifest(), Capabilities::default()).unwrap();
        assert!(!Arc::ptr_eq(&a.internet, &b.internet));
        assert!(!Arc::ptr_eq(&a.otp, &b.otp));
    }

    #[test]
    fn test_bad_proxy_is_setup_error() {
        let (otp_tx, _) = mpsc::channel(1);
        let (auth_tx, _) = mpsc::channel(1);
        let config = HostConfig {
            proxy_url: Some("::nope".into()),
            ..HostConfig::default()
        };
        let factory = DefaultProviderFactory::new(
            config,
            Arc::new(InMemoryCounterpartyDirectory::default()),
            otp_tx,
            auth_tx,
        );
        assert!(matches!(
            factory.build(&manifest(), Capabilities::default()),
            Err(HostError::ProviderSetup(_))
        ));
    }
}
