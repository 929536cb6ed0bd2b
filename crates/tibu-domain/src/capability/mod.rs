pub mod counterparty;
pub mod human;
pub mod internet;
pub mod openid;
pub mod otp;
pub mod pdf;

use std::sync::Arc;

pub use counterparty::{CounterpartyProvider, CounterpartyQuery};
pub use human::{HumanSession, HumanSimulatorProvider};
pub use internet::{
    BridgeError, DomainNotAllowed, DomainWhitelist, HttpRequest, HttpResponse, InternetProvider,
};
pub use openid::OpenIdAuthenticator;
pub use otp::{OtpChannel, OtpProvider, OtpRequest};
pub use pdf::PdfToolsProvider;

/// Everything a plugin may use to reach the outside world.
///
/// Built fresh by the host for each plugin instance.
#[derive(Clone)]
pub struct ProviderSet {
    pub internet: Arc<dyn InternetProvider>,
    pub counterparty: Arc<dyn CounterpartyProvider>,
    pub otp: Arc<dyn OtpProvider>,
    pub pdf_tools: Arc<dyn PdfToolsProvider>,
    pub open_id: Option<Arc<dyn OpenIdAuthenticator>>,
    pub human_simulator: Option<Arc<dyn HumanSimulatorProvider>>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("open_id", &self.open_id.is_some())
            .field("human_simulator", &self.human_simulator.is_some())
            .finish_non_exhaustive()
    }
}
