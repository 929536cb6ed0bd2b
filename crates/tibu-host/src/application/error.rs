use tibu_domain::capability::DomainNotAllowed;
use tibu_domain::plugin::ContractVersion;
use tibu_domain::{CollectorError, ConnectionKey, DomainError, PluginId};

/// Failures of the host itself. Plugin outcomes travel as
/// [`CollectorError`] and only surface here while a step is in flight.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Collector(CollectorError),

    /// A plugin reached outside its declared domains. Never retried.
    #[error("plugin misconfigured: {0}")]
    DomainNotAllowed(DomainNotAllowed),

    #[error("Plugin not found: {0}")]
    PluginNotFound(PluginId),

    #[error("Plugin already registered: {0}")]
    DuplicatePlugin(PluginId),

    #[error("Plugin {plugin} targets contract {version}, host supports {}", ContractVersion::CURRENT)]
    UnsupportedContract {
        plugin: PluginId,
        version: ContractVersion,
    },

    #[error("A collection run is already in progress for {0}")]
    AlreadyRunning(ConnectionKey),

    #[error("Provider setup failed: {0}")]
    ProviderSetup(String),
}

impl From<CollectorError> for HostError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::DomainNotAllowed(d) => HostError::DomainNotAllowed(d),
            other => HostError::Collector(other),
        }
    }
}

impl HostError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HostError::Collector(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_not_allowed_is_lifted() {
        let err: HostError = CollectorError::DomainNotAllowed(DomainNotAllowed {
            host: "evil.example".into(),
            url: "https://evil.example/".into(),
        })
        .into();
        assert!(matches!(err, HostError::DomainNotAllowed(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_plugin_errors_are_not_fatal() {
        let err: HostError = CollectorError::access_deny("login.invalid", vec![]).into();
        assert!(!err.is_fatal());
    }
}
