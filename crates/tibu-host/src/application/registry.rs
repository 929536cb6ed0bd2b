use std::collections::BTreeMap;
use tracing::info;

use tibu_domain::plugin::ContractVersion;
use tibu_domain::{CollectorPlugin, PluginId, PluginManifest};

use super::error::HostError;

/// Builds a fresh, uninitialized plugin instance.
pub type PluginConstructor = Box<dyn Fn() -> Box<dyn CollectorPlugin> + Send + Sync>;

pub struct PluginRegistration {
    pub manifest: PluginManifest,
    constructor: PluginConstructor,
}

impl PluginRegistration {
    pub fn instantiate(&self) -> Box<dyn CollectorPlugin> {
        (self.constructor)()
    }
}

/// Known plugins by id.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<PluginId, PluginRegistration>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, manifest: PluginManifest, constructor: F) -> Result<(), HostError>
    where
        F: Fn() -> Box<dyn CollectorPlugin> + Send + Sync + 'static,
    {
        if self.plugins.contains_key(&manifest.id) {
            return Err(HostError::DuplicatePlugin(manifest.id));
        }
        if !manifest.contract_version.is_supported_by(ContractVersion::CURRENT) {
            return Err(HostError::UnsupportedContract {
                plugin: manifest.id,
                version: manifest.contract_version,
            });
        }

        info!(
            plugin = %manifest.id,
            version = %manifest.version,
            domains = ?manifest.allowed_domains.entries(),
            "Plugin registered"
        );
        self.plugins.insert(
            manifest.id.clone(),
            PluginRegistration {
                manifest,
                constructor: Box::new(constructor),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &PluginId) -> Result<&PluginRegistration, HostError> {
        self.plugins
            .get(id)
            .ok_or_else(|| HostError::PluginNotFound(id.clone()))
    }

    pub fn manifests(&self) -> impl Iterator<Item = &PluginManifest> {
        self.plugins.values().map(|r| &r.manifest)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::json_bank::JsonBankPlugin;
    use tibu_domain::capability::DomainWhitelist;

    fn manifest(id: &str, version: ContractVersion) -> PluginManifest {
        PluginManifest {
            id: PluginId::from_string(id),
            name: "Test".into(),
            version: "1.0.0".into(),
            contract_version: version,
            allowed_domains: DomainWhitelist::new(["bank.example"]),
        }
    }

    fn constructor() -> Box<dyn CollectorPlugin> {
        Box::new(JsonBankPlugin::new())
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = PluginRegistry::new();
        registry
            .register(manifest("json-bank", ContractVersion::CURRENT), constructor)
            .unwrap();

        let registration = registry.get(&PluginId::from_string("json-bank")).unwrap();
        assert_eq!(registration.manifest.name, "Test");
        assert!(!registration.instantiate().fields().is_empty());
        assert_eq!(registry.manifests().count(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = PluginRegistry::new();
        registry
            .register(manifest("json-bank", ContractVersion::CURRENT), constructor)
            .unwrap();
        let err = registry
            .register(manifest("json-bank", ContractVersion::CURRENT), constructor)
            .unwrap_err();
        assert!(matches!(err, HostError::DuplicatePlugin(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_newer_contract_rejected() {
        let mut registry = PluginRegistry::new();
        let err = registry
            .register(
                manifest("future", ContractVersion { major: 2, minor: 0 }),
                constructor,
            )
            .unwrap_err();
        assert!(matches!(err, HostError::UnsupportedContract { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_plugin() {
        let registry = PluginRegistry::new();
        assert!(matches!(
            registry.get(&PluginId::from_string("nope")),
            Err(HostError::PluginNotFound(_))
        ));
    }
}
