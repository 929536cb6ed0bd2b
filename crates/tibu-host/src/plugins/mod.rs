pub mod json_bank;

use crate::application::{HostError, PluginRegistry};
use tibu_domain::CollectorPlugin;

/// Registers the collectors shipped with the host.
pub fn register_builtin(registry: &mut PluginRegistry) -> Result<(), HostError> {
    registry.register(json_bank::manifest(), || {
        Box::new(json_bank::JsonBankPlugin::new()) as Box<dyn CollectorPlugin>
    })?;
    Ok(())
}
