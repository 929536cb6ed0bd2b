pub mod error;
pub mod instance;
pub mod providers;
pub mod registry;
pub mod services;

#[cfg(test)]
mod test_support;

pub use error::HostError;
pub use instance::PluginInstance;
pub use providers::{DefaultProviderFactory, ProviderFactory};
pub use registry::{PluginRegistration, PluginRegistry};
