// Host layer - registry, collection driver, built-in plugins and CLI
// Depends on domain and infrastructure layers

pub mod application;
pub mod plugins;
pub mod presentation;

pub use application::services::{
    CollectSummary, CollectionDriver, RunOutcome, RunReport, RunRequest,
};
pub use application::{
    DefaultProviderFactory, HostError, PluginInstance, PluginRegistry, ProviderFactory,
};
