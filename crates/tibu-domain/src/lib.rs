// Domain layer - the collector contract
// No dependencies on infrastructure or host layers

pub mod capability;
pub mod error;
pub mod message;
pub mod model;
pub mod plugin;
pub mod repository;
pub mod session;
pub mod shared;

// Re-exports for convenience
pub use error::{CollectorError, ErrorKind};
pub use message::{Message, MessageKind, MessageSet};
pub use plugin::{CollectorPlugin, InitContext, PluginManifest};
pub use shared::{ConnectionKey, DomainError, PluginId, RunId};
