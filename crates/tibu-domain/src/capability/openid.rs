use async_trait::async_trait;
use serde_json::Value;

use crate::error::CollectorError;

/// Drives an external OpenID Connect / OAuth flow on behalf of a plugin.
#[async_trait]
pub trait OpenIdAuthenticator: Send + Sync {
    async fn set_configuration(&self, configuration: Value);

    async fn configuration(&self) -> Option<Value>;

    /// Suspends until the flow completes or is denied.
    async fn authenticate(&self) -> Result<(), CollectorError>;

    /// A value produced by the flow (`code`, `access_token`, ...).
    async fn parameter(&self, key: &str) -> Option<String>;
}
