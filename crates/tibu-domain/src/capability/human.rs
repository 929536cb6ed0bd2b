use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::internet::BridgeError;

/// What a real browser ended up with after loading a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanSession {
    pub cookies: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

#[async_trait]
pub trait HumanSimulatorProvider: Send + Sync {
    async fn simulate_human(&self, url: &str) -> Result<HumanSession, BridgeError>;
}
