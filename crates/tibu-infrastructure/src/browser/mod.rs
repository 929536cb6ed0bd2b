//! Real-browser page loads for providers that fingerprint their clients.
//!
//! A Chromium-based browser is driven over CDP with a throwaway profile.
//! The cookies and headers it ends up with are handed back so the plugin
//! can continue over the regular network bridge.

mod cleanup;
mod launch;

use async_trait::async_trait;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

use tibu_domain::capability::{BridgeError, DomainWhitelist, HumanSession, HumanSimulatorProvider};

use crate::config::TimeoutConfig;
use crate::http::USER_AGENT;
use cleanup::cleanup_browser;

pub struct ChromiumHumanSimulator {
    whitelist: DomainWhitelist,
    headless: bool,
    proxy_url: Option<String>,
    executable: Option<PathBuf>,
    timeouts: TimeoutConfig,
}

impl ChromiumHumanSimulator {
    pub fn new(whitelist: DomainWhitelist, headless: bool, timeouts: TimeoutConfig) -> Self {
        Self {
            whitelist,
            headless,
            proxy_url: None,
            executable: None,
            timeouts,
        }
    }

    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy_url = proxy_url;
        self
    }

    /// Skips browser discovery.
    pub fn with_executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }

    async fn load_page(
        &self,
        launched: &launch::LaunchedBrowser,
        url: &str,
        host: &str,
    ) -> Result<HumanSession, BridgeError> {
        let page = launched
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BridgeError::Io(format!("Failed to create new page: {}", e)))?;

        page.set_user_agent(USER_AGENT)
            .await
            .map_err(|e| BridgeError::Io(format!("Failed to set user agent: {}", e)))?;

        info!("[{}] Navigating to: {}", host, url);
        page.goto(url)
            .await
            .map_err(|e| BridgeError::Io(format!("Failed to navigate: {}", e)))?;

        tokio::time::sleep(self.timeouts.page_settle).await;

        let cookies: BTreeMap<String, String> = page
            .get_cookies()
            .await
            .map_err(|e| BridgeError::Io(format!("Failed to get cookies: {}", e)))?
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect();

        info!("[{}] Retrieved {} cookies from browser", host, cookies.len());

        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert("Referer".to_string(), url.to_string());

        Ok(HumanSession { cookies, headers })
    }
}

#[async_trait]
impl HumanSimulatorProvider for ChromiumHumanSimulator {
    async fn simulate_human(&self, url: &str) -> Result<HumanSession, BridgeError> {
        let checked = self.whitelist.check(url)?;
        let host = checked.host_str().unwrap_or_default().to_string();

        let launched = self.launch(&host).await?;
        let result = self.load_page(&launched, checked.as_str(), &host).await;
        cleanup_browser(launched, self.timeouts.browser_close, &host).await;

        if let Err(e) = &result {
            warn!("[{}] Browser session failed: {}", host, e);
        }
        result
    }
}

/// Path of the browser that would be used, if any.
pub fn check_available_browser() -> Option<String> {
    launch::find_browser().map(|path| path.to_string_lossy().to_string())
}
