use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use log::{error, info};
use std::path::PathBuf;
use tokio::task::JoinHandle;

use tibu_domain::capability::BridgeError;

use super::ChromiumHumanSimulator;

/// Find available Chromium-based browser on the system
pub(super) fn find_browser() -> Option<PathBuf> {
    let candidates = [
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/bin/brave-browser",
        "/usr/bin/microsoft-edge",
        "/snap/bin/chromium",
        "/opt/google/chrome/chrome",
    ];

    if let Some(found) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Some(found);
    }

    #[cfg(target_os = "windows")]
    {
        let local = std::env::var("LOCALAPPDATA").unwrap_or_default();
        let windows_paths = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe".to_string(),
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe".to_string(),
            format!(r"{}\Google\Chrome\Application\chrome.exe", local),
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe".to_string(),
            r"C:\Program Files\Microsoft\Edge\Application\msedge.exe".to_string(),
        ];
        if let Some(found) = windows_paths.iter().map(PathBuf::from).find(|p| p.exists()) {
            return Some(found);
        }
    }

    None
}

/// A running browser plus what is needed to tear it down.
pub(super) struct LaunchedBrowser {
    pub browser: Browser,
    pub handler_task: JoinHandle<()>,
    pub profile_dir: PathBuf,
}

impl ChromiumHumanSimulator {
    pub(super) async fn launch(&self, host: &str) -> Result<LaunchedBrowser, BridgeError> {
        // One throwaway profile per session so concurrent runs never share a lock
        let profile_dir =
            std::env::temp_dir().join(format!("chromiumoxide-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&profile_dir)
            .map_err(|e| BridgeError::Io(format!("Failed to create profile directory: {}", e)))?;

        let executable = match self.executable.clone().or_else(find_browser) {
            Some(path) => path,
            None => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                error!("[{}] No Chromium-based browser found", host);
                return Err(BridgeError::Io(
                    "No Chromium-based browser found. Install Chrome, Chromium, Brave or Edge"
                        .to_string(),
                ));
            }
        };
        info!("[{}] Using browser at: {:?}", host, executable);

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .no_sandbox()
            .user_data_dir(&profile_dir)
            .chrome_executable(&executable);

        if let Some(proxy_url) = self.proxy_url.as_deref() {
            info!("[{}] Launching browser with proxy: {}", host, proxy_url);
            builder = builder.arg(format!("--proxy-server={}", proxy_url));
        }
        if !self.headless {
            builder = builder.with_head();
        }

        let config = match builder.build() {
            Ok(config) => config,
            Err(e) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(BridgeError::Io(format!("Failed to build browser config: {}", e)));
            }
        };

        let launch = tokio::time::timeout(self.timeouts.browser_launch, Browser::launch(config)).await;
        let (browser, mut handler) = match launch {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                error!("[{}] Failed to launch browser: {}", host, e);
                return Err(BridgeError::Io(format!("Failed to launch browser: {}", e)));
            }
            Err(_) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                error!("[{}] Browser launch timed out", host);
                return Err(BridgeError::Io(format!(
                    "Browser launch timed out after {}s",
                    self.timeouts.browser_launch.as_secs()
                )));
            }
        };

        info!("[{}] Browser launched", host);

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(LaunchedBrowser {
            browser,
            handler_task,
            profile_dir,
        })
    }
}
