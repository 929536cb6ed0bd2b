use log::{info, warn};
use std::time::Duration;

use super::launch::LaunchedBrowser;

/// Closes the browser (bounded by `close_timeout`) and removes its profile.
pub(super) async fn cleanup_browser(launched: LaunchedBrowser, close_timeout: Duration, host: &str) {
    let LaunchedBrowser {
        mut browser,
        handler_task,
        profile_dir,
    } = launched;

    handler_task.abort();

    match tokio::time::timeout(close_timeout, browser.close()).await {
        Ok(Ok(_)) => info!("[{}] Browser closed", host),
        Ok(Err(e)) => warn!("[{}] Failed to close browser: {}, forcing cleanup", host, e),
        Err(_) => warn!("[{}] Browser close timed out, continuing with cleanup", host),
    }

    // Chrome may hold the profile lock for a moment after close
    tokio::time::sleep(Duration::from_millis(500)).await;

    if let Err(first) = std::fs::remove_dir_all(&profile_dir) {
        warn!("[{}] Profile cleanup failed: {}, retrying", host, first);
        tokio::time::sleep(Duration::from_secs(2)).await;
        if let Err(e) = std::fs::remove_dir_all(&profile_dir) {
            warn!("[{}] Profile directory left behind at {:?}: {}", host, profile_dir, e);
        }
    } else {
        info!("[{}] Cleaned up temp profile directory", host);
    }
}
