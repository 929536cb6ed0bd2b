use chrono::Utc;
use tracing::{info, instrument};

use tibu_domain::RunId;

use super::{CollectionDriver, RunReport, RunRequest};
use crate::application::error::HostError;

impl CollectionDriver {
    /// Repeats runs that failed for a transient reason, with exponential
    /// backoff. Each attempt is a fresh instance seeded with what the
    /// previous one persisted.
    ///
    /// Redirect-flow requests run once: authorization codes are single use.
    #[instrument(skip(self, request), fields(plugin = %request.key.plugin_id, connection = %request.key.connection))]
    pub async fn run_with_retry(&self, request: &RunRequest) -> Result<RunReport, HostError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let max_retries = if request.callback_uri.is_some() {
            0
        } else {
            self.retry.max_retries
        };

        let mut attempt = 1;
        loop {
            let outcome = self.run_once(request).await?;
            if !outcome.is_retryable() || attempt > max_retries {
                return Ok(RunReport {
                    run_id,
                    key: request.key.clone(),
                    attempts: attempt,
                    started_at,
                    finished_at: Utc::now(),
                    outcome,
                });
            }

            let delay = self.retry.backoff(attempt);
            info!(
                "Retrying collection (attempt {}/{}), waiting {}ms...",
                attempt + 1,
                max_retries + 1,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
