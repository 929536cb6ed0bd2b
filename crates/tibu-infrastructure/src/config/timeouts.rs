use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts used across the host. Serialized in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Single HTTP request through the network bridge
    #[serde(with = "duration_ms")]
    pub http_request: Duration,

    /// How long a plugin waits for the user to type an OTP
    #[serde(with = "duration_ms")]
    pub otp_wait: Duration,

    /// How long an OpenID flow waits for its callback
    #[serde(with = "duration_ms")]
    pub openid_wait: Duration,

    #[serde(with = "duration_ms")]
    pub browser_launch: Duration,

    #[serde(with = "duration_ms")]
    pub browser_close: Duration,

    /// Wait after navigation so scripts can set their cookies
    #[serde(with = "duration_ms")]
    pub page_settle: Duration,

    /// Whole `collect` call
    #[serde(with = "duration_ms")]
    pub collect_run: Duration,

    /// Interval at which the driver publishes progress
    #[serde(with = "duration_ms")]
    pub progress_poll: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_request: Duration::from_secs(30),
            otp_wait: Duration::from_secs(300),
            openid_wait: Duration::from_secs(600),
            browser_launch: Duration::from_secs(30),
            browser_close: Duration::from_secs(5),
            page_settle: Duration::from_secs(8),
            collect_run: Duration::from_secs(900),
            progress_poll: Duration::from_millis(250),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
