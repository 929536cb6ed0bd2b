use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpChannel {
    Sms,
    Email,
    App,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRequest {
    pub channel: OtpChannel,
    /// Masked phone number or e-mail shown to the user.
    pub destination: Option<String>,
    pub label_key: String,
}

impl OtpRequest {
    pub fn new(channel: OtpChannel, label_key: impl Into<String>) -> Self {
        Self {
            channel,
            destination: None,
            label_key: label_key.into(),
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Asks the end user for a one-time code. The call suspends the collecting
/// task until the host answers.
#[async_trait]
pub trait OtpProvider: Send + Sync {
    async fn request_code(&self, request: &OtpRequest) -> Result<String, CollectorError>;
}
