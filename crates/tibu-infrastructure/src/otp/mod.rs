use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use tibu_domain::capability::{OtpProvider, OtpRequest};
use tibu_domain::CollectorError;

/// A pending OTP question waiting for the user.
#[derive(Debug)]
pub struct OtpPrompt {
    pub request: OtpRequest,
    responder: oneshot::Sender<Option<String>>,
}

impl OtpPrompt {
    pub fn answer(self, code: impl Into<String>) {
        let _ = self.responder.send(Some(code.into()));
    }

    pub fn cancel(self) {
        let _ = self.responder.send(None);
    }
}

/// Publishes OTP requests on a channel and suspends the caller until the
/// prompt is answered, cancelled or times out.
pub struct ChannelOtpProvider {
    prompts: mpsc::Sender<OtpPrompt>,
    wait: Duration,
}

impl ChannelOtpProvider {
    pub fn new(prompts: mpsc::Sender<OtpPrompt>, wait: Duration) -> Self {
        Self { prompts, wait }
    }

    pub fn channel(wait: Duration) -> (Self, mpsc::Receiver<OtpPrompt>) {
        let (tx, rx) = mpsc::channel(4);
        (Self::new(tx, wait), rx)
    }
}

fn cancelled() -> CollectorError {
    CollectorError::access_deny("otp.cancelled", vec![])
}

#[async_trait]
impl OtpProvider for ChannelOtpProvider {
    async fn request_code(&self, request: &OtpRequest) -> Result<String, CollectorError> {
        let (responder, answer) = oneshot::channel();
        let prompt = OtpPrompt {
            request: request.clone(),
            responder,
        };

        info!(channel = ?request.channel, label = %request.label_key, "OTP requested");
        if self.prompts.send(prompt).await.is_err() {
            warn!("Nobody is listening for OTP prompts");
            return Err(cancelled());
        }

        match tokio::time::timeout(self.wait, answer).await {
            Ok(Ok(Some(code))) => {
                let code = code.trim().to_string();
                if code.is_empty() {
                    return Err(cancelled());
                }
                Ok(code)
            }
            Ok(Ok(None)) | Ok(Err(_)) => {
                info!("OTP cancelled");
                Err(cancelled())
            }
            Err(_) => {
                warn!(wait_secs = self.wait.as_secs(), "OTP timed out");
                Err(CollectorError::access_deny("otp.timeout", vec![]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tibu_domain::capability::OtpChannel;
    use tibu_domain::ErrorKind;

    fn request() -> OtpRequest {
        OtpRequest::new(OtpChannel::Sms, "otp.sms").with_destination("+33 6** ** ** 12")
    }

    #[tokio::test]
    async fn test_answered_prompt() {
        let (provider, mut prompts) = ChannelOtpProvider::channel(Duration::from_secs(5));
        tokio::spawn(async move {
            let prompt = prompts.recv().await.unwrap();
            assert_eq!(prompt.request.channel, OtpChannel::Sms);
            prompt.answer(" 123456\n");
        });

        assert_eq!(provider.request_code(&request()).await.unwrap(), "123456");
    }

    #[tokio::test]
    async fn test_cancelled_prompt() {
        let (provider, mut prompts) = ChannelOtpProvider::channel(Duration::from_secs(5));
        tokio::spawn(async move {
            prompts.recv().await.unwrap().cancel();
        });

        let err = provider.request_code(&request()).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AccessDeny));
        assert!(err.messages().has_key("otp.cancelled"));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cancel() {
        let (provider, prompts) = ChannelOtpProvider::channel(Duration::from_secs(5));
        drop(prompts);

        let err = provider.request_code(&request()).await.unwrap_err();
        assert!(err.messages().has_key("otp.cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let (provider, mut prompts) = ChannelOtpProvider::channel(Duration::from_secs(300));
        let holder = tokio::spawn(async move {
            // keep the prompt alive without answering
            let prompt = prompts.recv().await;
            tokio::time::sleep(Duration::from_secs(600)).await;
            drop(prompt);
        });

        let err = provider.request_code(&request()).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AccessDeny));
        assert!(err.messages().has_key("otp.timeout"));
        holder.abort();
    }
}
