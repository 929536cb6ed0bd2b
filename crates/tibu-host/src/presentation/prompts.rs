use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use tibu_domain::capability::{OtpChannel, OtpRequest};
use tibu_infrastructure::openid::AuthorizationPrompt;
use tibu_infrastructure::otp::OtpPrompt;

/// Asks on the terminal and reads one line from stdin.
async fn ask(question: String) -> io::Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut stdout = io::stdout();
        write!(stdout, "{}: ", question)?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .map_err(io::Error::other)?
}

pub fn otp_question(request: &OtpRequest) -> String {
    let via = match request.channel {
        OtpChannel::Sms => "SMS",
        OtpChannel::Email => "e-mail",
        OtpChannel::App => "authenticator app",
        OtpChannel::Other => "another channel",
    };
    match &request.destination {
        Some(destination) => format!("Code sent by {} to {}", via, destination),
        None => format!("Code sent by {}", via),
    }
}

/// Answers plugin OTP requests from stdin until the channel closes.
pub fn spawn_otp_prompts(mut prompts: mpsc::Receiver<OtpPrompt>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(prompt) = prompts.recv().await {
            match ask(otp_question(&prompt.request)).await {
                Ok(code) => prompt.answer(code),
                Err(e) => {
                    warn!(error = %e, "Could not read OTP from stdin");
                    prompt.cancel();
                }
            }
        }
    })
}

/// Shows authorization URLs and reads back the callback URI the browser
/// landed on.
pub fn spawn_authorization_prompts(
    mut prompts: mpsc::Receiver<AuthorizationPrompt>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(prompt) = prompts.recv().await {
            println!("Open this URL to authorize access:\n  {}", prompt.authorization_url);
            match ask("Paste the URL you were redirected to".to_string()).await {
                Ok(uri) if !uri.is_empty() => prompt.complete(uri),
                Ok(_) => prompt.cancel(),
                Err(e) => {
                    warn!(error = %e, "Could not read callback from stdin");
                    prompt.cancel();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_question() {
        let request = OtpRequest::new(OtpChannel::Sms, "json_bank.otp_label")
            .with_destination("+33 6** ** ** 12");
        assert_eq!(otp_question(&request), "Code sent by SMS to +33 6** ** ** 12");
        assert_eq!(
            otp_question(&OtpRequest::new(OtpChannel::App, "x")),
            "Code sent by authenticator app"
        );
    }
}
