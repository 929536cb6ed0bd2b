use anyhow::{Context, Result};
use tokio::sync::watch;

use tibu_domain::{ConnectionKey, PluginId};
use tibu_infrastructure::config::HostConfig;

use crate::application::services::{RunOutcome, RunReport, RunRequest};
use crate::application::PluginRegistry;

use super::bootstrap::build_host;
use super::cli::Command;
use super::prompts::{spawn_authorization_prompts, spawn_otp_prompts};

pub async fn execute(command: Command, config: &HostConfig) -> Result<()> {
    let host = build_host(config)?;
    match command {
        Command::Plugins => {
            print_plugins(host.driver.registry());
            Ok(())
        }
        Command::Connections { plugin } => {
            let keys = host
                .driver
                .connections(&PluginId::from_string(&plugin))
                .await?;
            for key in keys {
                println!("{}", key.connection);
            }
            Ok(())
        }
        Command::Run {
            plugin,
            connection,
            fields,
            callback,
            no_retry,
        } => {
            let otp_task = spawn_otp_prompts(host.otp_prompts);
            let auth_task = spawn_authorization_prompts(host.auth_prompts);

            let (progress_tx, mut progress_rx) = watch::channel(0u8);
            let progress_task = tokio::spawn(async move {
                while progress_rx.changed().await.is_ok() {
                    let value = *progress_rx.borrow_and_update();
                    eprintln!("progress: {}%", value);
                }
            });

            let mut request = RunRequest::new(ConnectionKey::new(
                PluginId::from_string(&plugin),
                connection,
            ))
            .with_progress(progress_tx);
            request.fields = fields.into_iter().collect();
            request.callback_uri = callback;

            let report = if no_retry {
                host.driver.run(&request).await
            } else {
                host.driver.run_with_retry(&request).await
            };
            drop(request);
            let _ = progress_task.await;
            otp_task.abort();
            auth_task.abort();

            let report = report?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to render report")?
            );
            exit_status(&report)
        }
        Command::Rename {
            plugin,
            connection,
            account,
            title,
        } => {
            let key = ConnectionKey::new(PluginId::from_string(&plugin), connection);
            host.driver.rename_account(&key, &account, &title).await?;
            println!("Renamed {} in {}", account, key);
            Ok(())
        }
        Command::Forget { plugin, connection } => {
            let key = ConnectionKey::new(PluginId::from_string(&plugin), connection);
            if host.driver.delete_connection(&key).await? {
                println!("Forgot {}", key);
            } else {
                println!("Nothing stored for {}", key);
            }
            Ok(())
        }
    }
}

fn print_plugins(registry: &PluginRegistry) {
    for manifest in registry.manifests() {
        println!(
            "{} ({}) v{} contract {}",
            manifest.id, manifest.name, manifest.version, manifest.contract_version
        );
        println!("  domains: {}", manifest.allowed_domains.entries().join(", "));
        if let Ok(registration) = registry.get(&manifest.id) {
            for field in registration.instantiate().fields() {
                let mut flags = Vec::new();
                if field.required {
                    flags.push("required");
                }
                if field.password {
                    flags.push("secret");
                }
                let fieldset = field
                    .fieldset
                    .as_deref()
                    .map(|s| format!(" [{}]", s))
                    .unwrap_or_default();
                println!(
                    "  --field {}=<{:?}>{} {}",
                    field.name,
                    field.kind,
                    fieldset,
                    flags.join(" ")
                );
            }
        }
    }
}

/// Collected runs succeed; anything else becomes a non-zero exit.
fn exit_status(report: &RunReport) -> Result<()> {
    match &report.outcome {
        RunOutcome::Collected(_) => Ok(()),
        RunOutcome::ValidationFailed { .. } => anyhow::bail!("Validation failed"),
        RunOutcome::Failed { kind, .. } => {
            anyhow::bail!("Collection failed ({:?}) after {} attempt(s)", kind, report.attempts)
        }
    }
}
