use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tibu_infrastructure::config::LogLevel;

#[derive(Debug, Parser)]
#[command(name = "tibu-host", version, about = "Runs financial data collectors")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered plugins and their fields
    Plugins,

    /// List stored connections of a plugin
    Connections { plugin: String },

    /// Collect one connection
    Run {
        plugin: String,

        #[arg(long, default_value = "default")]
        connection: String,

        /// Field value, repeatable
        #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Completes a redirect flow with this callback URI
        #[arg(long)]
        callback: Option<String>,

        /// Single attempt even on transient failures
        #[arg(long)]
        no_retry: bool,
    },

    /// Rename an account in the stored snapshot
    Rename {
        plugin: String,
        connection: String,
        account: String,
        title: String,
    },

    /// Forget everything stored for a connection
    Forget { plugin: String, connection: String },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in `{}`", raw));
    }
    Ok((name.to_string(), value.to_string()))
}
