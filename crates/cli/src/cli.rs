use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tp_client::ClientConfig;

/// Talk to a stdio tool server from the command line.
#[derive(Debug, Parser)]
#[command(name = "toolpipe", version, about)]
pub struct Cli {
    /// Server executable (overrides `command` from the config file).
    #[arg(long, global = true)]
    pub server: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the tools the server offers.
    List {
        /// Print the full definitions as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Invoke a tool and print its result.
    Call {
        /// Tool name, e.g. `system_get_info`.
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long)]
        args: Option<String>,
        /// Print the whole response envelope instead of the content.
        #[arg(long)]
        raw: bool,
    },
    /// Send an arbitrary JSON-RPC request and print the response.
    Request {
        method: String,
        /// Request params as JSON.
        #[arg(long)]
        params: Option<String>,
    },
}

/// Load the config named by `TOOLPIPE_CONFIG` (default `toolpipe.toml`).
/// A missing file is not an error.
pub fn load_config() -> anyhow::Result<(ClientConfig, String)> {
    let config_path = std::env::var("TOOLPIPE_CONFIG").unwrap_or_else(|_| "toolpipe.toml".into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &Path) -> anyhow::Result<ClientConfig> {
    if path.exists() {
        ClientConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(ClientConfig::new(PathBuf::new()))
    }
}

impl Cli {
    /// Apply command-line overrides on top of the file config.
    pub fn resolve(&self, mut config: ClientConfig) -> anyhow::Result<ClientConfig> {
        if let Some(server) = &self.server {
            config.command = server.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(ms));
        }
        if config.command.as_os_str().is_empty() {
            anyhow::bail!(
                "no server configured: pass --server or set `command` in the config file"
            );
        }
        Ok(config)
    }
}

/// Parse an optional JSON argument string.
pub fn parse_json_arg(flag: &str, raw: Option<&str>) -> anyhow::Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(s).with_context(|| format!("--{flag} is not valid JSON")))
        .transpose()
}
