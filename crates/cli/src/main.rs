use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tp_cli::cli::{Cli, Command};
use tp_cli::commands;
use tp_client::{Diagnostic, McpClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    let (file_config, config_path) = tp_cli::cli::load_config()?;
    tracing::debug!(config = %config_path, "configuration loaded");
    let config = cli.resolve(file_config)?;

    let client = McpClient::new(config)
        .with_diagnostics(|d: Diagnostic| tracing::trace!(diagnostic = ?d));
    client
        .start()
        .await
        .with_context(|| format!("starting {}", client.config().command.display()))?;

    let outcome = match &cli.command {
        Command::List { json } => commands::list(&client, *json).await.map(|()| true),
        Command::Call { tool, args, raw } => {
            commands::call(&client, tool, args.as_deref(), *raw).await
        }
        Command::Request { method, params } => commands::request(&client, method, params.as_deref())
            .await
            .map(|()| true),
    };

    client.stop().await;

    if !outcome? {
        std::process::exit(1);
    }
    Ok(())
}

/// Compact stderr-only tracing; defaults to `warn` so stdout stays clean.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
