use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::warn;

use anonpoetry_cli::{Action, Cli, Command, DEMO_SCRIPT, Playground};
use anonpoetry_client::ClientConfig;
use anonpoetry_core::SystemClock;
use anonpoetry_logging::PoetrySubscriberBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = PoetrySubscriberBuilder::new()
        .with_config(cli.log_config())
        .init()?;

    let config = cli.client_config().with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load config".to_string(),
    })?;

    match cli.command {
        Command::Demo => run_script(config, DEMO_SCRIPT, false).await?,

        Command::Run { script, keep_going } => {
            let source = match script {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut source = String::new();
                    tokio::io::stdin().read_to_string(&mut source).await?;
                    source
                }
            };
            run_script(config, &source, keep_going).await?;
        }

        Command::Config => print!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}

/// Execute a playground script, printing one JSON line per command
async fn run_script(config: ClientConfig, source: &str, keep_going: bool) -> anyhow::Result<()> {
    let mut playground = Playground::new(config, Arc::new(SystemClock));
    let mut failures = 0usize;

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let Some(action) = Action::parse(line).with_context(|| format!("line {}", line_no))? else {
            continue;
        };
        let command = line.trim();

        match playground.execute(action).await {
            Ok(result) => println!(
                "{}",
                json!({
                    "line": line_no,
                    "user": playground.active_user(),
                    "command": command,
                    "result": result,
                })
            ),
            Err(e) if keep_going => {
                failures += 1;
                warn!(line = line_no, error = %e, "Command failed");
                println!(
                    "{}",
                    json!({
                        "line": line_no,
                        "user": playground.active_user(),
                        "command": command,
                        "error": e.to_string(),
                    })
                );
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("line {}: {}", line_no, command)));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} command(s) failed", failures);
    }
    Ok(())
}
