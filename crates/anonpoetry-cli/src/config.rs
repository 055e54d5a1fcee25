use std::path::PathBuf;

use anonpoetry_client::{ClientConfig, ConfigError};
use anonpoetry_logging::{ConsoleConfig, FileConfig, LogConfig};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "anonpoetry",
    version,
    about = "Publish, like and reveal private poems on an in-memory confidential ledger"
)]
pub struct Cli {
    /// Client configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a built-in scenario with several users
    Demo,
    /// Run playground commands from a file, or stdin when omitted
    Run {
        /// Script path
        script: Option<PathBuf>,
        /// Keep going after a failed command
        #[arg(long)]
        keep_going: bool,
    },
    /// Print the effective client configuration
    Config,
}

impl Cli {
    /// Client configuration from `--config`, or the defaults
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        match &self.config {
            Some(path) => ClientConfig::from_file(path),
            None => Ok(ClientConfig::default()),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            default_level: self.log_level.clone(),
            console: ConsoleConfig {
                pretty: self.log_format == LogFormat::Pretty,
                ansi: self.log_format == LogFormat::Pretty,
                ..ConsoleConfig::default()
            },
            file: self.log_dir.clone().map(FileConfig::in_dir),
            ..LogConfig::default()
        }
    }
}
