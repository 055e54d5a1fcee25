//! Structured logging for AnonPoetry
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Output**: Human-readable console format for development
//! - **Session Context**: Tag every log line with the subject address and a session id
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use anonpoetry_logging::{LogConfig, PoetrySubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = PoetrySubscriberBuilder::new().init()?;
//!
//! // Pretty output while developing
//! let _guard = PoetrySubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! flushed.
//!
//! # Session Context
//!
//! ```ignore
//! use anonpoetry_logging::SessionContextGuard;
//!
//! let _session = SessionContextGuard::new(&client.user());
//! tracing::info!("Revealing poem"); // carries subject and session_id
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{SessionContextData, SessionContextGuard};
pub use layers::{SessionContextExtension, SessionContextLayer};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter, format};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

/// Errors setting up logging
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling appender: {0}")]
    Appender(#[from] InitError),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Builder for configuring and initializing the logging subscriber
///
/// Console output goes to stderr. By default it uses JSONL format. Use
/// [`LogConfig::development()`] for human-readable output.
#[derive(Debug, Default)]
pub struct PoetrySubscriberBuilder {
    config: LogConfig,
}

impl PoetrySubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Assemble the subscriber without installing it
    ///
    /// The guard, when present, flushes file output on drop.
    pub fn build(
        self,
    ) -> Result<(impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>), LogError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let console = &self.config.console;
        let pretty_console = (console.enabled && console.pretty).then(|| {
            fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(std::io::stderr)
        });
        let json_console = (console.enabled && !console.pretty)
            .then(|| jsonl_layer(&self.config.jsonl, std::io::stderr));

        let (file_layer, guard) = match &self.config.file {
            Some(file) => {
                let (writer, guard) = file_writer(file)?;
                (Some(jsonl_layer(&self.config.jsonl, writer)), Some(guard))
            }
            None => (None, None),
        };

        let subscriber = Registry::default()
            .with(env_filter)
            .with(SessionContextLayer::new())
            .with(pretty_console)
            .with(json_console)
            .with(file_layer);

        Ok((subscriber, guard))
    }

    /// Install the subscriber globally
    ///
    /// Fails if a global subscriber has already been set.
    pub fn init(self) -> Result<Option<WorkerGuard>, LogError> {
        let (subscriber, guard) = self.build()?;
        subscriber.try_init()?;
        Ok(guard)
    }
}

/// JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(
    config: &JsonlConfig,
    writer: W,
) -> fmt::Layer<S, format::JsonFields, format::Format<format::Json>, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
}

fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let file = File::create(config.directory.join(format!("{}.log", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<Option<WorkerGuard>, LogError> {
    PoetrySubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for tests; a second call is a no-op
pub fn init_testing() {
    let _ = PoetrySubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = PoetrySubscriberBuilder::new();
        assert_eq!(builder.config.default_level, "info");
        assert!(!builder.config.console.pretty); // JSONL by default
    }

    #[test]
    fn test_builder_with_config() {
        let builder = PoetrySubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config.default_level, "debug");
        assert!(builder.config.console.pretty);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = PoetrySubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_pretty(true);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_rolling_file_output_builds() {
        let dir = tempfile::tempdir().unwrap();
        let builder = PoetrySubscriberBuilder::new()
            .with_console(false)
            .with_file_output(FileConfig::in_dir(dir.path()).with_rotation(RotationStrategy::Hourly));

        let (_subscriber, guard) = builder.build().unwrap();
        assert!(guard.is_some());
    }

    #[test]
    fn test_init_testing_twice() {
        init_testing();
        init_testing();
    }
}
