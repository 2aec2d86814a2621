//! Structured logging bootstrap for Diary
//!
//! Every Diary crate logs through `tracing`. This crate decides where those
//! events go: JSON lines or human-readable text on the console, JSON lines
//! in (optionally rotating) files, or both.
//!
//! # Quick Start
//!
//! ```ignore
//! use diary_logging::{DiarySubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! DiarySubscriberBuilder::new().init();
//!
//! // Development mode with human-readable output
//! DiarySubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//!
//! // Production: keep the guard alive until exit so files get flushed
//! let _guard = DiarySubscriberBuilder::new()
//!     .with_config(LogConfig::production("/var/log/diary".into()))
//!     .init();
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured level and target filters.

pub mod config;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, FilterConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing::Dispatch;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

use layers::BoxedLayer;

/// Errors raised while setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log file appender error: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

/// Registry with the level filter applied; every output layer sits on it
type Filtered = Layered<EnvFilter, Registry>;

/// Builder for configuring and initializing the Diary logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable output during development.
pub struct DiarySubscriberBuilder {
    config: LogConfig,
    test_writer: bool,
}

impl DiarySubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
            test_writer: false,
        }
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

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Send console output through the test harness so it is captured per test
    pub fn with_test_writer(mut self) -> Self {
        self.test_writer = true;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.config.directives().join(","))?),
        }
    }

    fn console_layer(&self) -> BoxedLayer<Filtered> {
        let console = &self.config.console;
        match (console.pretty, self.test_writer) {
            (true, true) => layers::pretty_layer(console.ansi, TestWriter::new()),
            (true, false) => layers::pretty_layer(console.ansi, std::io::stdout),
            (false, true) => layers::jsonl_layer(&self.config.jsonl, TestWriter::new()),
            (false, false) => layers::jsonl_layer(&self.config.jsonl, std::io::stdout),
        }
    }

    /// Assemble the subscriber without installing it
    ///
    /// The returned guard, present when file output is configured, must be
    /// kept alive for as long as the subscriber is in use.
    pub fn build(self) -> Result<(Dispatch, Option<WorkerGuard>), LoggingError> {
        let env_filter = self.env_filter()?;

        let mut outputs: Vec<BoxedLayer<Filtered>> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            outputs.push(self.console_layer());
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(file_config)?;
            outputs.push(layers::jsonl_layer(&self.config.jsonl, writer));
            guard = Some(file_guard);
        }

        let subscriber = Registry::default().with(env_filter).with(outputs);
        Ok((Dispatch::new(subscriber), guard))
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set or the
    /// configuration cannot be applied.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let (dispatch, guard) = self.build()?;
        tracing::dispatcher::set_global_default(dispatch)?;
        Ok(guard)
    }

    /// Initialize the subscriber globally
    ///
    /// Failures are reported on stderr and logging stays disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }
}

impl Default for DiarySubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    DiarySubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, human-readable console output)
pub fn init_development() -> Option<WorkerGuard> {
    DiarySubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output, captured by the test harness)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = DiarySubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .with_test_writer()
        .try_init();
}
