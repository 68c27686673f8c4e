//! Logging setup for Folio binaries and tests.
//!
//! One builder, three sinks:
//!
//! - **Console**: compact, pretty or JSON lines on stderr (stdout stays free
//!   for command output)
//! - **File**: JSON lines through `tracing-appender`, rotated daily or hourly
//! - **Filter**: `RUST_LOG` when set, otherwise the configured level plus
//!   per-target overrides
//!
//! ```ignore
//! use folio_logging::{FolioSubscriberBuilder, LogConfig};
//!
//! let _guard = FolioSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```

pub mod config;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("A global subscriber is already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Subscriber produced by [`FolioSubscriberBuilder::build`].
pub type FolioSubscriber = Layered<EnvFilter, Layered<Vec<BoxedLayer>, Registry>>;

/// Builder for the Folio tracing subscriber.
pub struct FolioSubscriberBuilder {
    config: LogConfig,
    use_env: bool,
}

impl FolioSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
            use_env: true,
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Ignore `RUST_LOG` and use only the configured levels.
    pub fn ignore_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LogError> {
        if self.use_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        EnvFilter::try_new(self.config.directives().join(","))
            .map_err(|e| LogError::Filter(e.to_string()))
    }

    fn console_layer(&self) -> Result<Option<BoxedLayer>, LogError> {
        let console = &self.config.console;
        if !console.enabled {
            return Ok(None);
        }
        let level = match &console.level {
            Some(level) => level
                .parse::<LevelFilter>()
                .map_err(|e| LogError::Filter(format!("{level}: {e}")))?,
            None => LevelFilter::TRACE,
        };

        let base = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(console.ansi)
            .with_target(true);
        let layer = match console.format {
            ConsoleFormat::Compact => base.compact().with_filter(level).boxed(),
            ConsoleFormat::Pretty => base.pretty().with_filter(level).boxed(),
            ConsoleFormat::Json => base
                .json()
                .with_current_span(true)
                .flatten_event(true)
                .with_filter(level)
                .boxed(),
        };
        Ok(Some(layer))
    }

    fn file_layer(&self) -> Result<Option<(BoxedLayer, WorkerGuard)>, LogError> {
        let Some(file_config) = &self.config.file else {
            return Ok(None);
        };
        let (writer, guard) = file_writer(file_config)?;
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .flatten_event(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed();
        Ok(Some((layer, guard)))
    }

    /// Build the subscriber without installing it.
    ///
    /// The guard, when present, flushes the file writer on drop and must be
    /// kept alive as long as logging is needed.
    pub fn build(self) -> Result<(FolioSubscriber, Option<WorkerGuard>), LogError> {
        let filter = self.env_filter()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if let Some(console) = self.console_layer()? {
            layers.push(console);
        }
        let guard = match self.file_layer()? {
            Some((layer, guard)) => {
                layers.push(layer);
                Some(guard)
            }
            None => None,
        };

        Ok((Registry::default().with(layers).with(filter), guard))
    }

    /// Install the subscriber globally.
    pub fn init(self) -> Result<Option<WorkerGuard>, LogError> {
        let (subscriber, guard) = self.build()?;
        subscriber.try_init()?;
        Ok(guard)
    }
}

impl Default for FolioSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)?;
    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("log");
    if let Some(max) = config.max_files {
        builder = builder.max_log_files(max);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the testing preset, ignoring an already-set subscriber.
pub fn init_testing() {
    let _ = FolioSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
