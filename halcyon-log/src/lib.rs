//! Halcyon Logging
//!
//! Installs a `tracing` subscriber configured from `HALCYON_*` environment
//! variables. Halcyon crates emit structured `tracing` events; this crate
//! decides where they go and how they look.
//!
//! # Usage
//!
//! ```no_run
//! use halcyon_log::{Format, LogConfig};
//!
//! let _guard = LogConfig::from_env()
//!     .format(Format::Pretty)
//!     .init()
//!     .expect("logging already initialized");
//!
//! tracing::info!("Negotiation tables loaded");
//! ```
//!
//! # Environment Variables
//!
//! - `HALCYON_DEBUG=1` - Lower the default level to debug
//! - `HALCYON_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `HALCYON_LOG_FORMAT=json|pretty|compact` - Set output format
//! - `HALCYON_LOG_COLOR=1|0` - Enable/disable ANSI colors
//! - `HALCYON_LOG_TARGETS=1|0` - Include event targets
//! - `HALCYON_LOG_FILE=path` - Append to a file instead of stderr
//!
//! `RUST_LOG` takes precedence over the configured level when it is set.

use once_cell::sync::OnceCell;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of events to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl Level {
    /// Get level from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Log Format and Output
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Single-line output
    Compact,
    /// One JSON object per event
    Json,
}

impl Format {
    /// Get format from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

/// Where log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stderr,
    Stdout,
    /// Append to a file, creating it if needed
    File(PathBuf),
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Cannot open log file {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

pub type Result<T> = std::result::Result<T, LogError>;

// ============================================================================
// Configuration
// ============================================================================

/// The configuration that was installed by [`LogConfig::init`].
static ACTIVE: OnceCell<LogConfig> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Destination
    pub output: Output,
    /// Whether ANSI colors are enabled
    pub color: bool,
    /// Whether to include event targets
    pub targets: bool,
    /// Explicit filter directives, overriding `level` and `RUST_LOG`
    pub env_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            output: Output::Stderr,
            color: false,
            targets: true,
            env_filter: None,
        }
    }
}

fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from `HALCYON_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = lookup("HALCYON_DEBUG").map(|v| flag(&v)).unwrap_or(false);

        let level = lookup("HALCYON_LOG_LEVEL")
            .and_then(|s| Level::from_str(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("HALCYON_LOG_FORMAT")
            .and_then(|s| Format::from_str(&s))
            .unwrap_or(Format::Json);

        // JSON output doesn't use colors
        let color = lookup("HALCYON_LOG_COLOR")
            .map(|v| flag(&v))
            .unwrap_or(format != Format::Json && lookup("NO_COLOR").is_none());

        let targets = lookup("HALCYON_LOG_TARGETS").map(|v| flag(&v)).unwrap_or(true);

        let output = lookup("HALCYON_LOG_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(|path| Output::File(PathBuf::from(path)))
            .unwrap_or(Output::Stderr);

        Self {
            debug,
            level,
            format,
            output,
            color,
            targets,
            env_filter: None,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_color(mut self, enable: bool) -> Self {
        self.color = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Enable debug mode, lowering the level to at most `debug`.
    pub fn with_debug(mut self, enable: bool) -> Self {
        self.debug = enable;
        if enable && self.level > Level::Debug {
            self.level = Level::Debug;
        }
        self
    }

    /// Use explicit filter directives such as `halcyon_core=trace,info`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Build the event filter.
    ///
    /// Explicit directives win, then `RUST_LOG`, then the configured level.
    pub fn filter(&self) -> Result<EnvFilter> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives).map_err(|e| LogError::InvalidFilter {
                filter: directives.clone(),
                reason: e.to_string(),
            }),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber.
    ///
    /// Keep the returned guard alive for as long as events should be
    /// flushed. Fails instead of panicking when a subscriber already exists.
    pub fn init(self) -> Result<WorkerGuard> {
        let filter = self.filter()?;

        let guard = match &self.output {
            Output::Stderr => {
                let (writer, guard) = tracing_appender::non_blocking(io::stderr());
                self.init_with_writer(writer, filter)?;
                guard
            }
            Output::Stdout => {
                let (writer, guard) = tracing_appender::non_blocking(io::stdout());
                self.init_with_writer(writer, filter)?;
                guard
            }
            Output::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LogError::Output {
                        path: path.display().to_string(),
                        source,
                    })?;
                let (writer, guard) = tracing_appender::non_blocking(file);
                self.init_with_writer(writer, filter)?;
                guard
            }
        };

        tracing::debug!(
            level = %self.level,
            format = ?self.format,
            output = ?self.output,
            "Logging initialized"
        );
        let _ = ACTIVE.set(self);
        Ok(guard)
    }

    fn init_with_writer<W>(&self, writer: W, filter: EnvFilter) -> Result<()>
    where
        W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let installed = match self.format {
            Format::Json => {
                let layer = fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(self.targets)
                    .with_current_span(true);

                tracing_subscriber::registry().with(filter).with(layer).try_init()
            }
            Format::Pretty => {
                let layer = fmt::layer()
                    .pretty()
                    .with_writer(writer)
                    .with_target(self.targets)
                    .with_ansi(self.color);

                tracing_subscriber::registry().with(filter).with(layer).try_init()
            }
            Format::Compact => {
                let layer = fmt::layer()
                    .compact()
                    .with_writer(writer)
                    .with_target(self.targets)
                    .with_ansi(self.color);

                tracing_subscriber::registry().with(filter).with(layer).try_init()
            }
        };

        installed.map_err(|e| LogError::AlreadyInitialized(e.to_string()))
    }
}

/// The configuration installed by a successful [`LogConfig::init`], if any.
pub fn active_config() -> Option<&'static LogConfig> {
    ACTIVE.get()
}

/// Install a subscriber configured from the environment.
pub fn init() -> Result<WorkerGuard> {
    LogConfig::from_env().init()
}

// ============================================================================
// Tests
// ============================================================================
