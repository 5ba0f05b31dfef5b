//! Manager Configuration
//!
//! ```toml
//! [execution]
//! mode = "pooled"              # "inline" or "pooled"
//! worker_threads = 4           # pooled only
//!
//! [scheduling]
//! real_time_granularity = 0.0  # seconds, 0 disables rounding
//! logical_time_granularity = 0.0
//! logical_time_scale = 1.0     # logical seconds per real second inside run(), 0 = host-driven only
//! max_idle_sleep_ms = 1        # cap on the wait between loop iterations
//!
//! [logging]
//! sink = "file"                # "tracing" or "file"
//! directory = "logs"
//! service_name = "vproc"
//! delete_existing = false
//! ```
//!
//! Every section is optional. [`ManagerConfig::load`] layers a file under
//! `VPROC_`-prefixed environment variables, e.g.
//! `VPROC_EXECUTION__WORKER_THREADS=8`.

use crate::error::{ConcurrencyError, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// How actor service calls are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// On the manager thread, in scheduler order
    #[default]
    Inline,
    /// On a tokio worker pool
    Pooled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub worker_threads: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Inline,
            worker_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub real_time_granularity: f64,
    pub logical_time_granularity: f64,
    /// Logical seconds advanced per real second while `run` drives the
    /// loop. Zero leaves logical time entirely to the host.
    pub logical_time_scale: f64,
    pub max_idle_sleep_ms: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            real_time_granularity: 0.0,
            logical_time_granularity: 0.0,
            logical_time_scale: 1.0,
            max_idle_sleep_ms: 1,
        }
    }
}

/// Destination of logging-actor output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSinkKind {
    /// Re-emit as `tracing` events
    #[default]
    Tracing,
    /// One text file per subject
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub sink: LogSinkKind,
    pub directory: PathBuf,
    pub service_name: String,
    pub delete_existing: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            sink: LogSinkKind::Tracing,
            directory: PathBuf::from("logs"),
            service_name: "vproc".to_string(),
            delete_existing: false,
        }
    }
}

/// Complete manager configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub execution: ExecutionConfig,
    pub scheduling: SchedulingConfig,
    pub logging: LoggingConfig,
}

impl ManagerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConcurrencyError::io("Failed to read config file", e))?;

        toml::from_str(&contents)
            .map_err(|e| ConcurrencyError::configuration(format!("Failed to parse config: {}", e), None))
    }

    /// Defaults, overlaid by an optional file, overlaid by `VPROC_*`
    /// environment variables. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&ManagerConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            info!("Loading manager config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("VPROC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ManagerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Inline execution, no time rounding
    pub fn deterministic() -> Self {
        Self::default()
    }

    /// Pooled execution on `workers` threads
    pub fn pooled(workers: usize) -> Self {
        Self {
            execution: ExecutionConfig {
                mode: ExecutionMode::Pooled,
                worker_threads: workers,
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution.mode == ExecutionMode::Pooled && self.execution.worker_threads == 0 {
            return Err(ConcurrencyError::configuration(
                "worker_threads must be > 0 in pooled mode",
                Some("execution.worker_threads"),
            ));
        }

        for (field, value) in [
            ("scheduling.real_time_granularity", self.scheduling.real_time_granularity),
            ("scheduling.logical_time_granularity", self.scheduling.logical_time_granularity),
            ("scheduling.logical_time_scale", self.scheduling.logical_time_scale),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConcurrencyError::configuration(
                    format!("{} must be a finite value >= 0, got {}", field, value),
                    Some(field),
                ));
            }
        }

        if self.logging.sink == LogSinkKind::File && self.logging.service_name.trim().is_empty() {
            return Err(ConcurrencyError::configuration(
                "service_name must not be empty for the file sink",
                Some("logging.service_name"),
            ));
        }

        Ok(())
    }
}
