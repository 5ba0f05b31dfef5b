//! Concurrency Error Types
//!
//! Two tiers of failure exist in the runtime:
//!
//! - **Protocol violations** (unregistered message type, double-scheduled
//!   task, reschedule into the past, ...) are programming defects. They go
//!   through [`fatal!`](crate::fatal) / [`fatal_assert!`](crate::fatal_assert),
//!   which log at `error` level and panic. Release builds abort on panic.
//! - **Recoverable errors** (configuration, runtime construction, log sink
//!   I/O) are [`ConcurrencyError`] values returned through [`Result`].
//!
//! Expected absence (a record or mailbox that is not there yet) is modelled
//! with `Option` and never reaches either tier.

use thiserror::Error;

/// Main error type for the concurrency runtime
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Worker pool could not be created
    #[error("Runtime error: {message}")]
    Runtime {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File system failures (log sink)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for concurrency operations
pub type Result<T> = std::result::Result<T, ConcurrencyError>;

impl ConcurrencyError {
    /// Create a configuration error, optionally naming the offending field
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }
    }

    /// Create a runtime error with an underlying cause
    pub fn runtime_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Runtime {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Field name attached to a configuration error
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Configuration { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl From<config_crate::ConfigError> for ConcurrencyError {
    fn from(err: config_crate::ConfigError) -> Self {
        Self::configuration(format!("Failed to build configuration: {}", err), None)
    }
}

/// Report a protocol violation and stop.
///
/// Logs the formatted reason with `tracing::error!` before panicking so the
/// reason survives into the log even when panics abort.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let reason = ::std::format!($($arg)+);
        $crate::__tracing::error!(reason = %reason, "protocol violation");
        ::std::panic!("{}", reason)
    }};
}

/// [`fatal!`](crate::fatal) unless `cond` holds.
#[macro_export]
macro_rules! fatal_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::fatal!($($arg)+);
        }
    };
}
