//! Logging actor and sinks
//!
//! Actors log by sending [`LogRequest`]s to the actor at [`LOGGING_KEY`],
//! which hands each one to a [`LogSink`]:
//!
//! - [`TracingLogSink`] re-emits requests as `tracing` events on target
//!   `actor_log`
//! - [`FileLogSink`] writes one text file per subject,
//!   `<service>_<pid>_<Subject>.txt`, lines formatted
//!   `[ HH:MM:SS.mmm ]( major, minor ) : message`
//! - [`MemoryLogSink`] keeps entries in memory for inspection
//!
//! The logging actor runs in real time. It closes its sink when told to
//! stop, and also when serviced without an execution context, which is how
//! an abnormal termination path flushes the logs.

use crate::actor::{Actor, ActorCore};
use crate::clock::TimeDomain;
use crate::config::{LogSinkKind, LoggingConfig};
use crate::error::{ConcurrencyError, Result};
use crate::key::{ActorKey, LOGGING_KEY};
use crate::message::HandlerTable;
use crate::messages::LogRequest;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Seconds between logging actor services
pub const LOG_SERVICE_INTERVAL: f64 = 0.01;

/// Destination for log lines
pub trait LogSink: Send {
    fn write(
        &mut self,
        source: ActorKey,
        message: &str,
        timestamp: DateTime<Local>,
        elapsed: f64,
    ) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Flush and release resources. Later writes may be dropped.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Forwards log lines to `tracing`
#[derive(Debug, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write(
        &mut self,
        source: ActorKey,
        message: &str,
        _timestamp: DateTime<Local>,
        elapsed: f64,
    ) -> Result<()> {
        info!(
            target: "actor_log",
            subject = %subject_name(source),
            major = source.major(),
            minor = source.minor(),
            elapsed,
            "{}",
            message
        );
        Ok(())
    }
}

/// One file per subject inside a directory
#[derive(Debug)]
pub struct FileLogSink {
    directory: PathBuf,
    service_name: String,
    files: HashMap<u32, BufWriter<File>>,
}

impl FileLogSink {
    pub fn new(directory: impl Into<PathBuf>, service_name: impl Into<String>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .map_err(|e| ConcurrencyError::io(format!("Failed to create {:?}", directory), e))?;

        Ok(Self {
            directory,
            service_name: service_name.into(),
            files: HashMap::new(),
        })
    }

    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        let sink = Self::new(&config.directory, &config.service_name)?;
        if config.delete_existing {
            sink.delete_existing()?;
        }
        Ok(sink)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding `subject`'s lines
    pub fn file_path(&self, source: ActorKey) -> PathBuf {
        self.directory.join(format!(
            "{}_{}_{}.txt",
            self.service_name,
            std::process::id(),
            subject_name(source)
        ))
    }

    /// Remove log files left by earlier runs of this service
    pub fn delete_existing(&self) -> Result<usize> {
        let prefix = format!("{}_", self.service_name);
        let entries = fs::read_dir(&self.directory)
            .map_err(|e| ConcurrencyError::io("Failed to list log directory", e))?;

        let mut deleted = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".txt") {
                fs::remove_file(entry.path())
                    .map_err(|e| ConcurrencyError::io(format!("Failed to delete {}", name), e))?;
                deleted += 1;
            }
        }
        debug!(deleted, directory = ?self.directory, "Deleted old log files");
        Ok(deleted)
    }

    fn writer_for(&mut self, source: ActorKey) -> Result<&mut BufWriter<File>> {
        let path = self.file_path(source);
        match self.files.entry(source.subject_raw()) {
            std::collections::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| ConcurrencyError::io(format!("Failed to open {:?}", path), e))?;
                Ok(entry.insert(BufWriter::new(file)))
            }
        }
    }
}

impl LogSink for FileLogSink {
    fn write(
        &mut self,
        source: ActorKey,
        message: &str,
        timestamp: DateTime<Local>,
        _elapsed: f64,
    ) -> Result<()> {
        let writer = self.writer_for(source)?;
        writeln!(
            writer,
            "{}",
            format_line(source, message, timestamp)
        )
        .map_err(|e| ConcurrencyError::io("Failed to write log line", e))
    }

    fn flush(&mut self) -> Result<()> {
        for writer in self.files.values_mut() {
            writer
                .flush()
                .map_err(|e| ConcurrencyError::io("Failed to flush log file", e))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.files.clear();
        Ok(())
    }
}

/// A log line as stored by [`MemoryLogSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub source: ActorKey,
    pub message: String,
    pub elapsed: f64,
}

/// In-memory sink. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

impl LogSink for MemoryLogSink {
    fn write(
        &mut self,
        source: ActorKey,
        message: &str,
        _timestamp: DateTime<Local>,
        elapsed: f64,
    ) -> Result<()> {
        self.entries.lock().push(LogEntry {
            source,
            message: message.to_string(),
            elapsed,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

/// Build the sink selected by `config`
pub fn sink_from_config(config: &LoggingConfig) -> Result<Box<dyn LogSink>> {
    Ok(match config.sink {
        LogSinkKind::Tracing => Box::new(TracingLogSink),
        LogSinkKind::File => Box::new(FileLogSink::from_config(config)?),
    })
}

/// `[ HH:MM:SS.mmm ]( major, minor ) : message`
pub fn format_line(source: ActorKey, message: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "[ {} ]( {}, {} ) : {}",
        timestamp.format("%H:%M:%S%.3f"),
        source.major(),
        source.minor(),
        message
    )
}

fn subject_name(key: ActorKey) -> String {
    match key.subject() {
        Some(subject) => subject.name().to_string(),
        None => format!("Subject{}", key.subject_raw()),
    }
}

/// The actor at [`LOGGING_KEY`]
pub struct LoggingActor {
    core: ActorCore,
    sink: Box<dyn LogSink>,
    closed: bool,
}

impl LoggingActor {
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        Self {
            core: ActorCore::new(LOGGING_KEY),
            sink,
            closed: false,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        Ok(Self::new(sink_from_config(config)?))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn write(&mut self, source: ActorKey, message: &str, timestamp: DateTime<Local>, elapsed: f64) {
        if self.closed {
            trace!(source = %source, "Log line after close dropped");
            return;
        }
        if let Err(e) = self.sink.write(source, message, timestamp, elapsed) {
            warn!(source = %source, error = %e, "Log sink write failed");
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.sink.close() {
            warn!(error = %e, "Log sink close failed");
        }
        debug!("Log sink closed");
    }
}

impl Actor for LoggingActor {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn register_handlers(handlers: &mut HandlerTable<Self>) {
        handlers.register(|actor: &mut LoggingActor, _, request: Arc<LogRequest>| {
            actor.write(request.source, &request.message, request.timestamp, request.elapsed);
        });
    }

    fn time_domain(&self) -> TimeDomain {
        TimeDomain::RealTime
    }

    fn reschedule_interval(&self) -> f64 {
        LOG_SERVICE_INTERVAL
    }

    fn on_service(&mut self, _now: f64) {
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "Log sink flush failed");
        }
    }

    fn on_shutdown(&mut self, _is_hard: bool) {
        self.close();
    }

    fn on_detached_service(&mut self) {
        self.close();
        self.core.stop_unsolicited();
    }

    fn log(&mut self, message: String) {
        let elapsed = self.core.current_time();
        self.write(LOGGING_KEY, &message, Local::now(), elapsed);
    }
}

impl std::fmt::Debug for LoggingActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingActor")
            .field("core", &self.core)
            .field("closed", &self.closed)
            .finish()
    }
}
