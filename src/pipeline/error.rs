//! Error types and reporting for pipeline stations.

use crate::pipeline::events::{EngineEvent, EventSink};
use std::fmt;
use std::sync::Arc;

/// Errors that can occur during station processing.
#[derive(Debug, Clone)]
pub enum StationError {
    /// Recoverable error that allows the station to continue processing.
    Recoverable(String),
    /// Fatal error that requires the station to shut down.
    Fatal(String),
}

impl StationError {
    pub fn message(&self) -> &str {
        match self {
            StationError::Recoverable(msg) | StationError::Fatal(msg) => msg,
        }
    }
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting station errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);
}

/// Reporter that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        match error {
            StationError::Recoverable(_) => tracing::warn!(station, "{}", error),
            StationError::Fatal(_) => tracing::error!(station, "{}", error),
        }
    }
}

/// Logs and forwards errors to the status sink.
pub struct SinkReporter {
    events: Arc<dyn EventSink>,
}

impl SinkReporter {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events }
    }
}

impl ErrorReporter for SinkReporter {
    fn report(&self, station: &str, error: &StationError) {
        LogReporter.report(station, error);
        self.events
            .emit(EngineEvent::error(station, error.message().to_string()));
    }
}
