//! Core station abstraction and runner for the live pipeline.

use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::signal::StopSignal;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A processing station in the live pipeline.
///
/// Each station receives input, processes it, and produces output.
/// Stations run in their own threads and are connected by channels.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., filtered)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called when no input arrived within the poll interval.
    fn on_idle(&mut self) -> Result<Option<Self::Output>, StationError> {
        Ok(None)
    }

    /// Called once when the loop exits; may flush a last output.
    fn shutdown(&mut self) -> Option<Self::Output> {
        None
    }
}

/// Runs a station in a dedicated thread until the stop signal is raised,
/// its input disconnects, or it fails fatally.
pub struct StationRunner<S: Station> {
    handle: Option<JoinHandle<S>>,
    station_name: &'static str,
}

impl<S: Station> StationRunner<S> {
    /// Spawns a new station in a dedicated thread.
    ///
    /// # Arguments
    /// * `station` - The station implementation to run
    /// * `input_rx` - Channel to receive inputs from
    /// * `output_tx` - Channel to send outputs to, if the station produces any
    /// * `stop` - Checked before every receive
    /// * `poll_interval` - Receive timeout; expiry calls `on_idle`
    /// * `error_reporter` - Reporter for handling errors
    pub fn spawn(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Option<Sender<S::Output>>,
        stop: StopSignal,
        poll_interval: Duration,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let station_name = station.name();

        let handle = thread::Builder::new()
            .name(format!("revoice-{}", station_name))
            .spawn(move || {
                Self::run_station(
                    &mut station,
                    input_rx,
                    output_tx,
                    stop,
                    poll_interval,
                    error_reporter,
                );
                station
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(station = station_name, "failed to spawn station thread: {}", e);
                None
            }
        };

        Self {
            handle,
            station_name,
        }
    }

    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Option<Sender<S::Output>>,
        stop: StopSignal,
        poll_interval: Duration,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let station_name = station.name();
        tracing::debug!(station = station_name, "station started");

        loop {
            if stop.is_raised() {
                break;
            }

            let result = match input_rx.recv_timeout(poll_interval) {
                Ok(input) => station.process(input),
                Err(RecvTimeoutError::Timeout) => station.on_idle(),
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match result {
                Ok(Some(output)) => {
                    if let Some(tx) = &output_tx
                        && tx.send(output).is_err()
                    {
                        // Downstream closed, shutdown
                        break;
                    }
                }
                Ok(None) => {}
                Err(error @ StationError::Recoverable(_)) => {
                    error_reporter.report(station_name, &error);
                }
                Err(error @ StationError::Fatal(_)) => {
                    error_reporter.report(station_name, &error);
                    break;
                }
            }
        }

        if let Some(output) = station.shutdown()
            && let Some(tx) = &output_tx
        {
            let _ = tx.send(output);
        }
        tracing::debug!(station = station_name, "station stopped");
    }

    /// Whether the station thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Waits for the station thread and hands the station back.
    pub fn join(mut self) -> Result<S, String> {
        let name = self.station_name;
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|panic_info| {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic");
                format!("Station '{}' thread panicked: {}", name, msg)
            }),
            None => Err(format!("Station '{}' was never started", name)),
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}
