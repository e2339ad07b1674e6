//! Capture/playback mutual exclusion.
//!
//! While synthesized audio plays, capture is suspended so the recognizer never
//! hears the engine's own voice. [`DuckGuard`] brackets a playback cycle and
//! resumes capture on drop, whatever path the cycle took.

use crate::error::Result;
use crate::pipeline::events::{EngineEvent, EventSink};
use crate::pipeline::signal::StopSignal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// "Capture suspended for playback" flag.
#[derive(Debug, Clone, Default)]
pub struct DuckingState {
    ducked: Arc<AtomicBool>,
}

impl DuckingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self) {
        self.ducked.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.ducked.store(false, Ordering::SeqCst);
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked.load(Ordering::SeqCst)
    }
}

/// What the ducking bracket needs from the capture side.
pub trait CaptureControl: Send + Sync {
    /// Stop delivering frames and release the input stream.
    fn suspend(&self) -> Result<()>;

    /// Undo [`suspend`](Self::suspend) if a capture session is still active.
    fn resume(&self) -> Result<()>;

    fn is_capturing(&self) -> bool;
}

/// Suspends capture for its lifetime.
///
/// On drop capture is resumed, unless the stop signal was raised meanwhile.
pub struct DuckGuard {
    control: Arc<dyn CaptureControl>,
    stop: StopSignal,
    events: Arc<dyn EventSink>,
}

impl DuckGuard {
    pub fn engage(
        control: Arc<dyn CaptureControl>,
        stop: StopSignal,
        events: Arc<dyn EventSink>,
    ) -> Self {
        if let Err(e) = control.suspend() {
            tracing::warn!("could not suspend capture for playback: {}", e);
            events.emit(EngineEvent::error("ducking", e.to_string()));
        }
        Self {
            control,
            stop,
            events,
        }
    }
}

impl Drop for DuckGuard {
    fn drop(&mut self) {
        if self.stop.is_raised() {
            tracing::debug!("stop raised, capture stays suspended");
            return;
        }
        if let Err(e) = self.control.resume() {
            tracing::warn!("could not resume capture: {}", e);
            self.events
                .emit(EngineEvent::error("ducking", format!("could not resume capture: {}", e)));
        }
    }
}
