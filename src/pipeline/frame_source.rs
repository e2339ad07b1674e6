//! Continuous producer of gated, fixed-size frames from the input device.

use crate::audio::frame::FrameAssembler;
use crate::audio::frame_queue::{FrameProducer, PushOutcome};
use crate::audio::gate::NoiseGate;
use crate::audio::recorder::AudioSource;
use crate::error::{Result, RevoiceError};
use crate::pipeline::ducking::{CaptureControl, DuckingState};
use crate::pipeline::events::{EngineEvent, EventSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Consecutive read failures after which the device is considered lost.
const MAX_READ_ERRORS: u32 = 10;

struct DeviceSlot {
    source: Option<Box<dyn AudioSource>>,
    /// Between `FrameSource::start` and `stop`.
    session_active: bool,
    /// The device stream is actually running.
    streaming: bool,
}

struct CaptureShared {
    slot: Mutex<DeviceSlot>,
    ducking: DuckingState,
}

/// Shared control over the input device.
///
/// The device streams only while a session is active and playback has not
/// ducked it. Clones control the same device.
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<CaptureShared>,
}

impl CaptureHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(CaptureShared {
                slot: Mutex::new(DeviceSlot {
                    source: None,
                    session_active: false,
                    streaming: false,
                }),
                ducking: DuckingState::new(),
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, DeviceSlot> {
        self.shared.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ducking(&self) -> &DuckingState {
        &self.shared.ducking
    }

    /// Install the opened input device, replacing (and stopping) any previous one.
    pub fn attach(&self, source: Box<dyn AudioSource>) {
        let previous = {
            let mut slot = self.slot();
            let previous = slot.source.replace(source);
            let was_streaming = std::mem::replace(&mut slot.streaming, false);
            previous.map(|p| (p, was_streaming))
        };
        if let Some((mut previous, true)) = previous
            && let Err(e) = previous.stop()
        {
            tracing::warn!("failed to stop replaced input device: {}", e);
        }
    }

    /// Release the input device.
    pub fn detach(&self) -> Option<Box<dyn AudioSource>> {
        let mut slot = self.slot();
        let mut source = slot.source.take()?;
        if std::mem::replace(&mut slot.streaming, false)
            && let Err(e) = source.stop()
        {
            tracing::warn!("failed to stop input device: {}", e);
        }
        Some(source)
    }

    pub fn has_device(&self) -> bool {
        self.slot().source.is_some()
    }

    /// Open a capture session; clears any stale ducking.
    pub fn begin_session(&self) -> Result<()> {
        self.shared.ducking.release();
        let mut slot = self.slot();
        slot.session_active = true;
        let result = Self::reconcile(&mut slot, &self.shared.ducking);
        if result.is_err() {
            slot.session_active = false;
        }
        result
    }

    pub fn end_session(&self) -> Result<()> {
        let mut slot = self.slot();
        slot.session_active = false;
        Self::reconcile(&mut slot, &self.shared.ducking)
    }

    pub fn session_active(&self) -> bool {
        self.slot().session_active
    }

    /// Bring the device in line with the session and ducking state.
    fn reconcile(slot: &mut DeviceSlot, ducking: &DuckingState) -> Result<()> {
        let wanted = slot.session_active && !ducking.is_ducked();
        if wanted == slot.streaming {
            return Ok(());
        }
        let Some(source) = slot.source.as_mut() else {
            return Ok(());
        };
        if wanted {
            source.start()?;
            tracing::debug!("capture started");
        } else {
            source.stop()?;
            tracing::debug!("capture stopped");
        }
        slot.streaming = wanted;
        Ok(())
    }

    /// Samples captured since the last call, or `None` while not streaming.
    pub fn read_if_streaming(&self) -> Result<Option<Vec<i16>>> {
        let mut slot = self.slot();
        if !slot.streaming {
            return Ok(None);
        }
        match slot.source.as_mut() {
            Some(source) => source.read_samples().map(Some),
            None => Ok(None),
        }
    }
}

impl Default for CaptureHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureControl for CaptureHandle {
    fn suspend(&self) -> Result<()> {
        self.shared.ducking.engage();
        let mut slot = self.slot();
        Self::reconcile(&mut slot, &self.shared.ducking)
    }

    fn resume(&self) -> Result<()> {
        self.shared.ducking.release();
        let mut slot = self.slot();
        Self::reconcile(&mut slot, &self.shared.ducking)
    }

    fn is_capturing(&self) -> bool {
        self.slot().streaming
    }
}

#[derive(Debug, Clone)]
pub struct FrameSourceConfig {
    pub sample_rate: u32,
    pub frame_ms: u32,
    pub poll_interval: Duration,
    pub gate: NoiseGate,
}

/// Drives the capture thread: read device, assemble frames, gate, enqueue.
pub struct FrameSource {
    capture: CaptureHandle,
    producer: FrameProducer,
    config: FrameSourceConfig,
    events: Arc<dyn EventSink>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FrameSource {
    pub fn new(
        capture: CaptureHandle,
        producer: FrameProducer,
        config: FrameSourceConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            capture,
            producer,
            config,
            events,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin continuous frame delivery. A second call while running is a no-op.
    ///
    /// # Errors
    /// Returns the device error if the input stream cannot be started.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            tracing::warn!("frame source already running");
            return Ok(());
        }
        // Reap a capture thread that exited on its own (device lost)
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }

        if !self.capture.has_device() {
            return Err(RevoiceError::AudioCapture {
                message: "no input device attached".to_string(),
            });
        }
        self.capture.begin_session()?;

        self.running.store(true, Ordering::SeqCst);
        let worker = CaptureWorker {
            capture: self.capture.clone(),
            producer: self.producer.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
            running: self.running.clone(),
        };
        let spawned = thread::Builder::new()
            .name("revoice-capture".to_string())
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = self.capture.end_session();
                Err(RevoiceError::AudioCapture {
                    message: format!("failed to spawn capture thread: {}", e),
                })
            }
        }
    }

    /// Halt frame delivery and release the stream. No-op when stopped.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            tracing::error!("capture thread panicked");
        }
        if was_running && let Err(e) = self.capture.end_session() {
            tracing::warn!("failed to stop capture: {}", e);
            self.events
                .emit(EngineEvent::error("capture", e.to_string()));
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CaptureWorker {
    capture: CaptureHandle,
    producer: FrameProducer,
    config: FrameSourceConfig,
    events: Arc<dyn EventSink>,
    running: Arc<AtomicBool>,
}

impl CaptureWorker {
    fn run(self) {
        let mut assembler = FrameAssembler::new(self.config.sample_rate, self.config.frame_ms);
        let mut consecutive_errors = 0u32;

        while self.running.load(Ordering::SeqCst) {
            match self.capture.read_if_streaming() {
                Ok(Some(samples)) => {
                    consecutive_errors = 0;
                    for frame in assembler.push(&samples) {
                        if !self.config.gate.admits(&frame) {
                            continue;
                        }
                        match self.producer.push(frame) {
                            PushOutcome::Queued => {}
                            PushOutcome::DroppedOldest => {
                                tracing::debug!("frame queue full, dropped oldest frame");
                            }
                        }
                    }
                }
                // Suspended: never splice audio from before and after a gap
                Ok(None) => assembler.clear(),
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(consecutive_errors, "capture read failed: {}", e);
                    if consecutive_errors >= MAX_READ_ERRORS {
                        self.events.emit(EngineEvent::error(
                            "capture",
                            format!("input device lost: {}", e),
                        ));
                        self.running.store(false, Ordering::SeqCst);
                        if let Err(e) = self.capture.end_session() {
                            tracing::warn!("failed to release input device: {}", e);
                        }
                        return;
                    }
                }
            }
            thread::sleep(self.config.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::activity::{ActivityLog, DeviceEvent};
    use crate::audio::frame_queue::FrameQueue;
    use crate::audio::recorder::MockAudioSource;
    use crate::pipeline::events::CollectorSink;
    use std::time::Instant;

    fn config(gate: NoiseGate) -> FrameSourceConfig {
        FrameSourceConfig {
            sample_rate: 16000,
            frame_ms: 100,
            poll_interval: Duration::from_millis(1),
            gate,
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_capture_handle_ducking_toggles_device() {
        let activity = ActivityLog::new();
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new().with_activity(activity.clone())));

        capture.begin_session().unwrap();
        assert!(capture.is_capturing());
        capture.suspend().unwrap();
        assert!(!capture.is_capturing());
        assert!(capture.ducking().is_ducked());
        capture.resume().unwrap();
        assert!(capture.is_capturing());
        capture.end_session().unwrap();
        assert!(!capture.is_capturing());

        assert_eq!(activity.count(DeviceEvent::CaptureStarted), 2);
        assert_eq!(activity.count(DeviceEvent::CaptureStopped), 2);
    }

    #[test]
    fn test_resume_without_session_keeps_device_closed() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new()));
        capture.suspend().unwrap();
        capture.resume().unwrap();
        assert!(!capture.is_capturing());
    }

    #[test]
    fn test_read_while_suspended_is_none() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new()));
        capture.begin_session().unwrap();
        assert!(capture.read_if_streaming().unwrap().is_some());
        capture.suspend().unwrap();
        assert!(capture.read_if_streaming().unwrap().is_none());
    }

    #[test]
    fn test_frames_flow_into_queue() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(
            MockAudioSource::new().with_samples(vec![3000i16; 800]),
        ));
        let queue = FrameQueue::bounded(80);
        let mut source = FrameSource::new(
            capture,
            queue.producer(),
            config(NoiseGate::open()),
            Arc::new(CollectorSink::new()),
        );

        source.start().unwrap();
        let frame = queue
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        source.stop();

        assert_eq!(frame.samples.len(), 1600);
        assert_eq!(frame.sample_rate, 16000);
    }

    #[test]
    fn test_noise_gate_drops_silence_before_queue() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new().with_samples(vec![0i16; 1600])));
        let queue = FrameQueue::bounded(80);
        let mut source = FrameSource::new(
            capture.clone(),
            queue.producer(),
            config(NoiseGate::new(true, 0.005)),
            Arc::new(CollectorSink::new()),
        );

        source.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        source.stop();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_start_stop_idempotent() {
        let activity = ActivityLog::new();
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new().with_activity(activity.clone())));
        let queue = FrameQueue::bounded(8);
        let mut source = FrameSource::new(
            capture,
            queue.producer(),
            config(NoiseGate::open()),
            Arc::new(CollectorSink::new()),
        );

        source.stop();
        source.start().unwrap();
        source.start().unwrap();
        assert!(source.is_running());
        source.stop();
        source.stop();
        assert!(!source.is_running());
        assert_eq!(activity.count(DeviceEvent::CaptureStarted), 1);
        assert_eq!(activity.count(DeviceEvent::CaptureStopped), 1);
    }

    #[test]
    fn test_start_without_device_fails() {
        let queue = FrameQueue::bounded(8);
        let mut source = FrameSource::new(
            CaptureHandle::new(),
            queue.producer(),
            config(NoiseGate::open()),
            Arc::new(CollectorSink::new()),
        );
        assert!(matches!(
            source.start(),
            Err(RevoiceError::AudioCapture { .. })
        ));
        assert!(!source.is_running());
    }

    #[test]
    fn test_device_start_failure_is_returned() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new().with_start_failure()));
        let queue = FrameQueue::bounded(8);
        let mut source = FrameSource::new(
            capture,
            queue.producer(),
            config(NoiseGate::open()),
            Arc::new(CollectorSink::new()),
        );
        assert!(source.start().is_err());
        assert!(!source.is_running());
    }

    #[test]
    fn test_failed_session_start_is_not_resumed_later() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new().with_start_failure()));

        assert!(capture.begin_session().is_err());
        assert!(!capture.session_active());

        capture.suspend().unwrap();
        assert!(capture.resume().is_ok());
        assert!(!capture.is_capturing());
    }

    #[test]
    fn test_lost_device_reports_and_stops() {
        let capture = CaptureHandle::new();
        capture.attach(Box::new(MockAudioSource::new().with_read_failure()));
        let sink = Arc::new(CollectorSink::new());
        let queue = FrameQueue::bounded(8);
        let mut source = FrameSource::new(
            capture.clone(),
            queue.producer(),
            config(NoiseGate::open()),
            sink.clone(),
        );

        source.start().unwrap();
        assert!(wait_for(|| !source.is_running()));
        assert!(!capture.is_capturing());
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "capture");
        source.stop();
    }
}
