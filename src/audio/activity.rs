//! Shared record of device transitions, used by the mock devices.
//!
//! Tests read it back to check that capture and playback never overlap.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    CaptureStarted,
    CaptureStopped,
    PlaybackStarted,
    PlaybackFinished,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: DeviceEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, event: DeviceEvent) -> usize {
        self.events().iter().filter(|&&e| e == event).count()
    }

    /// Replays the log and reports whether capture was ever live while
    /// playback was running.
    pub fn capture_overlapped_playback(&self) -> bool {
        let mut capturing = false;
        let mut playing = false;
        for event in self.events() {
            match event {
                DeviceEvent::CaptureStarted => capturing = true,
                DeviceEvent::CaptureStopped => capturing = false,
                DeviceEvent::PlaybackStarted => playing = true,
                DeviceEvent::PlaybackFinished => playing = false,
            }
            if capturing && playing {
                return true;
            }
        }
        false
    }

    /// Whether capture is live at the end of the log.
    pub fn capture_active(&self) -> bool {
        self.events()
            .iter()
            .rev()
            .find_map(|e| match e {
                DeviceEvent::CaptureStarted => Some(true),
                DeviceEvent::CaptureStopped => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}
