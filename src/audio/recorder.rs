use crate::audio::activity::{ActivityLog, DeviceEvent};
use crate::defaults;
use crate::error::{Result, RevoiceError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source and release the device stream.
    fn stop(&mut self) -> Result<()>;

    /// Read the 16-bit mono PCM captured since the last call.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Configuration for audio source initialization
#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub device: Option<String>,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            device: None,
        }
    }
}

/// Mock audio source for testing
///
/// Reads return scripted chunks in order while the source is started, then
/// the fallback samples once the script is exhausted. Clones share the script.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    script: Arc<Mutex<VecDeque<Vec<i16>>>>,
    samples: Vec<i16>,
    should_fail_start: bool,
    should_fail_stop: bool,
    should_fail_read: bool,
    error_message: String,
    activity: Option<ActivityLog>,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            script: Arc::new(Mutex::new(VecDeque::new())),
            samples: vec![0i16; 160],
            should_fail_start: false,
            should_fail_stop: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
            activity: None,
        }
    }

    /// Configure the samples returned once the script is exhausted
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    /// Queue chunks returned by successive reads
    pub fn with_chunks(self, chunks: Vec<Vec<i16>>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(chunks);
        self
    }

    /// Record start/stop transitions into a shared log
    pub fn with_activity(mut self, activity: ActivityLog) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Scripted chunks not yet read.
    pub fn remaining_chunks(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn error(&self) -> RevoiceError {
        RevoiceError::AudioCapture {
            message: self.error_message.clone(),
        }
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(self.error());
        }
        if !self.is_started
            && let Some(activity) = &self.activity
        {
            activity.record(DeviceEvent::CaptureStarted);
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.should_fail_stop {
            return Err(self.error());
        }
        if self.is_started
            && let Some(activity) = &self.activity
        {
            activity.record(DeviceEvent::CaptureStopped);
        }
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(self.error());
        }
        if !self.is_started {
            return Ok(Vec::new());
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| self.samples.clone()))
    }
}
