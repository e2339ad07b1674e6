//! Audio device layer: enumerate devices and open input/output streams.

use crate::audio::activity::ActivityLog;
use crate::audio::playback::{AudioPlayer, MockPlayer};
use crate::audio::recorder::{AudioSource, AudioSourceConfig, MockAudioSource};
use crate::error::{Result, RevoiceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn input_devices(&self) -> Result<Vec<String>>;

    fn output_devices(&self) -> Result<Vec<String>>;

    /// Open a streaming input. The source is returned stopped.
    fn open_input(&self, config: &AudioSourceConfig) -> Result<Box<dyn AudioSource>>;

    /// Open an output for blocking playback. `None` selects the default device.
    fn open_output(&self, device: Option<&str>) -> Result<Box<dyn AudioPlayer>>;
}

/// cpal for capture, rodio for playback.
#[cfg(feature = "cpal-audio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

#[cfg(feature = "cpal-audio")]
impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn input_devices(&self) -> Result<Vec<String>> {
        crate::audio::capture::list_input_devices()
    }

    fn output_devices(&self) -> Result<Vec<String>> {
        crate::audio::playback::list_output_devices()
    }

    fn open_input(&self, config: &AudioSourceConfig) -> Result<Box<dyn AudioSource>> {
        Ok(Box::new(crate::audio::capture::CpalAudioSource::new(
            config,
        )?))
    }

    fn open_output(&self, device: Option<&str>) -> Result<Box<dyn AudioPlayer>> {
        Ok(Box::new(crate::audio::playback::RodioPlayer::new(device)))
    }
}

/// The real backend when compiled in.
pub fn default_backend() -> Result<Arc<dyn AudioBackend>> {
    #[cfg(feature = "cpal-audio")]
    {
        Ok(Arc::new(CpalBackend))
    }
    #[cfg(not(feature = "cpal-audio"))]
    {
        Err(RevoiceError::DependencyMissing {
            dependency: "audio backend".to_string(),
            hint: "rebuild with --features cpal-audio".to_string(),
        })
    }
}

/// Mock backend handing out clones of a configured source and player.
#[derive(Debug, Clone)]
pub struct MockBackend {
    source: Arc<Mutex<MockAudioSource>>,
    player: MockPlayer,
    inputs: Vec<String>,
    outputs: Vec<String>,
    fail_open_input: bool,
    opened_inputs: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            source: Arc::new(Mutex::new(MockAudioSource::new())),
            player: MockPlayer::new(),
            inputs: vec!["mock microphone".to_string()],
            outputs: vec!["mock speakers".to_string()],
            fail_open_input: false,
            opened_inputs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_source(self, source: MockAudioSource) -> Self {
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = source;
        self
    }

    pub fn with_player(mut self, player: MockPlayer) -> Self {
        self.player = player;
        self
    }

    /// Wire the default source and player to one activity log.
    pub fn with_activity(self, activity: ActivityLog) -> Self {
        let source = self
            .source
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .with_activity(activity.clone());
        let player = self.player.clone().with_activity(activity);
        self.with_source(source).with_player(player)
    }

    pub fn with_open_input_failure(mut self) -> Self {
        self.fail_open_input = true;
        self
    }

    pub fn player(&self) -> MockPlayer {
        self.player.clone()
    }

    pub fn opened_inputs(&self) -> usize {
        self.opened_inputs.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn input_devices(&self) -> Result<Vec<String>> {
        Ok(self.inputs.clone())
    }

    fn output_devices(&self) -> Result<Vec<String>> {
        Ok(self.outputs.clone())
    }

    fn open_input(&self, config: &AudioSourceConfig) -> Result<Box<dyn AudioSource>> {
        if self.fail_open_input {
            return Err(RevoiceError::AudioDeviceNotFound {
                device: config.device.clone().unwrap_or_else(|| "default".to_string()),
            });
        }
        self.opened_inputs.fetch_add(1, Ordering::SeqCst);
        let source = self.source.lock().unwrap_or_else(|e| e.into_inner()).clone();
        Ok(Box::new(source))
    }

    fn open_output(&self, _device: Option<&str>) -> Result<Box<dyn AudioPlayer>> {
        Ok(Box::new(self.player.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_lists_devices() {
        let backend = MockBackend::new();
        assert_eq!(backend.input_devices().unwrap(), vec!["mock microphone"]);
        assert_eq!(backend.output_devices().unwrap(), vec!["mock speakers"]);
    }

    #[test]
    fn test_mock_backend_open_input_failure() {
        let backend = MockBackend::new().with_open_input_failure();
        let config = AudioSourceConfig {
            device: Some("usb mic".to_string()),
            ..Default::default()
        };
        match backend.open_input(&config) {
            Err(RevoiceError::AudioDeviceNotFound { device }) => assert_eq!(device, "usb mic"),
            _ => panic!("expected AudioDeviceNotFound"),
        }
    }

    #[test]
    fn test_mock_backend_shares_player_state() {
        let backend = MockBackend::new();
        let mut output = backend.open_output(None).unwrap();
        output
            .play(&crate::audio::dsp::DecodedAudio::new(vec![0.0; 4], 16000, 1))
            .unwrap();
        assert_eq!(backend.player().play_count(), 1);
    }

    #[test]
    fn test_mock_backend_counts_opened_inputs() {
        let backend = MockBackend::new();
        backend.open_input(&AudioSourceConfig::default()).unwrap();
        backend.open_input(&AudioSourceConfig::default()).unwrap();
        assert_eq!(backend.opened_inputs(), 2);
    }
}
