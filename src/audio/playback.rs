//! Blocking playback of synthesized clips.

use crate::audio::activity::{ActivityLog, DeviceEvent};
use crate::audio::dsp::DecodedAudio;
use crate::error::{Result, RevoiceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output device that plays one clip at a time.
pub trait AudioPlayer: Send {
    /// Play `audio` and block until it has finished.
    fn play(&mut self, audio: &DecodedAudio) -> Result<()>;

    fn name(&self) -> &str;
}

/// rodio-backed player on a named or default output device.
///
/// The output stream is opened per clip so the player stays `Send`.
#[cfg(feature = "cpal-audio")]
pub struct RodioPlayer {
    device: Option<String>,
}

#[cfg(feature = "cpal-audio")]
impl RodioPlayer {
    pub fn new(device: Option<&str>) -> Self {
        Self {
            device: device.map(str::to_string),
        }
    }

    fn open_stream(&self) -> Result<(rodio::OutputStream, rodio::OutputStreamHandle)> {
        use rodio::cpal::traits::{DeviceTrait, HostTrait};

        let Some(device_name) = self.device.as_deref() else {
            return rodio::OutputStream::try_default().map_err(|e| RevoiceError::Playback {
                message: format!("Failed to open default output device: {}", e),
            });
        };

        let host = rodio::cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| RevoiceError::Playback {
                message: format!("Failed to enumerate output devices: {}", e),
            })?
            .find(|d| {
                d.name()
                    .map(|n| n.contains(device_name) || device_name.contains(&n))
                    .unwrap_or(false)
            })
            .ok_or_else(|| RevoiceError::AudioDeviceNotFound {
                device: device_name.to_string(),
            })?;

        rodio::OutputStream::try_from_device(&device).map_err(|e| RevoiceError::Playback {
            message: format!("Failed to open output device '{}': {}", device_name, e),
        })
    }
}

#[cfg(feature = "cpal-audio")]
impl AudioPlayer for RodioPlayer {
    fn play(&mut self, audio: &DecodedAudio) -> Result<()> {
        if audio.is_empty() {
            return Ok(());
        }
        let (_stream, handle) = self.open_stream()?;
        let sink = rodio::Sink::try_new(&handle).map_err(|e| RevoiceError::Playback {
            message: format!("Failed to create playback sink: {}", e),
        })?;

        let buffer =
            rodio::buffer::SamplesBuffer::new(audio.channels, audio.sample_rate, audio.samples.clone());
        sink.append(buffer);
        sink.sleep_until_end();
        Ok(())
    }

    fn name(&self) -> &str {
        self.device.as_deref().unwrap_or("default")
    }
}

/// List output device names.
#[cfg(feature = "cpal-audio")]
pub fn list_output_devices() -> Result<Vec<String>> {
    use rodio::cpal::traits::{DeviceTrait, HostTrait};

    let host = rodio::cpal::default_host();
    let devices = host.output_devices().map_err(|e| RevoiceError::Playback {
        message: format!("Failed to enumerate output devices: {}", e),
    })?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

#[derive(Debug, Default)]
struct MockPlayerState {
    played: Mutex<Vec<DecodedAudio>>,
    fail: AtomicBool,
}

/// Mock player for testing. Clones share what was played.
#[derive(Debug, Clone, Default)]
pub struct MockPlayer {
    state: Arc<MockPlayerState>,
    delay: Duration,
    activity: Option<ActivityLog>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated playback duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_activity(mut self, activity: ActivityLog) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Make every subsequent `play` fail.
    pub fn with_failure(self) -> Self {
        self.state.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn played(&self) -> Vec<DecodedAudio> {
        self.state
            .played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn play_count(&self) -> usize {
        self.state
            .played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn record(&self, event: DeviceEvent) {
        if let Some(activity) = &self.activity {
            activity.record(event);
        }
    }
}

impl AudioPlayer for MockPlayer {
    fn play(&mut self, audio: &DecodedAudio) -> Result<()> {
        self.record(DeviceEvent::PlaybackStarted);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let result = if self.state.fail.load(Ordering::SeqCst) {
            Err(RevoiceError::Playback {
                message: "mock playback failure".to_string(),
            })
        } else {
            self.state
                .played
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(audio.clone());
            Ok(())
        };
        self.record(DeviceEvent::PlaybackFinished);
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_player_records_clips() {
        let player = MockPlayer::new();
        let mut handle = player.clone();
        let clip = DecodedAudio::new(vec![0.1; 10], 16000, 1);
        handle.play(&clip).unwrap();
        assert_eq!(player.play_count(), 1);
        assert_eq!(player.played()[0], clip);
    }

    #[test]
    fn test_mock_player_failure_still_logs_bracket() {
        let activity = ActivityLog::new();
        let mut player = MockPlayer::new()
            .with_activity(activity.clone())
            .with_failure();
        let clip = DecodedAudio::new(vec![0.1; 10], 16000, 1);
        assert!(matches!(
            player.play(&clip),
            Err(RevoiceError::Playback { .. })
        ));
        assert_eq!(
            activity.events(),
            vec![DeviceEvent::PlaybackStarted, DeviceEvent::PlaybackFinished]
        );
        assert_eq!(player.play_count(), 0);
    }

    #[test]
    fn test_player_trait_is_object_safe() {
        let mut player: Box<dyn AudioPlayer> = Box::new(MockPlayer::new());
        assert_eq!(player.name(), "mock");
        assert!(player.play(&DecodedAudio::new(vec![], 16000, 1)).is_ok());
    }
}
