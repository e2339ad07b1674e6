//! Synthesis & playback controller: one phrase at a time, end to end.

use crate::audio::decode::decode_audio;
use crate::audio::dsp::post_process;
use crate::audio::playback::AudioPlayer;
use crate::error::{Result, RevoiceError};
use crate::pipeline::cache::{ArtifactCache, artifact_stem};
use crate::pipeline::ducking::{CaptureControl, DuckGuard};
use crate::pipeline::events::{EngineEvent, EventSink};
use crate::pipeline::signal::StopSignal;
use crate::pipeline::types::{AudioClip, SynthesisJob};
use crate::tts::retry::{RetryPolicy, synthesize_with_retries};
use crate::tts::synthesizer::{Synthesizer, VoiceParams};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub policy: RetryPolicy,
    /// Suspend capture around playback.
    pub ducking: bool,
    /// Rate of the mono playback form (the capture rate).
    pub playback_rate: u32,
}

/// How a single cycle should treat capture and the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOptions {
    pub duck: bool,
    /// Save the normalized clip to the artifact cache.
    pub persist: bool,
}

impl CycleOptions {
    pub const LIVE: CycleOptions = CycleOptions {
        duck: true,
        persist: true,
    };
}

/// Runs synthesis cycles. The output device lock serializes every cycle,
/// so the live loop and one-shot requests never overlap.
pub struct SynthesisController {
    runtime: Option<tokio::runtime::Runtime>,
    synthesizer: Arc<dyn Synthesizer>,
    player: Mutex<Box<dyn AudioPlayer>>,
    capture: Option<Arc<dyn CaptureControl>>,
    cache: ArtifactCache,
    config: ControllerConfig,
    stop: StopSignal,
    events: Arc<dyn EventSink>,
}

impl SynthesisController {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        player: Box<dyn AudioPlayer>,
        cache: ArtifactCache,
        config: ControllerConfig,
        stop: StopSignal,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("revoice-tts")
            .enable_all()
            .build()
            .map_err(|e| RevoiceError::Other(format!("Failed to start synthesis runtime: {}", e)))?;

        Ok(Self {
            runtime: Some(runtime),
            synthesizer,
            player: Mutex::new(player),
            capture: None,
            cache,
            config,
            stop,
            events,
        })
    }

    /// Capture to duck while playing.
    pub fn with_capture(mut self, capture: Arc<dyn CaptureControl>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn synthesizer(&self) -> &dyn Synthesizer {
        self.synthesizer.as_ref()
    }

    /// Synthesize, post-process and play one live phrase.
    pub fn process_job(&self, job: &SynthesisJob) -> Result<AudioClip> {
        self.run_cycle(&job.phrase.text, &job.voice, job.gain_db, CycleOptions::LIVE)
    }

    /// One full cycle: duck, synthesize with retries, decode, normalize,
    /// apply gain, persist, play. Capture is resumed on every exit path
    /// unless the stop signal was raised.
    ///
    /// # Errors
    /// `SynthesisFailure` when every attempt failed; decode and playback
    /// errors as they occur.
    pub fn run_cycle(
        &self,
        text: &str,
        voice: &VoiceParams,
        gain_db: f32,
        options: CycleOptions,
    ) -> Result<AudioClip> {
        let mut player = self.player.lock().unwrap_or_else(|e| e.into_inner());

        let _duck = match &self.capture {
            Some(capture) if options.duck && self.config.ducking => Some(DuckGuard::engage(
                Arc::clone(capture),
                self.stop.clone(),
                Arc::clone(&self.events),
            )),
            _ => None,
        };

        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| RevoiceError::Other("synthesis runtime is shut down".to_string()))?;
        let synthesized = runtime.block_on(synthesize_with_retries(
            self.synthesizer.as_ref(),
            text,
            voice,
            self.config.policy,
        ))?;

        let raw = match self
            .cache
            .store_raw(&synthesized.audio, self.synthesizer.file_extension())
        {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!("could not write raw artifact: {}", e);
                None
            }
        };

        let decoded = decode_audio(&synthesized.audio)?;
        let gain = if self.synthesizer.applies_volume() {
            gain_db
        } else {
            gain_db + voice.volume_db()
        };
        let (normalized, playback) = post_process(decoded, gain, self.config.playback_rate);

        let saved_path = if options.persist && self.cache.saves_normalized() {
            let stem = raw
                .as_ref()
                .map(|r| r.stem().to_string())
                .unwrap_or_else(artifact_stem);
            match self
                .cache
                .save_normalized(&stem, &normalized, self.config.playback_rate)
            {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("could not save normalized clip: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.events
            .emit(EngineEvent::status("Playing synthesized voice"));
        tracing::debug!(
            duration_secs = playback.duration_secs(),
            attempts = synthesized.attempts,
            "playing clip"
        );
        player.play(&playback)?;

        Ok(AudioClip {
            text: text.to_string(),
            normalized,
            playback,
            saved_path,
        })
    }
}

impl Drop for SynthesisController {
    fn drop(&mut self) {
        // May be dropped from inside an async context (the CLI runs on tokio)
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::activity::{ActivityLog, DeviceEvent};
    use crate::audio::playback::MockPlayer;
    use crate::pipeline::events::CollectorSink;
    use crate::pipeline::types::Phrase;
    use crate::tts::synthesizer::MockSynthesizer;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct LoggedCapture {
        activity: ActivityLog,
        capturing: AtomicBool,
        resumes: AtomicUsize,
    }

    impl LoggedCapture {
        fn new(activity: ActivityLog) -> Arc<Self> {
            activity.record(DeviceEvent::CaptureStarted);
            Arc::new(Self {
                activity,
                capturing: AtomicBool::new(true),
                resumes: AtomicUsize::new(0),
            })
        }
    }

    impl CaptureControl for LoggedCapture {
        fn suspend(&self) -> Result<()> {
            if self.capturing.swap(false, Ordering::SeqCst) {
                self.activity.record(DeviceEvent::CaptureStopped);
            }
            Ok(())
        }

        fn resume(&self) -> Result<()> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            if !self.capturing.swap(true, Ordering::SeqCst) {
                self.activity.record(DeviceEvent::CaptureStarted);
            }
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            self.capturing.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        _dir: TempDir,
        controller: SynthesisController,
        synth: MockSynthesizer,
        player: MockPlayer,
        capture: Arc<LoggedCapture>,
        activity: ActivityLog,
        stop: StopSignal,
        sink: Arc<CollectorSink>,
    }

    fn fixture(synth: MockSynthesizer, player: MockPlayer, keep_raw: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let activity = ActivityLog::new();
        let player = player.with_activity(activity.clone());
        let capture = LoggedCapture::new(activity.clone());
        let stop = StopSignal::new();
        let sink = Arc::new(CollectorSink::new());
        let controller = SynthesisController::new(
            Arc::new(synth.clone()),
            Box::new(player.clone()),
            ArtifactCache::new(dir.path(), keep_raw, true),
            ControllerConfig {
                policy: RetryPolicy::new(3, Duration::ZERO),
                ducking: true,
                playback_rate: 16000,
            },
            stop.clone(),
            sink.clone(),
        )
        .unwrap()
        .with_capture(capture.clone());

        Fixture {
            _dir: dir,
            controller,
            synth,
            player,
            capture,
            activity,
            stop,
            sink,
        }
    }

    fn job(text: &str) -> SynthesisJob {
        SynthesisJob {
            phrase: Phrase {
                text: text.to_string(),
                sequence: 0,
            },
            voice: VoiceParams::default(),
            gain_db: 0.0,
        }
    }

    #[test]
    fn test_cycle_ducks_around_playback() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), false);
        let clip = f.controller.process_job(&job("hello world")).unwrap();

        assert_eq!(clip.text, "hello world");
        assert_eq!(clip.playback.channels, 1);
        assert_eq!(clip.playback.sample_rate, 16000);
        assert_eq!(f.player.play_count(), 1);
        assert_eq!(f.synth.calls(), 1);
        assert!(f.capture.is_capturing());
        assert!(!f.activity.capture_overlapped_playback());
        assert_eq!(
            f.activity.events(),
            vec![
                DeviceEvent::CaptureStarted,
                DeviceEvent::CaptureStopped,
                DeviceEvent::PlaybackStarted,
                DeviceEvent::PlaybackFinished,
                DeviceEvent::CaptureStarted,
            ]
        );
    }

    #[test]
    fn test_normalized_clip_saved_and_raw_removed() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), false);
        let clip = f.controller.process_job(&job("hello world")).unwrap();

        let saved = clip.saved_path.unwrap();
        assert!(saved.exists());
        let files: Vec<_> = std::fs::read_dir(saved.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files, vec![saved]);
    }

    #[test]
    fn test_keep_raw_leaves_artifact() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), true);
        let clip = f.controller.process_job(&job("hello world")).unwrap();
        let saved = clip.saved_path.unwrap();
        assert!(saved.exists());
        let names: Vec<String> = std::fs::read_dir(saved.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.ends_with("_raw.wav")));
    }

    #[test]
    fn test_synthesis_failure_drops_phrase_and_resumes() {
        let f = fixture(MockSynthesizer::new().with_failure(), MockPlayer::new(), false);
        let result = f.controller.process_job(&job("hello world"));

        assert!(matches!(
            result,
            Err(RevoiceError::SynthesisFailure { attempts: 3, .. })
        ));
        assert_eq!(f.synth.calls(), 3);
        assert_eq!(f.player.play_count(), 0);
        assert!(f.capture.is_capturing());
    }

    #[test]
    fn test_success_on_third_attempt_plays_once() {
        let f = fixture(MockSynthesizer::new().with_failures(2), MockPlayer::new(), false);
        f.controller.process_job(&job("hello world")).unwrap();
        assert_eq!(f.synth.calls(), 3);
        assert_eq!(f.player.play_count(), 1);
    }

    #[test]
    fn test_playback_failure_still_resumes() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new().with_failure(), false);
        let result = f.controller.process_job(&job("hello world"));
        assert!(matches!(result, Err(RevoiceError::Playback { .. })));
        assert!(f.capture.is_capturing());
        assert!(!f.activity.capture_overlapped_playback());
    }

    #[test]
    fn test_decode_failure_still_resumes() {
        let synth = MockSynthesizer::new().with_audio(vec![0u8; 64]);
        let f = fixture(synth, MockPlayer::new(), false);
        assert!(f.controller.process_job(&job("hello world")).is_err());
        assert!(f.capture.is_capturing());
    }

    #[test]
    fn test_stop_during_cycle_leaves_capture_suspended() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), false);
        f.stop.raise();
        f.controller.process_job(&job("hello world")).unwrap();
        assert_eq!(f.player.play_count(), 1);
        assert!(!f.capture.is_capturing());
        assert_eq!(f.capture.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_shot_without_ducking() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), false);
        let options = CycleOptions {
            duck: false,
            persist: false,
        };
        let clip = f
            .controller
            .run_cycle("just text", &VoiceParams::default(), 0.0, options)
            .unwrap();
        assert!(clip.saved_path.is_none());
        assert_eq!(f.capture.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_gain_applied_to_playback_only() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), false);
        let mut quiet = job("hello world");
        quiet.gain_db = -20.0;
        let clip = f.controller.process_job(&quiet).unwrap();
        assert!(clip.normalized.peak() > 0.9);
        assert!(clip.playback.peak() < 0.2);
    }

    #[test]
    fn test_playing_status_emitted() {
        let f = fixture(MockSynthesizer::new(), MockPlayer::new(), false);
        f.controller.process_job(&job("hello world")).unwrap();
        assert!(
            f.sink
                .events()
                .contains(&EngineEvent::status("Playing synthesized voice"))
        );
    }
}
