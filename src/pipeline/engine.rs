//! Engine lifecycle: owns the stages, starts and stops them, and serves
//! one-shot synthesis requests.

use crate::audio::device::AudioBackend;
use crate::audio::dsp::{DecodedAudio, to_playback_format};
use crate::audio::frame_queue::FrameQueue;
use crate::audio::gate::NoiseGate;
use crate::audio::recorder::AudioSourceConfig;
use crate::audio::wav;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::defaults;
use crate::diagnostics;
use crate::error::{Result, RevoiceError};
use crate::pipeline::cache::{ArtifactCache, timestamp};
use crate::pipeline::controller::{ControllerConfig, CycleOptions, SynthesisController};
use crate::pipeline::ducking::CaptureControl;
use crate::pipeline::error::{ErrorReporter, SinkReporter};
use crate::pipeline::events::{EngineEvent, EventSink};
use crate::pipeline::frame_source::{CaptureHandle, FrameSource, FrameSourceConfig};
use crate::pipeline::segmentation_station::SegmentationStation;
use crate::pipeline::segmenter::{Segmenter, SegmenterConfig};
use crate::pipeline::signal::StopSignal;
use crate::pipeline::station::StationRunner;
use crate::pipeline::synthesis_station::SynthesisStation;
use crate::pipeline::types::{AudioClip, EngineState, Phrase};
use crate::stt::recognizer::StreamingRecognizer;
use crate::tts::retry::RetryPolicy;
use crate::tts::synthesizer::{Synthesizer, VoiceParams};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::thread;
use std::time::{Duration, Instant};

/// What `stop()` cleaned up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    pub frames_drained: usize,
    pub phrases_drained: usize,
    /// The synthesis thread was still finishing a cycle and was left to complete.
    pub synthesis_detached: bool,
}

struct Session {
    frame_source: FrameSource,
    segmentation: StationRunner<SegmentationStation>,
    synthesis: StationRunner<SynthesisStation>,
}

/// Real-time voice replacement engine.
///
/// An explicit value owned by the caller. Configuration is frozen while
/// running; change it with `stop()`, `reconfigure()`, `start()`.
pub struct VoiceEngine {
    config: Config,
    backend: Arc<dyn AudioBackend>,
    synthesizer: Arc<dyn Synthesizer>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    recognizer: Option<Box<dyn StreamingRecognizer>>,
    state: EngineState,
    stop_signal: StopSignal,
    capture: CaptureHandle,
    frame_queue: FrameQueue,
    phrase_tx: Sender<Phrase>,
    phrase_rx: Receiver<Phrase>,
    controller: Option<Arc<SynthesisController>>,
    session: Option<Session>,
    detached: Option<StationRunner<SynthesisStation>>,
    sequence: Arc<AtomicU64>,
    last_clip: Option<AudioClip>,
}

impl VoiceEngine {
    pub fn new(
        config: Config,
        backend: Arc<dyn AudioBackend>,
        synthesizer: Arc<dyn Synthesizer>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let frame_queue = FrameQueue::bounded(config.audio.queue_capacity);
        let (phrase_tx, phrase_rx) = unbounded();
        Self {
            config,
            backend,
            synthesizer,
            events,
            clock: Arc::new(SystemClock),
            recognizer: None,
            state: EngineState::Stopped,
            stop_signal: StopSignal::new(),
            capture: CaptureHandle::new(),
            frame_queue,
            phrase_tx,
            phrase_rx,
            controller: None,
            session: None,
            detached: None,
            sequence: Arc::new(AtomicU64::new(0)),
            last_clip: None,
        }
    }

    /// Time source for the silence and throttle timers.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Whether the input device is currently delivering audio.
    pub fn capture_active(&self) -> bool {
        self.capture.is_capturing()
    }

    pub fn pending_frames(&self) -> usize {
        self.frame_queue.len()
    }

    pub fn pending_phrases(&self) -> usize {
        self.phrase_rx.len()
    }

    /// Frames evicted from the full frame queue since the engine was created.
    pub fn frames_dropped(&self) -> u64 {
        self.frame_queue.dropped()
    }

    fn ensure_stopped(&self) -> Result<()> {
        if self.state == EngineState::Stopped {
            Ok(())
        } else {
            Err(RevoiceError::EngineBusy {
                state: self.state.to_string(),
            })
        }
    }

    /// Install a recognizer.
    ///
    /// # Errors
    /// `EngineBusy` while running.
    pub fn set_recognizer(&mut self, recognizer: Box<dyn StreamingRecognizer>) -> Result<()> {
        self.ensure_stopped()?;
        tracing::info!(recognizer = recognizer.name(), "recognizer installed");
        self.recognizer = Some(recognizer);
        Ok(())
    }

    /// Load the recognizer named by the configuration.
    pub fn load_recognizer(&mut self) -> Result<()> {
        self.ensure_stopped()?;
        let recognizer =
            crate::stt::load_recognizer(&self.config.stt, self.config.audio.sample_rate)?;
        self.set_recognizer(recognizer)
    }

    /// Replace the configuration.
    ///
    /// # Errors
    /// `EngineBusy` unless stopped; validation errors for a bad config.
    pub fn reconfigure(&mut self, config: Config) -> Result<()> {
        self.ensure_stopped()?;
        config.validate()?;
        self.reap_detached();

        let model_changed = config.stt != self.config.stt;
        if config.audio.queue_capacity != self.config.audio.queue_capacity {
            self.frame_queue = FrameQueue::bounded(config.audio.queue_capacity);
        }
        self.config = config;
        self.controller = None;
        tracing::debug!("engine reconfigured");

        if model_changed && self.config.stt.model.is_some() {
            self.recognizer = None;
            self.load_recognizer()?;
        }
        Ok(())
    }

    /// `reconfigure(config)` then `start()`.
    pub fn start_with(&mut self, config: Config) -> Result<()> {
        self.reconfigure(config)?;
        self.start()
    }

    fn controller(&mut self) -> Result<Arc<SynthesisController>> {
        if let Some(controller) = &self.controller {
            return Ok(Arc::clone(controller));
        }
        let player = self
            .backend
            .open_output(self.config.audio.output_device.as_deref())?;
        let capture: Arc<dyn CaptureControl> = Arc::new(self.capture.clone());
        let controller = SynthesisController::new(
            Arc::clone(&self.synthesizer),
            player,
            ArtifactCache::from_config(&self.config.cache),
            ControllerConfig {
                policy: RetryPolicy::from_config(&self.config.tts),
                ducking: self.config.playback.ducking,
                playback_rate: self.config.audio.sample_rate,
            },
            self.stop_signal.clone(),
            Arc::clone(&self.events),
        )?
        .with_capture(capture);
        let controller = Arc::new(controller);
        self.controller = Some(Arc::clone(&controller));
        Ok(controller)
    }

    /// Join a synthesis thread left running by an earlier `stop()`.
    fn reap_detached(&mut self) {
        if let Some(runner) = self.detached.take() {
            tracing::debug!("waiting for previous synthesis cycle to finish");
            if let Err(msg) = runner.join() {
                tracing::error!("{}", msg);
            }
        }
    }

    fn report(&self, stage: &str, error: &RevoiceError) {
        tracing::error!(stage, "{}", error);
        self.events.emit(EngineEvent::error(stage, error.to_string()));
    }

    /// Start the live pipeline.
    ///
    /// Input device failures are reported and the engine runs without
    /// capture; one-shot synthesis keeps working.
    ///
    /// # Errors
    /// `ModelUnavailable` if no recognizer is loaded (nothing is spawned),
    /// `DependencyMissing` if a required backend is absent.
    pub fn start(&mut self) -> Result<()> {
        if self.state != EngineState::Stopped {
            tracing::warn!(state = %self.state, "engine already started");
            return Ok(());
        }
        if self.recognizer.is_none() {
            return Err(RevoiceError::ModelUnavailable);
        }
        diagnostics::ensure_engine_ready(&self.config, self.synthesizer.file_extension())?;
        let voice = self.config.voice_params()?;

        self.state = EngineState::Starting;
        self.reap_detached();
        self.stop_signal.clear();

        let controller = match self.controller() {
            Ok(controller) => controller,
            Err(e) => {
                self.state = EngineState::Stopped;
                return Err(e);
            }
        };
        let Some(recognizer) = self.recognizer.take() else {
            self.state = EngineState::Stopped;
            return Err(RevoiceError::ModelUnavailable);
        };

        // Stale items from a session that stopped mid-flight
        self.frame_queue.drain();
        let _ = self.phrase_rx.try_iter().count();

        let audio = &self.config.audio;
        let source_config = AudioSourceConfig {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            device: audio.input_device.clone(),
        };
        match self.backend.open_input(&source_config) {
            Ok(source) => self.capture.attach(source),
            Err(e) => self.report("capture", &e),
        }

        let mut frame_source = FrameSource::new(
            self.capture.clone(),
            self.frame_queue.producer(),
            FrameSourceConfig {
                sample_rate: audio.sample_rate,
                frame_ms: audio.frame_ms,
                poll_interval: Duration::from_millis(defaults::CAPTURE_POLL_MS),
                gate: NoiseGate::new(audio.noise_gate, audio.noise_gate_threshold),
            },
            Arc::clone(&self.events),
        );
        if self.capture.has_device()
            && let Err(e) = frame_source.start()
        {
            self.report("capture", &e);
        }

        let segmentation_config = &self.config.segmentation;
        let poll = segmentation_config.poll_interval();
        let reporter: Arc<dyn ErrorReporter> = Arc::new(SinkReporter::new(Arc::clone(&self.events)));

        let segmenter = Segmenter::with_sequence(
            SegmenterConfig::from_config(segmentation_config),
            Arc::clone(&self.clock),
            Arc::clone(&self.sequence),
        );
        let segmentation = StationRunner::spawn(
            SegmentationStation::new(
                recognizer,
                segmenter,
                Arc::clone(&self.events),
                segmentation_config.print_partials,
            ),
            self.frame_queue.receiver(),
            Some(self.phrase_tx.clone()),
            self.stop_signal.clone(),
            poll,
            Arc::clone(&reporter),
        );

        let synthesis = StationRunner::spawn(
            SynthesisStation::new(
                controller,
                voice,
                self.config.playback.gain_db,
                self.stop_signal.clone(),
                Arc::clone(&self.events),
            ),
            self.phrase_rx.clone(),
            None,
            self.stop_signal.clone(),
            poll,
            reporter,
        );

        self.session = Some(Session {
            frame_source,
            segmentation,
            synthesis,
        });
        self.state = EngineState::Running;
        tracing::info!("engine started");
        self.events.emit(EngineEvent::status("Listening"));
        Ok(())
    }

    /// Stop the live pipeline. Safe to call at any time, any number of times.
    ///
    /// An in-flight synthesis cycle finishes but capture is not resumed
    /// afterwards. Both queues are empty when this returns.
    pub fn stop(&mut self) -> StopReport {
        let Some(session) = self.session.take() else {
            return StopReport::default();
        };
        let Session {
            mut frame_source,
            segmentation,
            synthesis,
        } = session;

        self.state = EngineState::Stopping;
        self.stop_signal.raise();
        frame_source.stop();

        match segmentation.join() {
            Ok(station) => self.recognizer = Some(station.into_recognizer()),
            Err(msg) => {
                tracing::error!("{}", msg);
                self.events.emit(EngineEvent::error("segmentation", msg));
            }
        }

        let deadline = Instant::now() + Duration::from_millis(defaults::STOP_GRACE_MS);
        while !synthesis.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let synthesis_detached = !synthesis.is_finished();
        if synthesis_detached {
            // Joined on the next start() or on drop
            tracing::warn!("synthesis cycle still running, detaching");
            self.detached = Some(synthesis);
        } else if let Err(msg) = synthesis.join() {
            tracing::error!("{}", msg);
            self.events.emit(EngineEvent::error("synthesis", msg));
        }

        let report = StopReport {
            frames_drained: self.frame_queue.drain(),
            phrases_drained: self.phrase_rx.try_iter().count(),
            synthesis_detached,
        };
        drop(self.capture.detach());

        self.state = EngineState::Stopped;
        tracing::info!(?report, "engine stopped");
        self.events.emit(EngineEvent::status("Stopped"));
        report
    }

    /// Synthesize `text` and play it now, outside the live phrase stream.
    ///
    /// Uses the configured voice unless `voice` is given. While a session is
    /// running the live capture is ducked around playback. The normalized
    /// clip becomes the "last clip"; with `export.autosave` it is also
    /// written to the export directory.
    ///
    /// # Errors
    /// `EmptyText` for blank input, otherwise the cycle's error.
    pub fn synthesize_and_play(
        &mut self,
        text: &str,
        voice: Option<VoiceParams>,
    ) -> Result<AudioClip> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RevoiceError::EmptyText);
        }
        let voice = match voice {
            Some(voice) => voice,
            None => self.config.voice_params()?,
        };
        let controller = self.controller()?;
        let options = CycleOptions {
            duck: self.state == EngineState::Running,
            persist: false,
        };

        let clip = controller.run_cycle(text, &voice, self.config.playback.gain_db, options)?;

        if self.config.export.autosave {
            match self.export_audio(&clip.normalized, &export_snippet(text)) {
                Ok(path) => self
                    .events
                    .emit(EngineEvent::status(format!("Saved {}", path.display()))),
                Err(e) => self.report("export", &e),
            }
        } else {
            self.events.emit(EngineEvent::status("Played (not saved)"));
        }

        self.last_clip = Some(clip.clone());
        Ok(clip)
    }

    pub fn last_clip(&self) -> Option<&AudioClip> {
        self.last_clip.as_ref()
    }

    /// Write the last one-shot clip as `<timestamp>_manual.wav`.
    ///
    /// # Errors
    /// `NoClip` if nothing has been synthesized yet.
    pub fn export_last_clip(&self) -> Result<PathBuf> {
        let clip = self.last_clip.as_ref().ok_or(RevoiceError::NoClip)?;
        let path = self.export_audio(&clip.normalized, "manual")?;
        self.events
            .emit(EngineEvent::status(format!("Saved {}", path.display())));
        Ok(path)
    }

    fn export_audio(&self, audio: &DecodedAudio, suffix: &str) -> Result<PathBuf> {
        let export = &self.config.export;
        fs::create_dir_all(&export.dir)?;
        let path = export
            .dir
            .join(format!("{}_{}.wav", timestamp(), suffix));
        wav::write_wav(&path, &to_playback_format(audio, export.sample_rate))?;
        tracing::info!(path = %path.display(), "clip exported");
        Ok(path)
    }
}

impl Drop for VoiceEngine {
    fn drop(&mut self) {
        self.stop();
        self.reap_detached();
    }
}

/// File-name-safe prefix of `text` for exported clips.
pub fn export_snippet(text: &str) -> String {
    let snippet: String = text
        .chars()
        .take(defaults::EXPORT_SNIPPET_CHARS)
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    if snippet.is_empty() {
        "tts".to_string()
    } else {
        snippet
    }
}
