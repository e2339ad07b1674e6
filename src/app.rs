//! Application entry points.
//!
//! Wires the real audio backend, recognizer and synthesizer into a
//! [`VoiceEngine`] and drives it from the command line.

use crate::audio::capture::suppress_audio_warnings;
use crate::audio::device::{AudioBackend, default_backend};
use crate::config::Config;
use crate::error::{Result, RevoiceError};
use crate::output::TerminalSink;
use crate::pipeline::engine::VoiceEngine;
use crate::pipeline::events::EventSink;
use crate::tts::default_synthesizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub model: Option<PathBuf>,
    pub voice: Option<String>,
}

impl Overrides {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(device) = self.input_device {
            config.audio.input_device = Some(device);
        }
        if let Some(device) = self.output_device {
            config.audio.output_device = Some(device);
        }
        if let Some(model) = self.model {
            config.stt.model = Some(model);
        }
        if let Some(voice) = self.voice {
            config.tts.voice = voice;
        }
        config
    }
}

/// Load configuration with the following precedence:
/// 1. Custom config path (if provided, must exist)
/// 2. Default config path (~/.config/revoice/config.toml), if present
/// 3. Built-in defaults
///
/// Environment overrides apply on top of whichever was loaded.
pub fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

fn build_engine(config: Config, quiet: bool) -> Result<VoiceEngine> {
    config.validate()?;
    let backend = default_backend()?;
    let synthesizer = default_synthesizer(&config.tts)?;
    let events: Arc<dyn EventSink> = Arc::new(TerminalSink::new(quiet));
    Ok(VoiceEngine::new(config, backend, synthesizer, events))
}

fn join_error(e: tokio::task::JoinError) -> RevoiceError {
    RevoiceError::Other(format!("worker task failed: {}", e))
}

/// Block until Ctrl+C or until `duration` has passed.
async fn wait_for_shutdown(duration: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    match duration {
        Some(duration) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = tokio::time::sleep(duration) => {
                    tracing::info!("run duration elapsed");
                }
            }
        }
        None => ctrl_c.await,
    }
}

/// Run the live pipeline until interrupted.
///
/// Loading the model and starting/stopping the engine block, so they run on
/// the blocking pool; the async side only waits for the shutdown trigger.
pub async fn run_live(config: Config, duration: Option<Duration>, quiet: bool) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    let mut engine = build_engine(config, quiet)?;
    if !quiet {
        eprintln!("Loading recognizer...");
    }
    let mut engine = tokio::task::spawn_blocking(move || -> Result<VoiceEngine> {
        engine.load_recognizer()?;
        engine.start()?;
        Ok(engine)
    })
    .await
    .map_err(join_error)??;

    if !quiet {
        eprintln!("Press Ctrl+C to stop.");
    }
    wait_for_shutdown(duration).await;

    let report = tokio::task::spawn_blocking(move || engine.stop())
        .await
        .map_err(join_error)?;
    tracing::debug!(
        frames = report.frames_drained,
        phrases = report.phrases_drained,
        detached = report.synthesis_detached,
        "engine stopped"
    );
    Ok(())
}

/// Synthesize and play `text` once. Returns the exported file, if any.
pub async fn say(mut config: Config, text: String, save: bool, quiet: bool) -> Result<Option<PathBuf>> {
    suppress_audio_warnings();

    if !save {
        config.export.autosave = false;
    }
    let export_dir = config.export.dir.clone();
    let mut engine = build_engine(config, quiet)?;
    let before = std::time::SystemTime::now();

    tokio::task::spawn_blocking(move || engine.synthesize_and_play(&text, None).map(|_| ()))
        .await
        .map_err(join_error)??;

    if !save {
        return Ok(None);
    }
    Ok(newest_export_since(&export_dir, before))
}

/// The most recently written `.wav` in `dir` at or after `since`.
fn newest_export_since(dir: &Path, since: std::time::SystemTime) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "wav"))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            (modified >= since).then(|| (modified, entry.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

/// Print input and output devices.
pub fn list_devices() -> Result<()> {
    suppress_audio_warnings();
    let backend = default_backend()?;
    print_devices(backend.as_ref())
}

fn print_devices(backend: &dyn AudioBackend) -> Result<()> {
    let inputs = backend.input_devices()?;
    let outputs = backend.output_devices()?;

    if inputs.is_empty() {
        println!("No audio input devices found");
    } else {
        println!("Audio input devices:");
        for (idx, device) in inputs.iter().enumerate() {
            println!("  [{}] {}", idx, device);
        }
    }
    println!();
    if outputs.is_empty() {
        println!("No audio output devices found");
    } else {
        println!("Audio output devices:");
        for (idx, device) in outputs.iter().enumerate() {
            println!("  [{}] {}", idx, device);
        }
    }
    Ok(())
}
