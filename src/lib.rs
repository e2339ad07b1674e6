//! revoice - Real-time voice replacement
//!
//! Captures the microphone, transcribes it into phrases, resynthesizes each
//! phrase with a text-to-speech voice and plays it back, suspending capture
//! while the synthesized voice is playing.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod diagnostics;
pub mod error;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod stt;
pub mod tts;

// Composition root - needs everything
#[cfg(all(feature = "cli", feature = "cpal-audio"))]
pub mod app;

// Core traits (capture → recognize → synthesize → play)
pub use audio::device::AudioBackend;
pub use audio::playback::AudioPlayer;
pub use audio::recorder::AudioSource;
pub use pipeline::events::{EngineEvent, EventSink};
pub use stt::recognizer::StreamingRecognizer;
pub use tts::synthesizer::{Synthesizer, VoiceParams};

// Engine
pub use pipeline::engine::VoiceEngine;
pub use pipeline::types::{AudioClip, EngineState, Phrase};

// Error handling
pub use error::{Result, RevoiceError};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
