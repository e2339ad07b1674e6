//! Data types passed between pipeline stages.

use crate::audio::dsp::DecodedAudio;
use crate::tts::synthesizer::VoiceParams;
use std::fmt;
use std::path::PathBuf;

/// A finalized utterance ready for synthesis.
///
/// Never shorter than the configured minimum phrase length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub text: String,
    /// Monotonic per engine; survives restarts.
    pub sequence: u64,
}

/// What the recognizer reported after one accepted frame (or a poll timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Current hypothesis; empty while nothing is being said.
    Partial(String),
    /// The recognizer closed the utterance itself.
    FinalizedBySource(String),
    /// No frame arrived within the poll interval.
    Silence,
}

/// Everything the controller needs for one synthesis cycle.
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub phrase: Phrase,
    pub voice: VoiceParams,
    pub gain_db: f32,
}

/// A synthesized, post-processed clip.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub text: String,
    /// Loudness-normalized decode at the synthesizer's native format.
    pub normalized: DecodedAudio,
    /// Gain-adjusted mono form that was sent to the output device.
    pub playback: DecodedAudio,
    /// Where the normalized WAV was persisted, if it was.
    pub saved_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
