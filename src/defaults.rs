//! Default configuration constants for revoice.
//!
//! Shared by the configuration file, the engine and the CLI so every entry point
//! starts from the same tuning.

/// Default capture sample rate in Hz.
///
/// 16kHz is what streaming recognizers expect and keeps recognizer load low.
pub const SAMPLE_RATE: u32 = 16000;

/// Default capture channel count. Frames are always downmixed to mono.
pub const CHANNELS: u16 = 1;

/// Duration of one audio frame in milliseconds.
pub const FRAME_MS: u32 = 100;

/// Capacity of the frame queue between capture and segmentation.
///
/// 80 frames of 100ms is eight seconds of buffered speech.
pub const FRAME_QUEUE_CAPACITY: usize = 80;

/// How often the capture loop drains the device buffer, in milliseconds.
pub const CAPTURE_POLL_MS: u64 = 16;

/// RMS level below which a frame is treated as silence and discarded.
///
/// Tuned for a close microphone. Raising it cuts recognizer load during pauses
/// but may clip very quiet speech onsets.
pub const NOISE_GATE_THRESHOLD: f32 = 0.005;

/// Shortest phrase (in characters) worth synthesizing.
pub const MIN_PHRASE_LEN: usize = 6;

/// Silence after the last partial before an utterance is force-finalized.
pub const SILENCE_FINALIZE_SECS: f64 = 0.8;

/// Minimum spacing between two surfaced partial transcripts.
pub const PARTIAL_THROTTLE_SECS: f64 = 0.25;

/// How long the segmentation and synthesis loops wait for input before
/// checking timers and the stop signal.
pub const QUEUE_POLL_MS: u64 = 200;

/// How long `stop()` waits for an in-flight synthesis cycle before detaching it.
pub const STOP_GRACE_MS: u64 = 2000;

/// Upper bound for any configured timing value, in seconds.
pub const MAX_TIMING_SECS: f64 = 3600.0;

/// Synthesis attempts per phrase.
pub const TTS_MAX_RETRIES: u32 = 3;

/// Base backoff between synthesis attempts; attempt `n` waits `n` times this.
pub const TTS_BACKOFF_SECS: f64 = 1.0;

/// Default synthesis voice.
pub const DEFAULT_VOICE: &str = "alloy";

/// Default synthesis endpoint (OpenAI-compatible speech API).
pub const TTS_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";

/// Default synthesis model name sent to the endpoint.
pub const TTS_MODEL: &str = "tts-1";

/// Environment variable holding the synthesis API key.
pub const TTS_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// HTTP timeout for one synthesis request.
pub const TTS_TIMEOUT_SECS: u64 = 30;

/// Headroom left by peak normalization, in dB below full scale.
pub const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// Sample rate for exported clips.
pub const EXPORT_SAMPLE_RATE: u32 = 44100;

/// Characters of the phrase used in autosaved clip file names.
pub const EXPORT_SNIPPET_CHARS: usize = 30;

/// Default recognizer language ("auto" lets Whisper detect it).
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Minimum new audio between two partial decodes of the Whisper adapter.
pub const PARTIAL_STRIDE_MS: u32 = 1000;

/// Longest utterance the Whisper adapter buffers before declaring it final.
pub const MAX_UTTERANCE_SECS: u32 = 15;
