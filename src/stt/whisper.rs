//! Whisper-based streaming recognizer.
//!
//! Whisper decodes whole clips, so this adapter buffers the voiced audio of the
//! current utterance, re-decodes it at most every `partial_stride` to produce
//! partial hypotheses, and decodes the full buffer when the utterance is
//! finalized.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake at build time).

use crate::defaults;
use crate::error::{Result, RevoiceError};
use crate::stt::recognizer::StreamingRecognizer;
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper recognizer.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es") or "auto"
    pub language: String,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
    pub sample_rate: u32,
    /// Minimum new audio between two partial decodes.
    pub partial_stride_ms: u32,
    /// Utterances longer than this are declared final.
    pub max_utterance_secs: u32,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
            sample_rate: defaults::SAMPLE_RATE,
            partial_stride_ms: defaults::PARTIAL_STRIDE_MS,
            max_utterance_secs: defaults::MAX_UTTERANCE_SECS,
        }
    }
}

fn model_name_of(config: &WhisperConfig) -> String {
    config
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn check_model_exists(config: &WhisperConfig) -> Result<()> {
    if config.model_path.exists() {
        Ok(())
    } else {
        Err(RevoiceError::ModelNotFound {
            path: config.model_path.to_string_lossy().to_string(),
        })
    }
}

/// Buffering state shared by the real and stub recognizers.
#[derive(Debug, Default)]
struct Utterance {
    audio: Vec<f32>,
    since_decode: usize,
    partial: String,
}

impl Utterance {
    fn push(&mut self, samples: &[i16]) {
        self.audio.extend(convert_audio(samples));
        self.since_decode += samples.len();
    }

    fn clear(&mut self) {
        self.audio.clear();
        self.since_decode = 0;
        self.partial.clear();
    }

    /// True once `stride` new samples arrived since the last decode attempt.
    ///
    /// Resets the counter whether or not the decode that follows succeeds.
    fn decode_due(&mut self, stride: usize) -> bool {
        if self.since_decode < stride {
            return false;
        }
        self.since_decode = 0;
        true
    }
}

/// Convert i16 audio samples to f32 normalized to [-1.0, 1.0]
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Whisper streaming recognizer.
#[cfg(feature = "whisper")]
pub struct WhisperRecognizer {
    context: WhisperContext,
    config: WhisperConfig,
    model_name: String,
    utterance: Utterance,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

#[cfg(feature = "whisper")]
impl WhisperRecognizer {
    /// Load a Whisper model.
    ///
    /// # Errors
    /// `ModelNotFound` if the file doesn't exist, `Recognition` if loading fails.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        check_model_exists(&config)?;
        let model_name = model_name_of(&config);

        let mut context_params = WhisperContextParameters::default();
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| RevoiceError::Recognition {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| RevoiceError::Recognition {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        tracing::info!(model = %model_name, "whisper model loaded");

        Ok(Self {
            context,
            config,
            model_name,
            utterance: Utterance::default(),
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    fn decode(&self, audio: &[f32]) -> Result<String> {
        if audio.is_empty() {
            return Ok(String::new());
        }

        // whisper.cpp rejects clips shorter than one second
        let min_len = self.config.sample_rate as usize + self.config.sample_rate as usize / 10;
        let padded;
        let input = if audio.len() < min_len {
            let mut buffer = audio.to_vec();
            buffer.resize(min_len, 0.0);
            padded = buffer;
            &padded
        } else {
            audio
        };

        let mut state = self
            .context
            .create_state()
            .map_err(|e| RevoiceError::Recognition {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_single_segment(true);

        state
            .full(params, input)
            .map_err(|e| RevoiceError::Recognition {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }
        Ok(text.trim().to_string())
    }

    fn decode_or_log(&self, audio: &[f32]) -> String {
        self.decode(audio).unwrap_or_else(|e| {
            tracing::warn!("whisper decode failed: {}", e);
            String::new()
        })
    }
}

#[cfg(feature = "whisper")]
impl StreamingRecognizer for WhisperRecognizer {
    fn accept(&mut self, samples: &[i16]) -> Result<bool> {
        self.utterance.push(samples);

        let max_len = self.config.max_utterance_secs as usize * self.config.sample_rate as usize;
        if max_len > 0 && self.utterance.audio.len() >= max_len {
            return Ok(true);
        }

        let stride =
            (self.config.partial_stride_ms as usize * self.config.sample_rate as usize) / 1000;
        if self.utterance.decode_due(stride) {
            self.utterance.partial = self.decode(&self.utterance.audio)?;
        }
        Ok(false)
    }

    fn partial_result(&mut self) -> String {
        self.utterance.partial.clone()
    }

    fn final_result(&mut self) -> String {
        let text = self.decode_or_log(&self.utterance.audio);
        self.utterance.clear();
        text
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Whisper recognizer placeholder (without the `whisper` feature).
///
/// Construction always fails; the type exists so callers compile unchanged.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperRecognizer {
    config: WhisperConfig,
    model_name: String,
    utterance: Utterance,
}

#[cfg(not(feature = "whisper"))]
impl WhisperRecognizer {
    pub fn new(config: WhisperConfig) -> Result<Self> {
        check_model_exists(&config)?;
        Err(RevoiceError::DependencyMissing {
            dependency: "whisper".to_string(),
            hint: "this binary was built without speech recognition; rebuild with --features whisper (needs cmake)".to_string(),
        })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl StreamingRecognizer for WhisperRecognizer {
    fn accept(&mut self, samples: &[i16]) -> Result<bool> {
        self.utterance.push(samples);
        Ok(false)
    }

    fn partial_result(&mut self) -> String {
        String::new()
    }

    fn final_result(&mut self) -> String {
        self.utterance.clear();
        String::new()
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_config_default() {
        let config = WhisperConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/ggml-base.bin"));
        assert_eq!(config.language, defaults::AUTO_LANGUAGE);
        assert_eq!(config.threads, None);
        assert_eq!(config.partial_stride_ms, 1000);
        assert_eq!(config.max_utterance_secs, 15);
    }

    #[test]
    fn test_new_fails_for_missing_model() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/nonexistent/model.bin"),
            ..Default::default()
        };

        match WhisperRecognizer::new(config) {
            Err(RevoiceError::ModelNotFound { path }) => {
                assert_eq!(path, "/nonexistent/model.bin");
            }
            _ => panic!("Expected ModelNotFound error"),
        }
    }

    #[test]
    fn test_invalid_model_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("ggml-base.bin");
        std::fs::write(&model_path, b"fake model data").unwrap();

        let result = WhisperRecognizer::new(WhisperConfig {
            model_path,
            ..Default::default()
        });

        #[cfg(feature = "whisper")]
        assert!(matches!(result, Err(RevoiceError::Recognition { .. })));

        #[cfg(not(feature = "whisper"))]
        assert!(matches!(
            result,
            Err(RevoiceError::DependencyMissing { .. })
        ));
    }

    #[test]
    fn test_model_name_from_path() {
        let config = WhisperConfig {
            model_path: PathBuf::from("/models/ggml-small.en.bin"),
            ..Default::default()
        };
        assert_eq!(model_name_of(&config), "ggml-small.en");
    }

    #[test]
    fn test_convert_audio_i16_to_f32() {
        let samples = vec![0i16, 16384, -16384, 32767, -32768];
        let converted = convert_audio(&samples);

        assert_eq!(converted.len(), samples.len());
        assert_eq!(converted[0], 0.0);
        assert!((converted[1] - 0.5).abs() < 0.01);
        assert!((converted[2] + 0.5).abs() < 0.01);
        assert!((converted[3] - 0.999969).abs() < 0.01);
        assert_eq!(converted[4], -1.0);
    }

    #[test]
    fn test_decode_due_once_per_stride() {
        let mut utterance = Utterance::default();
        utterance.push(&[0; 800]);
        assert!(!utterance.decode_due(1600));
        utterance.push(&[0; 800]);
        assert!(utterance.decode_due(1600));
        // A failed decode must not make every following frame due again
        utterance.push(&[0; 100]);
        assert!(!utterance.decode_due(1600));
        assert_eq!(utterance.audio.len(), 1700);
    }

    #[test]
    fn test_utterance_buffer_clears() {
        let mut utterance = Utterance::default();
        utterance.push(&[100; 1600]);
        utterance.partial = "hola".to_string();
        assert_eq!(utterance.audio.len(), 1600);
        assert_eq!(utterance.since_decode, 1600);
        utterance.clear();
        assert!(utterance.audio.is_empty());
        assert!(utterance.partial.is_empty());
    }

    #[test]
    fn test_whisper_recognizer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WhisperRecognizer>();
    }
}
