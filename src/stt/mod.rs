pub mod recognizer;
pub mod whisper;

use crate::config::SttConfig;
use crate::error::{Result, RevoiceError};
use recognizer::StreamingRecognizer;
use whisper::{WhisperConfig, WhisperRecognizer};

/// Load the configured recognizer model.
///
/// # Errors
/// `ModelUnavailable` when no model is configured, `ModelNotFound` when the
/// path does not exist, `DependencyMissing` when Whisper is not compiled in.
pub fn load_recognizer(config: &SttConfig, sample_rate: u32) -> Result<Box<dyn StreamingRecognizer>> {
    let model_path = config.model.clone().ok_or(RevoiceError::ModelUnavailable)?;
    let recognizer = WhisperRecognizer::new(WhisperConfig {
        model_path,
        language: config.language.clone(),
        threads: None,
        sample_rate,
        partial_stride_ms: config.partial_stride_ms,
        max_utterance_secs: config.max_utterance_secs,
    })?;
    Ok(Box::new(recognizer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_no_model_configured_is_unavailable() {
        let config = SttConfig::default();
        assert!(matches!(
            load_recognizer(&config, 16000),
            Err(RevoiceError::ModelUnavailable)
        ));
    }

    #[test]
    fn test_missing_model_path_is_not_found() {
        let config = SttConfig {
            model: Some(PathBuf::from("/no/such/model.bin")),
            ..Default::default()
        };
        assert!(matches!(
            load_recognizer(&config, 16000),
            Err(RevoiceError::ModelNotFound { .. })
        ));
    }
}
