//! Error types for revoice.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevoiceError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio device errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    #[error("Audio decoding failed: {message}")]
    Decode { message: String },

    // Recognition errors
    #[error("Recognition model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Recognition model not loaded")]
    ModelUnavailable,

    #[error("Recognition error: {message}")]
    Recognition { message: String },

    // Synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Speech synthesis gave up after {attempts} attempt(s): {message}")]
    SynthesisFailure { attempts: u32, message: String },

    // Runtime dependencies
    #[error("Missing dependency {dependency}: {hint}")]
    DependencyMissing { dependency: String, hint: String },

    // Lifecycle errors
    #[error("Engine is {state}; stop it before changing the configuration")]
    EngineBusy { state: String },

    #[error("Nothing to synthesize: text is empty")]
    EmptyText,

    #[error("No clip has been synthesized yet")]
    NoClip,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl RevoiceError {
    /// True for capture/playback device failures.
    ///
    /// Device errors stop the affected stage only; the rest of the engine keeps running.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            RevoiceError::AudioDeviceNotFound { .. }
                | RevoiceError::AudioCapture { .. }
                | RevoiceError::Playback { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RevoiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = RevoiceError::ConfigInvalidValue {
            key: "tts.rate".to_string(),
            message: "expected a percentage like +10%".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for tts.rate: expected a percentage like +10%"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = RevoiceError::AudioDeviceNotFound {
            device: "hw:3,0".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: hw:3,0");
    }

    #[test]
    fn test_model_unavailable_display() {
        assert_eq!(
            RevoiceError::ModelUnavailable.to_string(),
            "Recognition model not loaded"
        );
    }

    #[test]
    fn test_synthesis_failure_display() {
        let error = RevoiceError::SynthesisFailure {
            attempts: 3,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speech synthesis gave up after 3 attempt(s): connection refused"
        );
    }

    #[test]
    fn test_dependency_missing_display() {
        let error = RevoiceError::DependencyMissing {
            dependency: "audio decoder".to_string(),
            hint: "rebuild with --features cpal-audio".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Missing dependency audio decoder: rebuild with --features cpal-audio"
        );
    }

    #[test]
    fn test_engine_busy_display() {
        let error = RevoiceError::EngineBusy {
            state: "running".to_string(),
        };
        assert!(error.to_string().starts_with("Engine is running"));
    }

    #[test]
    fn test_device_error_classification() {
        assert!(
            RevoiceError::AudioCapture {
                message: "x".to_string()
            }
            .is_device_error()
        );
        assert!(
            RevoiceError::Playback {
                message: "x".to_string()
            }
            .is_device_error()
        );
        assert!(!RevoiceError::ModelUnavailable.is_device_error());
        assert!(
            !RevoiceError::Synthesis {
                message: "x".to_string()
            }
            .is_device_error()
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: RevoiceError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: RevoiceError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: RevoiceError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RevoiceError>();
        assert_sync::<RevoiceError>();
    }
}
