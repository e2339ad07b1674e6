pub mod retry;
pub mod synthesizer;

#[cfg(feature = "http-tts")]
pub mod http;

use crate::config::TtsConfig;
use crate::error::Result;
use std::sync::Arc;
use synthesizer::Synthesizer;

/// Build the configured synthesis backend.
pub fn default_synthesizer(config: &TtsConfig) -> Result<Arc<dyn Synthesizer>> {
    #[cfg(feature = "http-tts")]
    {
        Ok(Arc::new(http::HttpSynthesizer::from_config(config)?))
    }
    #[cfg(not(feature = "http-tts"))]
    {
        let _ = config;
        Err(crate::error::RevoiceError::DependencyMissing {
            dependency: "speech synthesis backend".to_string(),
            hint: "rebuild with --features http-tts".to_string(),
        })
    }
}
