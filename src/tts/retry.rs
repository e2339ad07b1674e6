//! Bounded retries with linear backoff around a synthesizer call.

use crate::config::TtsConfig;
use crate::error::{Result, RevoiceError};
use crate::tts::synthesizer::{Synthesizer, VoiceParams};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &TtsConfig) -> Self {
        Self::new(config.max_retries, config.backoff())
    }

    /// Wait after failed attempt `attempt` (1-based): `backoff * attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::defaults::TTS_MAX_RETRIES,
            Duration::from_secs_f64(crate::defaults::TTS_BACKOFF_SECS),
        )
    }
}

/// Successful synthesis and how many attempts it took.
#[derive(Debug, Clone)]
pub struct Synthesized {
    pub audio: Vec<u8>,
    pub attempts: u32,
}

/// Call the synthesizer until it succeeds or the policy is exhausted.
///
/// No wait follows the final failed attempt.
///
/// # Errors
/// `SynthesisFailure` carrying the attempt count and the last error.
pub async fn synthesize_with_retries(
    synthesizer: &dyn Synthesizer,
    text: &str,
    voice: &VoiceParams,
    policy: RetryPolicy,
) -> Result<Synthesized> {
    let mut last_error = String::new();
    for attempt in 1..=policy.max_attempts {
        match synthesizer.synthesize(text, voice).await {
            Ok(audio) => {
                if attempt > 1 {
                    tracing::info!(attempt, "synthesis succeeded after retry");
                }
                return Ok(Synthesized { audio, attempts: attempt });
            }
            Err(e) => {
                last_error = e.to_string();
                if attempt < policy.max_attempts {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        ?delay,
                        "synthesis failed: {}",
                        last_error
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    Err(RevoiceError::SynthesisFailure {
        attempts: policy.max_attempts,
        message: last_error,
    })
}
