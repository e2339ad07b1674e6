use crate::audio::dsp::DecodedAudio;
use crate::audio::wav;
use crate::error::{Result, RevoiceError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Voice selection and prosody for one synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceParams {
    pub voice: String,
    /// Speaking rate offset in percent (0 = normal).
    pub rate: i32,
    /// Volume offset in percent (0 = unchanged).
    pub volume: i32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: crate::defaults::DEFAULT_VOICE.to_string(),
            rate: 0,
            volume: 0,
        }
    }
}

impl VoiceParams {
    /// Volume offset expressed as a gain in dB.
    pub fn volume_db(&self) -> f32 {
        let factor = (1.0 + self.volume as f32 / 100.0).max(0.01);
        20.0 * factor.log10()
    }
}

/// Trait for text-to-speech backends.
///
/// This trait allows swapping implementations (network service vs mock).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` and return encoded audio (MP3, WAV, ...).
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<Vec<u8>>;

    fn name(&self) -> &str;

    /// Whether the backend honours `VoiceParams::volume` itself.
    ///
    /// When false the volume offset is applied locally as extra gain.
    fn applies_volume(&self) -> bool {
        false
    }

    /// Extension of the raw artifact this backend produces.
    fn file_extension(&self) -> &str {
        "mp3"
    }
}

#[async_trait]
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    async fn synthesize(&self, text: &str, voice: &VoiceParams) -> Result<Vec<u8>> {
        (**self).synthesize(text, voice).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn applies_volume(&self) -> bool {
        (**self).applies_volume()
    }

    fn file_extension(&self) -> &str {
        (**self).file_extension()
    }
}

/// Mock synthesizer for testing
///
/// Returns a short WAV tone. Clones share call counters.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    failures_before_success: u32,
    always_fail: bool,
    delay: Duration,
    audio: Option<Vec<u8>>,
    calls: Arc<AtomicU32>,
    texts: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            failures_before_success: 0,
            always_fail: false,
            delay: Duration::ZERO,
            audio: None,
            calls: Arc::new(AtomicU32::new(0)),
            texts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the first `n` calls, then succeed.
    pub fn with_failures(mut self, n: u32) -> Self {
        self.failures_before_success = n;
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Simulated round-trip time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return these bytes instead of the generated tone.
    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts passed to `synthesize`, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 200ms 440Hz tone at 22.05kHz, encoded as WAV.
    pub fn tone() -> Result<Vec<u8>> {
        let rate = 22050u32;
        let samples: Vec<f32> = (0..rate / 5)
            .map(|i| {
                let t = i as f32 / rate as f32;
                0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect();
        wav::encode_wav(&DecodedAudio::new(samples, rate, 1))
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &VoiceParams) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.always_fail || call <= self.failures_before_success {
            return Err(RevoiceError::Synthesis {
                message: format!("mock synthesis failure on call {}", call),
            });
        }

        match &self.audio {
            Some(bytes) => Ok(bytes.clone()),
            None => Self::tone(),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn file_extension(&self) -> &str {
        "wav"
    }
}
