use crate::defaults;
use crate::error::{Result, RevoiceError};
use crate::tts::synthesizer::VoiceParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub segmentation: SegmentationConfig,
    pub tts: TtsConfig,
    pub playback: PlaybackConfig,
    pub cache: CacheConfig,
    pub export: ExportConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
    pub queue_capacity: usize,
    pub noise_gate: bool,
    pub noise_gate_threshold: f32,
}

/// Streaming recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the recognizer model (a ggml Whisper file).
    pub model: Option<PathBuf>,
    pub language: String,
    pub partial_stride_ms: u32,
    pub max_utterance_secs: u32,
}

/// Phrase segmentation tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    pub min_phrase_len: usize,
    pub silence_finalize_secs: f64,
    pub partial_throttle_secs: f64,
    pub print_partials: bool,
    pub poll_ms: u64,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub voice: String,
    /// Speaking rate as a signed percentage, e.g. "+10%".
    pub rate: String,
    /// Volume as a signed percentage, e.g. "-5%".
    pub volume: String,
    pub max_retries: u32,
    pub backoff_secs: f64,
    pub timeout_secs: u64,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Suspend capture while synthesized audio plays.
    pub ducking: bool,
    pub gain_db: f32,
}

/// Synthesized artifact storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Keep the raw synthesizer output next to the normalized WAV.
    pub keep_raw: bool,
    pub save_normalized: bool,
}

/// One-shot clip export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
    pub autosave: bool,
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            frame_ms: defaults::FRAME_MS,
            queue_capacity: defaults::FRAME_QUEUE_CAPACITY,
            noise_gate: true,
            noise_gate_threshold: defaults::NOISE_GATE_THRESHOLD,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: None,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            partial_stride_ms: defaults::PARTIAL_STRIDE_MS,
            max_utterance_secs: defaults::MAX_UTTERANCE_SECS,
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_phrase_len: defaults::MIN_PHRASE_LEN,
            silence_finalize_secs: defaults::SILENCE_FINALIZE_SECS,
            partial_throttle_secs: defaults::PARTIAL_THROTTLE_SECS,
            print_partials: true,
            poll_ms: defaults::QUEUE_POLL_MS,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::TTS_ENDPOINT.to_string(),
            model: defaults::TTS_MODEL.to_string(),
            api_key_env: defaults::TTS_API_KEY_ENV.to_string(),
            voice: defaults::DEFAULT_VOICE.to_string(),
            rate: "+0%".to_string(),
            volume: "+0%".to_string(),
            max_retries: defaults::TTS_MAX_RETRIES,
            backoff_secs: defaults::TTS_BACKOFF_SECS,
            timeout_secs: defaults::TTS_TIMEOUT_SECS,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ducking: true,
            gain_db: 0.0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: data_dir().join("tts_cache"),
            keep_raw: false,
            save_normalized: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: data_dir().join("clips"),
            autosave: true,
            sample_rate: defaults::EXPORT_SAMPLE_RATE,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revoice")
}

/// Parse a signed percentage such as `"+10%"`, `"-5%"` or `"0"`.
pub fn parse_percent(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let number = number.strip_prefix('+').unwrap_or(number);
    number.parse::<i32>().ok()
}

impl SegmentationConfig {
    pub fn silence_finalize(&self) -> Duration {
        seconds(self.silence_finalize_secs, defaults::SILENCE_FINALIZE_SECS)
    }

    pub fn partial_throttle(&self) -> Duration {
        seconds(self.partial_throttle_secs, defaults::PARTIAL_THROTTLE_SECS)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

impl TtsConfig {
    pub fn backoff(&self) -> Duration {
        seconds(self.backoff_secs, defaults::TTS_BACKOFF_SECS)
    }
}

/// Non-negative seconds as a `Duration`; unrepresentable values fall back.
fn seconds(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0))
        .or_else(|_| Duration::try_from_secs_f64(fallback))
        .unwrap_or_default()
}

/// A finite timing value in `0..=MAX_TIMING_SECS`.
fn timing_in_range(value: f64) -> bool {
    value.is_finite() && (0.0..=defaults::MAX_TIMING_SECS).contains(&value)
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RevoiceError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RevoiceError::Io(e)
            }
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| RevoiceError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(RevoiceError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Serialize to pretty TOML (used by `config show` and `config init`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RevoiceError::Other(e.to_string()))
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - REVOICE_MODEL → stt.model
    /// - REVOICE_INPUT_DEVICE → audio.input_device
    /// - REVOICE_OUTPUT_DEVICE → audio.output_device
    /// - REVOICE_VOICE → tts.voice
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("REVOICE_MODEL")
            && !model.is_empty()
        {
            self.stt.model = Some(PathBuf::from(model));
        }

        if let Ok(device) = std::env::var("REVOICE_INPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.input_device = Some(device);
        }

        if let Ok(device) = std::env::var("REVOICE_OUTPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.output_device = Some(device);
        }

        if let Ok(voice) = std::env::var("REVOICE_VOICE")
            && !voice.is_empty()
        {
            self.tts.voice = voice;
        }

        self
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> RevoiceError {
            RevoiceError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be greater than zero"));
        }
        if self.audio.channels == 0 {
            return Err(invalid("audio.channels", "must be greater than zero"));
        }
        if self.audio.frame_ms == 0 {
            return Err(invalid("audio.frame_ms", "must be greater than zero"));
        }
        if self.audio.queue_capacity == 0 {
            return Err(invalid("audio.queue_capacity", "must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.audio.noise_gate_threshold) {
            return Err(invalid(
                "audio.noise_gate_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        let silence = self.segmentation.silence_finalize_secs;
        if !timing_in_range(silence) || silence == 0.0 {
            return Err(invalid(
                "segmentation.silence_finalize_secs",
                "must be positive and at most 3600 seconds",
            ));
        }
        if !timing_in_range(self.segmentation.partial_throttle_secs) {
            return Err(invalid(
                "segmentation.partial_throttle_secs",
                "must be between 0 and 3600 seconds",
            ));
        }
        if self.segmentation.poll_ms == 0 {
            return Err(invalid("segmentation.poll_ms", "must be greater than zero"));
        }
        if self.tts.max_retries == 0 {
            return Err(invalid("tts.max_retries", "must be at least 1"));
        }
        if !timing_in_range(self.tts.backoff_secs) {
            return Err(invalid(
                "tts.backoff_secs",
                "must be between 0 and 3600 seconds",
            ));
        }
        if self.export.sample_rate == 0 {
            return Err(invalid("export.sample_rate", "must be greater than zero"));
        }
        self.voice_params()?;
        Ok(())
    }

    /// Voice parameters for the synthesizer, parsed from the `tts` section.
    pub fn voice_params(&self) -> Result<VoiceParams> {
        let rate = parse_percent(&self.tts.rate).ok_or_else(|| RevoiceError::ConfigInvalidValue {
            key: "tts.rate".to_string(),
            message: format!("expected a percentage like +10%, got '{}'", self.tts.rate),
        })?;
        let volume =
            parse_percent(&self.tts.volume).ok_or_else(|| RevoiceError::ConfigInvalidValue {
                key: "tts.volume".to_string(),
                message: format!("expected a percentage like -5%, got '{}'", self.tts.volume),
            })?;
        Ok(VoiceParams {
            voice: self.tts.voice.clone(),
            rate,
            volume,
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/revoice/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("revoice")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_revoice_env() {
        remove_env("REVOICE_MODEL");
        remove_env("REVOICE_INPUT_DEVICE");
        remove_env("REVOICE_OUTPUT_DEVICE");
        remove_env("REVOICE_VOICE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.queue_capacity, 80);
        assert!(config.audio.noise_gate);
        assert_eq!(config.audio.noise_gate_threshold, 0.005);

        assert_eq!(config.segmentation.min_phrase_len, 6);
        assert_eq!(config.segmentation.silence_finalize_secs, 0.8);
        assert_eq!(config.segmentation.partial_throttle_secs, 0.25);
        assert!(config.segmentation.print_partials);

        assert_eq!(config.tts.max_retries, 3);
        assert_eq!(config.tts.backoff_secs, 1.0);
        assert_eq!(config.tts.rate, "+0%");

        assert!(config.playback.ducking);
        assert_eq!(config.playback.gain_db, 0.0);

        assert!(!config.cache.keep_raw);
        assert!(config.cache.save_normalized);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [audio]
            input_device = "hw:0,0"
            output_device = "CABLE Input"
            noise_gate_threshold = 0.01

            [stt]
            model = "/models/ggml-small.bin"
            language = "es"

            [segmentation]
            min_phrase_len = 4
            silence_finalize_secs = 1.2

            [tts]
            voice = "nova"
            rate = "+15%"
            volume = "-10%"

            [playback]
            ducking = false
            gain_db = 3.5
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.input_device.as_deref(), Some("hw:0,0"));
        assert_eq!(config.audio.output_device.as_deref(), Some("CABLE Input"));
        assert_eq!(config.audio.noise_gate_threshold, 0.01);
        assert_eq!(
            config.stt.model,
            Some(PathBuf::from("/models/ggml-small.bin"))
        );
        assert_eq!(config.stt.language, "es");
        assert_eq!(config.segmentation.min_phrase_len, 4);
        assert_eq!(config.segmentation.silence_finalize_secs, 1.2);
        assert!(!config.playback.ducking);
        assert_eq!(config.playback.gain_db, 3.5);

        let voice = config.voice_params().unwrap();
        assert_eq!(voice.voice, "nova");
        assert_eq!(voice.rate, 15);
        assert_eq!(voice.volume, -10);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let config = Config::from_toml("[tts]\nvoice = \"echo\"\n").unwrap();

        assert_eq!(config.tts.voice, "echo");
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.segmentation, SegmentationConfig::default());
        assert_eq!(config.tts.max_retries, 3);
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("+0%"), Some(0));
        assert_eq!(parse_percent("+10%"), Some(10));
        assert_eq!(parse_percent("-25%"), Some(-25));
        assert_eq!(parse_percent(" 5 % "), Some(5));
        assert_eq!(parse_percent("7"), Some(7));
        assert_eq!(parse_percent("fast"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let mut config = Config::default();
        config.tts.rate = "quick".to_string();
        match config.validate() {
            Err(RevoiceError::ConfigInvalidValue { key, .. }) => assert_eq!(key, "tts.rate"),
            other => panic!("expected ConfigInvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = Config::default();
        config.tts.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.audio.noise_gate_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(
            config.segmentation.silence_finalize(),
            Duration::from_millis(800)
        );
        assert_eq!(
            config.segmentation.partial_throttle(),
            Duration::from_millis(250)
        );
        assert_eq!(config.segmentation.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.tts.backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_override_model_and_devices() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_revoice_env();

        set_env("REVOICE_MODEL", "/tmp/ggml-tiny.bin");
        set_env("REVOICE_INPUT_DEVICE", "pulse");
        set_env("REVOICE_OUTPUT_DEVICE", "virtual-cable");
        set_env("REVOICE_VOICE", "shimmer");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, Some(PathBuf::from("/tmp/ggml-tiny.bin")));
        assert_eq!(config.audio.input_device.as_deref(), Some("pulse"));
        assert_eq!(config.audio.output_device.as_deref(), Some("virtual-cable"));
        assert_eq!(config.tts.voice, "shimmer");

        clear_revoice_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_revoice_env();

        set_env("REVOICE_VOICE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.tts.voice, defaults::DEFAULT_VOICE);

        clear_revoice_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_toml("[audio\ninput_device = \"broken\n");
        assert!(matches!(result, Err(RevoiceError::ConfigParse { .. })));
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("revoice"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_revoice_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[audio\nbroken").unwrap();
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_timings() {
        let cases = [
            "[segmentation]\nsilence_finalize_secs = inf",
            "[segmentation]\nsilence_finalize_secs = nan",
            "[segmentation]\npartial_throttle_secs = 1e30",
            "[segmentation]\npoll_ms = 0",
            "[tts]\nbackoff_secs = 1e30",
            "[tts]\nbackoff_secs = inf",
        ];
        for case in cases {
            let config = Config::from_toml(case).unwrap();
            assert!(
                matches!(
                    config.validate(),
                    Err(RevoiceError::ConfigInvalidValue { .. })
                ),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn test_duration_accessors_never_panic() {
        let mut config = Config::default();
        config.segmentation.silence_finalize_secs = f64::INFINITY;
        config.segmentation.partial_throttle_secs = f64::NAN;
        config.segmentation.poll_ms = 0;
        config.tts.backoff_secs = 1e30;

        assert_eq!(config.segmentation.silence_finalize(), Duration::from_millis(800));
        assert_eq!(config.segmentation.partial_throttle(), Duration::ZERO);
        assert_eq!(config.segmentation.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.tts.backoff(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_accepts_upper_bound() {
        let mut config = Config::default();
        config.segmentation.silence_finalize_secs = 3600.0;
        config.tts.backoff_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = Config::default();
        config.tts.voice = "fable".to_string();
        config.playback.gain_db = -2.0;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
