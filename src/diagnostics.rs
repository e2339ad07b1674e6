//! Dependency checking.
//!
//! Verifies that the recognizer, synthesizer, codec and audio backends this
//! build needs are compiled in and configured.

use crate::audio::decode::compressed_decoding_available;
use crate::config::Config;
use crate::error::{Result, RevoiceError};
use std::fs;
use std::path::Path;

/// Result of a dependency check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    /// Dependency is present and usable
    Ok,
    /// Dependency is missing
    NotFound,
    /// Present but with issues (e.g., no API key)
    Warning(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyCheck {
    pub name: &'static str,
    pub result: CheckResult,
    /// How to fix a missing dependency.
    pub hint: &'static str,
}

impl DependencyCheck {
    fn new(name: &'static str, result: CheckResult, hint: &'static str) -> Self {
        Self { name, result, hint }
    }
}

fn check_feature(enabled: bool) -> CheckResult {
    if enabled {
        CheckResult::Ok
    } else {
        CheckResult::NotFound
    }
}

fn check_model(config: &Config) -> CheckResult {
    match &config.stt.model {
        None => CheckResult::Warning("no model configured (set stt.model or REVOICE_MODEL)".into()),
        Some(path) if path.exists() => CheckResult::Ok,
        Some(path) => CheckResult::Warning(format!("model not found at {}", path.display())),
    }
}

fn check_api_key(config: &Config) -> CheckResult {
    match std::env::var(&config.tts.api_key_env) {
        Ok(key) if !key.is_empty() => CheckResult::Ok,
        _ => CheckResult::Warning(format!("{} is not set", config.tts.api_key_env)),
    }
}

/// Create `dir` if needed and confirm a file can be written there.
fn check_writable(dir: &Path) -> CheckResult {
    let probe = dir.join(".revoice-write-test");
    let result = fs::create_dir_all(dir).and_then(|_| fs::write(&probe, b""));
    let _ = fs::remove_file(&probe);
    match result {
        Ok(()) => CheckResult::Ok,
        Err(e) => CheckResult::Warning(format!("{} is not writable: {}", dir.display(), e)),
    }
}

/// Run every check for `config`.
pub fn check_dependencies(config: &Config) -> Vec<DependencyCheck> {
    vec![
        DependencyCheck::new(
            "speech recognizer (whisper)",
            check_feature(cfg!(feature = "whisper")),
            "rebuild with --features whisper (needs cmake)",
        ),
        DependencyCheck::new(
            "recognizer model",
            check_model(config),
            "download a ggml Whisper model and point stt.model at it",
        ),
        DependencyCheck::new(
            "speech synthesizer (http)",
            check_feature(cfg!(feature = "http-tts")),
            "rebuild with --features http-tts",
        ),
        DependencyCheck::new(
            "synthesizer API key",
            check_api_key(config),
            "export the key named by tts.api_key_env",
        ),
        DependencyCheck::new(
            "audio backend (cpal)",
            check_feature(cfg!(feature = "cpal-audio")),
            "rebuild with --features cpal-audio",
        ),
        DependencyCheck::new(
            "compressed audio decoding",
            check_feature(compressed_decoding_available()),
            "rebuild with --features cpal-audio",
        ),
        DependencyCheck::new(
            "cache directory",
            check_writable(&config.cache.dir),
            "set cache.dir to a writable directory",
        ),
    ]
}

/// The subset of checks that must pass before the live pipeline starts.
///
/// `synth_extension` is the format the synthesizer produces; anything but
/// WAV needs a compressed decoder.
///
/// # Errors
/// `DependencyMissing` naming the first unmet dependency.
pub fn ensure_engine_ready(config: &Config, synth_extension: &str) -> Result<()> {
    if !synth_extension.eq_ignore_ascii_case("wav") && !compressed_decoding_available() {
        return Err(RevoiceError::DependencyMissing {
            dependency: format!("{} decoder", synth_extension),
            hint: "rebuild with --features cpal-audio".to_string(),
        });
    }
    if let CheckResult::Warning(message) = check_writable(&config.cache.dir) {
        return Err(RevoiceError::DependencyMissing {
            dependency: "cache directory".to_string(),
            hint: message,
        });
    }
    Ok(())
}

/// Print a check report to stdout. Returns true if nothing is missing.
pub fn print_report(checks: &[DependencyCheck]) -> bool {
    println!("Checking dependencies...\n");
    let mut all_ok = true;
    for check in checks {
        match &check.result {
            CheckResult::Ok => println!("{}: ✓ OK", check.name),
            CheckResult::NotFound => {
                all_ok = false;
                println!("{}: ✗ NOT FOUND", check.name);
                println!("  {}", check.hint);
            }
            CheckResult::Warning(msg) => {
                println!("{}: ⚠ WARNING: {}", check.name, msg);
                println!("  {}", check.hint);
            }
        }
    }
    println!();
    if all_ok {
        println!("✓ All required backends are compiled in.");
    } else {
        println!("✗ Some backends are missing; see hints above.");
    }
    all_ok
}
