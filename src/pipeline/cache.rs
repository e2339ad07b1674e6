//! Write-once storage for synthesized audio.
//!
//! Every synthesis cycle gets a stem `YYYYmmdd_HHMMSS_<6 hex>`; the raw
//! synthesizer output is written as `<stem>_raw.<ext>` and removed after
//! use unless `keep_raw` is set, the normalized clip as `<stem>.wav`.

use crate::audio::dsp::{DecodedAudio, to_playback_format};
use crate::audio::wav;
use crate::config::CacheConfig;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// `YYYYmmdd_HHMMSS_<6 hex>` for the current local time.
pub fn artifact_stem() -> String {
    let uid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", timestamp(), &uid[..6])
}

/// Local time as `YYYYmmdd_HHMMSS`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
    keep_raw: bool,
    save_normalized: bool,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>, keep_raw: bool, save_normalized: bool) -> Self {
        Self {
            dir: dir.into(),
            keep_raw,
            save_normalized,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.dir, config.keep_raw, config.save_normalized)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn saves_normalized(&self) -> bool {
        self.save_normalized
    }

    /// Write the raw synthesizer output under a fresh stem.
    pub fn store_raw(&self, bytes: &[u8], extension: &str) -> Result<RawArtifact> {
        fs::create_dir_all(&self.dir)?;
        let stem = artifact_stem();
        let path = self.dir.join(format!("{}_raw.{}", stem, extension));
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), "raw artifact written");
        Ok(RawArtifact {
            stem,
            path,
            keep: self.keep_raw,
        })
    }

    /// Persist the normalized clip as 16-bit mono WAV at `sample_rate`.
    pub fn save_normalized(
        &self,
        stem: &str,
        audio: &DecodedAudio,
        sample_rate: u32,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.wav", stem));
        wav::write_wav(&path, &to_playback_format(audio, sample_rate))?;
        Ok(path)
    }
}

/// Raw synthesizer output on disk; deleted on drop unless kept.
#[derive(Debug)]
pub struct RawArtifact {
    stem: String,
    path: PathBuf,
    keep: bool,
}

impl RawArtifact {
    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RawArtifact {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), "could not remove raw artifact: {}", e);
        }
    }
}
