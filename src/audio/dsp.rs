//! Post-processing for synthesized speech: loudness, gain, downmix, resample.

use crate::defaults;
use rubato::{FftFixedIn, Resampler};

/// Input block size for the band-limited clip resampler.
const CLIP_CHUNK_SIZE: usize = 1024;

/// Decoded PCM audio as interleaved `f32` samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Convert decibels to a linear amplitude factor.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Peak-normalize so the loudest sample sits `headroom_db` below full scale.
///
/// Silent input is returned unchanged.
pub fn normalize_peak(audio: &mut DecodedAudio, headroom_db: f32) {
    let peak = audio.peak();
    if peak <= f32::EPSILON {
        return;
    }
    let target = db_to_gain(-headroom_db.abs());
    let factor = target / peak;
    for sample in &mut audio.samples {
        *sample *= factor;
    }
}

/// Apply a gain offset in dB, clipping to `[-1.0, 1.0]`.
pub fn apply_gain_db(audio: &mut DecodedAudio, gain_db: f32) {
    if gain_db == 0.0 {
        return;
    }
    let factor = db_to_gain(gain_db);
    for sample in &mut audio.samples {
        *sample = (*sample * factor).clamp(-1.0, 1.0);
    }
}

/// Average interleaved channels down to mono.
pub fn to_mono(audio: &DecodedAudio) -> DecodedAudio {
    let channels = audio.channels.max(1) as usize;
    if channels == 1 {
        return audio.clone();
    }
    let samples = audio
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    DecodedAudio::new(samples, audio.sample_rate, 1)
}

/// Simple linear interpolation resampling of mono samples.
///
/// No anti-alias filter; only used for live capture frames.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}

/// Integer-sample variant used on the capture path.
pub fn resample_i16(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    let floats: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
    resample(&floats, from_rate, to_rate)
        .into_iter()
        .map(|s| s.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Band-limited resampling of a whole mono clip.
///
/// Output is aligned with the input (filter delay removed) and has
/// `ceil(len * to / from)` samples.
pub fn resample_clip(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    match fft_resample(samples, from_rate, to_rate) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!(from_rate, to_rate, "falling back to linear resampling: {}", e);
            resample(samples, from_rate, to_rate)
        }
    }
}

fn fft_resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, String> {
    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CLIP_CHUNK_SIZE, 1, 1)
            .map_err(|e| e.to_string())?;

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + CLIP_CHUNK_SIZE);
    let mut chunk = Vec::with_capacity(CLIP_CHUNK_SIZE);
    let mut pos = 0;
    let mut empty_blocks = 0;

    // Zero-padded blocks past the end flush the filter tail
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let take = samples.len().saturating_sub(pos).min(needed);
        chunk.clear();
        chunk.extend_from_slice(&samples[pos..pos + take]);
        chunk.resize(needed, 0.0);
        pos += take;

        let out = resampler
            .process(&[&chunk[..]], None)
            .map_err(|e| e.to_string())?;
        if out[0].is_empty() {
            empty_blocks += 1;
            if empty_blocks > 8 {
                return Err("resampler produced no output".to_string());
            }
        } else {
            empty_blocks = 0;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

/// Downmix and resample to mono at `sample_rate`.
pub fn to_playback_format(audio: &DecodedAudio, sample_rate: u32) -> DecodedAudio {
    let mono = to_mono(audio);
    let samples = resample_clip(&mono.samples, mono.sample_rate, sample_rate);
    DecodedAudio::new(samples, sample_rate, 1)
}

/// Full post-processing chain for one synthesized clip.
///
/// Returns `(normalized, playback)`: the loudness-normalized decode and the
/// gain-adjusted mono form at `sample_rate`.
pub fn post_process(
    mut decoded: DecodedAudio,
    gain_db: f32,
    sample_rate: u32,
) -> (DecodedAudio, DecodedAudio) {
    normalize_peak(&mut decoded, defaults::NORMALIZE_HEADROOM_DB);
    let mut playback = to_playback_format(&decoded, sample_rate);
    apply_gain_db(&mut playback, gain_db);
    (decoded, playback)
}

/// Convert `f32` samples to 16-bit PCM.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}
