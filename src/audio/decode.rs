//! Decoding of synthesizer output into PCM.

use crate::audio::dsp::DecodedAudio;
use crate::audio::wav;
use crate::error::{Result, RevoiceError};

/// Decode encoded audio (MP3, WAV, OGG, FLAC) into interleaved `f32` samples.
///
/// WAV is always supported. Compressed formats need the `cpal-audio` feature,
/// which brings in rodio's decoders.
pub fn decode_audio(bytes: &[u8]) -> Result<DecodedAudio> {
    if bytes.is_empty() {
        return Err(RevoiceError::Decode {
            message: "synthesizer returned no audio".to_string(),
        });
    }
    if wav::is_wav(bytes) {
        return wav::decode_wav(bytes);
    }
    decode_compressed(bytes)
}

/// Whether compressed formats such as MP3 can be decoded in this build.
pub fn compressed_decoding_available() -> bool {
    cfg!(feature = "cpal-audio")
}

#[cfg(feature = "cpal-audio")]
fn decode_compressed(bytes: &[u8]) -> Result<DecodedAudio> {
    use rodio::Source;

    let decoder =
        rodio::Decoder::new(std::io::Cursor::new(bytes.to_vec())).map_err(|e| {
            RevoiceError::Decode {
                message: format!("Failed to decode synthesized audio: {}", e),
            }
        })?;

    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    tracing::debug!(
        sample_rate,
        channels,
        samples = samples.len(),
        "decoded synthesized audio"
    );

    Ok(DecodedAudio::new(samples, sample_rate, channels))
}

#[cfg(not(feature = "cpal-audio"))]
fn decode_compressed(_bytes: &[u8]) -> Result<DecodedAudio> {
    Err(RevoiceError::DependencyMissing {
        dependency: "compressed audio decoder".to_string(),
        hint: "rebuild with --features cpal-audio or use a synthesizer that returns WAV"
            .to_string(),
    })
}
