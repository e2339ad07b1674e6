//! WAV encoding and decoding for cache artifacts and exported clips.

use crate::audio::dsp::{self, DecodedAudio};
use crate::error::{Result, RevoiceError};
use std::io::Cursor;
use std::path::Path;

/// True if `bytes` carry a RIFF/WAVE header.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode WAV bytes (16-bit integer or 32-bit float) into `f32` samples.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| RevoiceError::Decode {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

    let spec = reader.spec();
    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>(),
        (hound::SampleFormat::Int, bits) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
        }
        (hound::SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>(),
    }
    .map_err(|e| RevoiceError::Decode {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    Ok(DecodedAudio::new(samples, spec.sample_rate, spec.channels))
}

/// Encode audio as 16-bit PCM WAV bytes.
pub fn encode_wav(audio: &DecodedAudio) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec_for(audio)).map_err(wav_err)?;
        for sample in dsp::to_i16(&audio.samples) {
            writer.write_sample(sample).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
}

/// Write audio as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, audio: &DecodedAudio) -> Result<()> {
    let mut writer = hound::WavWriter::create(path, spec_for(audio)).map_err(wav_err)?;
    for sample in dsp::to_i16(&audio.samples) {
        writer.write_sample(sample).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}

fn spec_for(audio: &DecodedAudio) -> hound::WavSpec {
    hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn wav_err(e: hound::Error) -> RevoiceError {
    match e {
        hound::Error::IoError(io) => RevoiceError::Io(io),
        other => RevoiceError::Decode {
            message: format!("WAV encoding failed: {}", other),
        },
    }
}
