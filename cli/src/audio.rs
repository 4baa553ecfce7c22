//! Loading audio files into wire-ready PCM bytes.
//!
//! The server takes exactly one format, so nothing here converts: files in any
//! other format are rejected with a message saying what was found.

use std::path::Path;

use anyhow::{Context, Result, bail};
use hound::{SampleFormat, WavReader};
use pink_whisper_common::pcm::{self, BYTES_PER_SAMPLE, SAMPLE_RATE};

/// Read a WAV file and return its samples as little-endian bytes.
///
/// The file must be 16kHz, mono, 16-bit integer PCM.
pub fn load_wav(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE {
        bail!(
            "{} is {}Hz, expected {}Hz",
            path.display(),
            spec.sample_rate,
            SAMPLE_RATE
        );
    }
    if spec.channels != 1 {
        bail!(
            "{} has {} channels, expected mono",
            path.display(),
            spec.channels
        );
    }
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "{} is {}-bit {:?}, expected 16-bit integer PCM",
            path.display(),
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read samples from {}", path.display()))?;

    Ok(pcm::samples_to_le_bytes(&samples))
}

/// Read a headerless little-endian 16-bit PCM file.
pub fn load_raw(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read PCM file: {}", path.display()))?;

    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        bail!(
            "{} is {} bytes, not a whole number of 16-bit samples",
            path.display(),
            bytes.len()
        );
    }

    Ok(bytes)
}

#[cfg(test)]
#[path = "audio_test.rs"]
mod tests;
