//! 16-bit PCM sample conversion.
//!
//! Audio arrives on the wire as signed 16-bit little-endian samples, mono,
//! 16kHz. Whisper wants normalized `f32` samples.

/// Sample rate clients are expected to send. Not carried on the wire.
pub const SAMPLE_RATE: u32 = 16000;

/// Width of one wire sample in bytes.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Scale factor mapping the full `i16` range onto [-1.0, 1.0).
const I16_SCALE: f32 = 32768.0;

/// Convert 16-bit PCM samples to normalized f32 samples.
///
/// The mapping is linear and asymmetric: `-32768` becomes exactly `-1.0`,
/// `32767` becomes slightly less than `1.0`.
pub fn pcm16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / I16_SCALE).collect()
}

/// Decode little-endian wire bytes into samples.
///
/// A trailing odd byte is ignored; callers validate the length first.
pub fn samples_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian wire bytes.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decode wire bytes straight into the buffer Whisper consumes.
pub fn le_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    pcm16_to_f32(&samples_from_le_bytes(bytes))
}

/// Duration in seconds of `samples` at the wire sample rate.
pub fn duration_secs(samples: usize) -> f32 {
    samples as f32 / SAMPLE_RATE as f32
}

#[cfg(test)]
#[path = "pcm_test.rs"]
mod tests;
