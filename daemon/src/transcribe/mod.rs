//! Speech-to-text transcription.
//!
//! [`Transcriber`] is the engine seam: it may fail. [`InferenceAdapter`] sits
//! in front of it and never does, because the wire protocol has no error
//! frame. A failed inference becomes [`INFERENCE_FAILED_TEXT`] and is sent
//! back like any other transcription.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use pink_whisper_common::pcm::{self, SAMPLE_RATE};
use tracing::{debug, error, warn};

#[cfg(feature = "whisper")]
mod whisper;

#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;

/// Text returned to the client when the engine reports a failure.
pub const INFERENCE_FAILED_TEXT: &str = "[error: inference failed]";

/// Speech-to-text transcriber.
///
/// Implementations convert audio samples to text.
pub trait Transcriber: Send {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Audio samples as f32, expected to be 16kHz mono
    /// * `sample_rate` - Sample rate of the audio in Hz (must be 16000)
    ///
    /// # Returns
    /// The concatenated segment text, or an error if inference failed.
    fn transcribe(&mut self, audio: &[f32], sample_rate: u32) -> Result<String>;
}

/// Shared, serialized access to the loaded engine.
///
/// Clones point at the same engine. The mutex guarantees one inference at a
/// time against the model handle. The engine is dropped, and its model
/// freed, when the last clone goes away.
pub struct InferenceAdapter<T> {
    engine: Arc<Mutex<T>>,
}

impl<T> Clone for InferenceAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<T: Transcriber + 'static> InferenceAdapter<T> {
    /// Take ownership of a loaded engine.
    pub fn new(engine: T) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run inference on the calling thread. Never fails.
    pub fn transcribe_blocking(&self, samples: &[f32]) -> String {
        debug!(
            samples = samples.len(),
            duration_secs = pcm::duration_secs(samples.len()),
            "Running inference"
        );

        // A panic in an earlier call must not take the server down with it
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);

        match engine.transcribe(samples, SAMPLE_RATE) {
            Ok(text) => {
                debug!(text_len = text.len(), "Inference complete");
                text
            }
            Err(e) => {
                warn!(error = %e, "Inference failed, returning sentinel text");
                INFERENCE_FAILED_TEXT.to_string()
            }
        }
    }

    /// Run inference on tokio's blocking pool. Never fails.
    pub async fn transcribe(&self, samples: Vec<f32>) -> String {
        let adapter = self.clone();
        match tokio::task::spawn_blocking(move || adapter.transcribe_blocking(&samples)).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Inference task did not complete");
                INFERENCE_FAILED_TEXT.to_string()
            }
        }
    }
}

/// Number of threads to hand the engine: `max`, capped by the hardware.
pub fn thread_hint(max: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    available.min(max).max(1)
}

#[cfg(test)]
#[path = "transcribe_test.rs"]
mod tests;
