//! Whisper transcription backend.
//!
//! Uses whisper.cpp via whisper-rs for speech-to-text.

use super::{Transcriber, thread_hint};
use crate::config::ModelConfig;
use anyhow::{Context, Result};
use pink_whisper_common::pcm::SAMPLE_RATE;
use tracing::{debug, info};
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

/// Whisper speech-to-text transcriber.
///
/// Owns the model for the lifetime of the server. Dropping it frees the
/// whisper.cpp context and state.
pub struct WhisperTranscriber {
    state: WhisperState,
    _context: WhisperContext,
    language: String,
    n_threads: i32,
    single_segment: bool,
}

impl WhisperTranscriber {
    /// Load a Whisper model.
    ///
    /// # Arguments
    /// * `config` - Model path plus decoding and GPU settings
    pub fn load(config: &ModelConfig) -> Result<Self> {
        info!(
            path = %config.path.display(),
            use_gpu = config.use_gpu,
            flash_attn = config.flash_attn,
            "Loading Whisper model"
        );

        let mut params = WhisperContextParameters::default();
        params.use_gpu = config.use_gpu;
        params.flash_attn = config.flash_attn;

        let context = WhisperContext::new_with_params(
            config.path.to_str().context("Invalid model path")?,
            params,
        )
        .context("Failed to load Whisper model")?;

        let state = context
            .create_state()
            .context("Failed to create Whisper state")?;

        let n_threads = thread_hint(config.max_threads);
        info!(n_threads, "Whisper model and state loaded");

        Ok(Self {
            state,
            _context: context,
            language: config.language.clone(),
            n_threads: i32::try_from(n_threads).unwrap_or(1),
            single_segment: config.single_segment,
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&mut self, audio: &[f32], sample_rate: u32) -> Result<String> {
        debug!(
            samples = audio.len(),
            sample_rate = sample_rate,
            duration_secs = audio.len() as f32 / sample_rate as f32,
            "Transcribing audio with Whisper"
        );

        if sample_rate != SAMPLE_RATE {
            anyhow::bail!(
                "Whisper expects {}Hz audio, got {}Hz",
                SAMPLE_RATE,
                sample_rate
            );
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        params.set_language(Some(self.language.as_str()));
        params.set_n_threads(self.n_threads);

        // Keep whisper.cpp quiet on stdout
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params.set_single_segment(self.single_segment);

        self.state
            .full(params, audio)
            .context("Whisper inference failed")?;

        let num_segments = self.state.full_n_segments();
        let mut result = String::new();

        for i in 0..num_segments {
            if let Some(segment) = self.state.get_segment(i)
                && let Ok(text) = segment.to_str_lossy()
            {
                result.push_str(&text);
            }
        }

        debug!(
            segments = num_segments,
            text_len = result.len(),
            "Transcription complete"
        );

        Ok(result)
    }
}
