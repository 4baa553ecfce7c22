//! One request/response cycle per connection.
//!
//! ```text
//! AwaitingLength -> AwaitingPayload -> Transcribing -> Responding -> Closed
//! ```
//!
//! A failed read in either of the first two states closes the connection
//! without a response. So does a shutdown request that arrives while the
//! client is still sending. Transcribing always produces text, so once the payload
//! is in, the client always gets a frame back unless the write itself fails.

use std::future::Future;
use std::time::Duration;

use pink_whisper_common::frame::{self, FrameError};
use pink_whisper_common::pcm;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::transcribe::{InferenceAdapter, Transcriber};

/// Where a connection is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingLength,
    AwaitingPayload,
    Transcribing,
    Responding,
    Closed,
}

/// Per-connection bounds. Both are off unless configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub max_request_bytes: Option<u32>,
    pub read_timeout: Option<Duration>,
}

impl From<&ServerConfig> for ConnectionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_request_bytes: config.max_request_bytes,
            read_timeout: config.read_timeout(),
        }
    }
}

/// Why a connection was closed early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("client did not finish sending within {0:?}")]
    TimedOut(Duration),

    #[error("server shutting down")]
    Shutdown,
}

/// How a connection ended.
#[derive(Debug)]
pub enum ConnectionOutcome {
    /// A response frame was written in full.
    Responded { samples: usize, text_bytes: usize },
    /// The connection was closed in `state` without a complete response.
    Closed {
        state: ConnectionState,
        error: ConnectionError,
    },
}

impl ConnectionOutcome {
    fn closed(state: ConnectionState, error: impl Into<ConnectionError>) -> Self {
        Self::Closed {
            state,
            error: error.into(),
        }
    }
}

/// Serve exactly one request on `stream`, then close it.
///
/// Cancelling `shutdown` abandons the request while it is still being read.
/// Once the payload is in, the request is transcribed and answered.
pub async fn handle_connection<S, T>(
    mut stream: S,
    adapter: &InferenceAdapter<T>,
    limits: &ConnectionLimits,
    shutdown: &CancellationToken,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Transcriber + 'static,
{
    let outcome = exchange(&mut stream, adapter, limits, shutdown).await;

    // Best effort; the peer may already be gone
    let _ = stream.shutdown().await;

    match &outcome {
        ConnectionOutcome::Responded {
            samples,
            text_bytes,
        } => info!(samples, text_bytes, "Request served"),
        ConnectionOutcome::Closed { state, error } => {
            warn!(state = ?state, error = %error, "Connection closed without response")
        }
    }
    debug!(state = ?ConnectionState::Closed, "Connection finished");

    outcome
}

async fn exchange<S, T>(
    stream: &mut S,
    adapter: &InferenceAdapter<T>,
    limits: &ConnectionLimits,
    shutdown: &CancellationToken,
) -> ConnectionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Transcriber + 'static,
{
    let mut state = ConnectionState::AwaitingLength;
    debug!(state = ?state, "Connection accepted");

    let len = match read_phase(limits, shutdown, frame::read_length(stream)).await {
        Ok(len) => len,
        Err(e) => return ConnectionOutcome::closed(state, e),
    };
    if let Err(e) = frame::check_request_len(len, limits.max_request_bytes) {
        return ConnectionOutcome::closed(state, e);
    }

    state = ConnectionState::AwaitingPayload;
    debug!(state = ?state, declared = len, "Length prefix received");

    let payload = match read_phase(limits, shutdown, frame::read_payload(stream, len)).await {
        Ok(payload) => payload,
        Err(e) => return ConnectionOutcome::closed(state, e),
    };

    state = ConnectionState::Transcribing;
    let samples = pcm::le_bytes_to_f32(&payload);
    let sample_count = samples.len();
    debug!(state = ?state, samples = sample_count, "Payload received");

    let text = adapter.transcribe(samples).await;

    state = ConnectionState::Responding;
    debug!(state = ?state, text_bytes = text.len(), "Sending response");

    match frame::write_response(stream, &text).await {
        Ok(()) => ConnectionOutcome::Responded {
            samples: sample_count,
            text_bytes: text.len(),
        },
        Err(e) => ConnectionOutcome::closed(state, e),
    }
}

async fn read_phase<F, O>(
    limits: &ConnectionLimits,
    shutdown: &CancellationToken,
    read: F,
) -> Result<O, ConnectionError>
where
    F: Future<Output = Result<O, FrameError>>,
{
    tokio::select! {
        _ = shutdown.cancelled() => Err(ConnectionError::Shutdown),
        result = with_deadline(limits.read_timeout, read) => result,
    }
}

async fn with_deadline<F, O>(limit: Option<Duration>, read: F) -> Result<O, ConnectionError>
where
    F: Future<Output = Result<O, FrameError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| ConnectionError::TimedOut(limit))?
            .map_err(ConnectionError::from),
        None => read.await.map_err(ConnectionError::from),
    }
}

#[cfg(test)]
#[path = "handler_test.rs"]
mod tests;
