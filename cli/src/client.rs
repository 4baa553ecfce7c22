//! Protocol client: one request, one response, one connection.

use anyhow::{Context, Result};
use pink_whisper_common::{frame, pcm};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

/// Send little-endian 16-bit PCM to the server and return its transcription.
pub async fn transcribe<A>(addr: A, pcm_bytes: &[u8]) -> Result<String>
where
    A: ToSocketAddrs,
{
    let mut stream = TcpStream::connect(addr)
        .await
        .context("Failed to connect to server")?;
    debug!(peer = ?stream.peer_addr().ok(), "Connected");

    let samples = pcm_bytes.len() / pcm::BYTES_PER_SAMPLE;
    info!(
        samples,
        duration_secs = pcm::duration_secs(samples),
        "Sending audio"
    );

    frame::write_request(&mut stream, pcm_bytes)
        .await
        .context("Failed to send audio")?;

    let text = frame::read_response(&mut stream)
        .await
        .context("Server closed the connection without a transcription")?;
    debug!(text_len = text.len(), "Response received");

    Ok(text)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
