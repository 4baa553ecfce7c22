//! Length-prefixed framing.
//!
//! Every message is a `u32` little-endian byte count followed by exactly that
//! many payload bytes. Reads and writes always move the full count: a short
//! transfer from the OS is retried, but a closed or failed connection ends the
//! operation immediately with no partial result.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::pcm::BYTES_PER_SAMPLE;

/// Size of the length prefix on every frame.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Errors raised while moving frames over a connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection ended before the length prefix was complete: {0}")]
    ShortRead(#[source] io::Error),

    #[error("connection ended before {declared} payload bytes were received: {source}")]
    ShortPayload {
        declared: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to send the full frame: {0}")]
    ShortWrite(#[source] io::Error),

    #[error("declared length {declared} exceeds the limit of {max} bytes")]
    PayloadTooLarge { declared: u64, max: u64 },

    #[error("declared length {0} is not a whole number of 16-bit samples")]
    OddLength(u64),

    #[error("response is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

/// Read the 4-byte length prefix.
pub async fn read_length<R>(reader: &mut R) -> Result<u32, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    reader
        .read_exact(&mut prefix)
        .await
        .map_err(FrameError::ShortRead)?;
    Ok(u32::from_le_bytes(prefix))
}

/// Read exactly `len` payload bytes.
pub async fn read_payload<R>(reader: &mut R, len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|source| FrameError::ShortPayload {
            declared: len,
            source,
        })?;
    Ok(payload)
}

/// Validate a declared request length before any payload is read.
///
/// `max` of `None` means no cap.
pub fn check_request_len(len: u32, max: Option<u32>) -> Result<(), FrameError> {
    if let Some(max) = max
        && len > max
    {
        return Err(FrameError::PayloadTooLarge {
            declared: u64::from(len),
            max: u64::from(max),
        });
    }
    if len as usize % BYTES_PER_SAMPLE != 0 {
        return Err(FrameError::OddLength(u64::from(len)));
    }
    Ok(())
}

/// Write one frame: length prefix, then payload, then flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        declared: payload.len() as u64,
        max: u64::from(u32::MAX),
    })?;

    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(FrameError::ShortWrite)?;
    writer
        .write_all(payload)
        .await
        .map_err(FrameError::ShortWrite)?;
    writer.flush().await.map_err(FrameError::ShortWrite)
}

/// Write a transcription response.
pub async fn write_response<W>(writer: &mut W, text: &str) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, text.as_bytes()).await
}

/// Write an audio request. Rejects payloads that are not whole samples.
pub async fn write_request<W>(writer: &mut W, pcm: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if pcm.len() % BYTES_PER_SAMPLE != 0 {
        return Err(FrameError::OddLength(pcm.len() as u64));
    }
    write_frame(writer, pcm).await
}

/// Read a transcription response.
pub async fn read_response<R>(reader: &mut R) -> Result<String, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = read_length(reader).await?;
    let payload = read_payload(reader, len).await?;
    Ok(String::from_utf8(payload)?)
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
