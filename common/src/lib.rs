//! Shared pieces of the pink-whisper wire protocol.
//!
//! Both the server and the `pwctl` client speak the same framing: a
//! little-endian `u32` byte count followed by that many bytes. Requests carry
//! 16-bit PCM, responses carry UTF-8 text.

pub mod frame;
pub mod pcm;
