//! # Envelope Codec
//!
//! Frame layout:
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────────────────┐
//! │ length (u32) │ type (u8)│ payload (length - 1)     │
//! │ little-endian│          │                          │
//! └──────────────┴──────────┴──────────────────────────┘
//! ```
//!
//! Handshake, GoAway, Time and SyncRequest payloads use the binary layout in
//! `wire.rs`; every other message keeps its payload bytes exactly as
//! received.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::wire::{decode_message, encode_message};
use crate::domain::{CodecError, Envelope, MessageType};
use crate::ports::WireCodec;

/// Largest frame accepted by default (type byte + payload).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Length-prefixed envelope codec.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeCodec {
    max_frame_size: usize,
}

impl EnvelopeCodec {
    /// Codec with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Codec rejecting frames longer than `max_frame_size`.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Configured frame limit.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WireCodec for EnvelopeCodec {
    async fn decode(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<Envelope, CodecError> {
        let mut len_buf = [0u8; 4];

        // EOF before the first length byte is a clean close.
        if reader.read(&mut len_buf[..1]).await? == 0 {
            return Err(CodecError::ConnectionClosed);
        }
        reader.read_exact(&mut len_buf[1..]).await?;

        let len = u32::from_le_bytes(len_buf) as usize;
        if len == 0 {
            return Err(CodecError::EmptyFrame);
        }
        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        let type_byte = reader.read_u8().await?;
        let kind = MessageType::from_u8(type_byte).ok_or(CodecError::UnknownMessageType(type_byte))?;

        let mut payload = vec![0u8; len - 1];
        reader.read_exact(&mut payload).await?;

        trace!(kind = %kind, len, payload = %hex::encode(&payload), "Decoded frame");

        Ok(Envelope::new(decode_message(kind, payload)?))
    }

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        let payload = encode_message(&envelope.message)?;
        let len = payload.len() + 1;
        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }
        let len_prefix = u32::try_from(len).map_err(|_| CodecError::FrameTooLarge {
            len,
            max: self.max_frame_size,
        })?;

        let mut frame = Vec::with_capacity(4 + len);
        frame.extend_from_slice(&len_prefix.to_le_bytes());
        frame.push(envelope.kind.as_u8());
        frame.extend_from_slice(&payload);

        trace!(kind = %envelope.kind, len, frame = %hex::encode(&frame), "Encoded frame");

        Ok(frame)
    }
}
