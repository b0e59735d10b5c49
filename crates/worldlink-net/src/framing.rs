//! Envelope framing for byte streams.
//!
//! Every message on the wire is one protocol envelope:
//!
//! ```text
//! +----------------------+----------------------+--------------------+
//! | discriminator (i32)  | length (i32)         |   payload          |
//! | little-endian        | little-endian        |   (length bytes)   |
//! +----------------------+----------------------+--------------------+
//! ```
//!
//! The header is validated before the payload buffer is allocated. Once a
//! full payload has been read the stream stays in sync even if the payload
//! turns out to be undecodable, so such errors only cost the one message.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use worldlink_protocol::{EnvelopeHeader, HEADER_LEN, Message, ProtocolError, ProtocolLimits};

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header itself was invalid; the stream can no longer be trusted.
    #[error("invalid envelope header: {0}")]
    Header(#[source] ProtocolError),

    /// A complete payload was read but did not decode.
    #[error("undecodable payload for discriminator {discriminator}: {source}")]
    Decode {
        /// Raw discriminator from the header.
        discriminator: i32,
        /// Why decoding failed.
        source: ProtocolError,
    },

    /// An outgoing payload is over the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: usize,
        /// The configured maximum.
        max: usize,
    },

    /// The connection was closed before a complete envelope was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the next envelope can still be read from the same stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::PayloadTooLarge { .. })
    }

    /// The protocol error behind this failure, if any.
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            Self::Header(e) | Self::Decode { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

fn map_eof(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Read and decode a single envelope from the stream.
pub async fn read_message<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    limits: &ProtocolLimits,
) -> Result<Message, FrameError> {
    let mut header_buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut header_buf).await.map_err(map_eof)?;
    let header = EnvelopeHeader::parse(&header_buf, limits).map_err(FrameError::Header)?;

    let mut payload = vec![0u8; header.payload_len];
    if header.payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(map_eof)?;
    }

    let decoded = header
        .packet_type()
        .and_then(|kind| Message::decode_body(kind, &payload));
    match decoded {
        Ok(message) => {
            tracing::trace!(kind = ?message.packet_type(), len = header.payload_len, "envelope received");
            Ok(message)
        }
        Err(source) => {
            tracing::warn!(discriminator = header.discriminator, "dropping message: {source}");
            Err(FrameError::Decode {
                discriminator: header.discriminator,
                source,
            })
        }
    }
}

/// Encode and write a single envelope to the stream.
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    message: &Message,
    limits: &ProtocolLimits,
) -> Result<(), FrameError> {
    let envelope = message.encode_envelope();
    let size = envelope.len() - HEADER_LEN;
    if size > limits.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: limits.max_payload_size,
        });
    }

    writer.write_all(&envelope).await?;
    writer.flush().await?;
    Ok(())
}
