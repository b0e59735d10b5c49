//! Protocol error taxonomy.
//!
//! Every decode or validation failure is scoped to the single message that
//! produced it. [`ProtocolError::is_fatal`] tells the caller whether the
//! connection the message arrived on must be terminated.

use crate::entity::EntityType;
use crate::handle::NetHandle;

/// Errors produced while decoding, validating, or applying protocol messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Unknown discriminator, undecodable body, or argument list that does not
    /// match its event signature.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The declared entity type disagrees with the decoded variant payload.
    #[error("schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// Entity type the context required.
        expected: EntityType,
        /// Entity type actually carried by the payload.
        found: EntityType,
    },

    /// A declared or fixed length is missing, mismatched, or over the limit.
    #[error("length violation in {field}: got {actual}, allowed {allowed}")]
    LengthViolation {
        /// Field or record whose length was violated.
        field: &'static str,
        /// Length that was declared or received.
        actual: i64,
        /// Exact or maximum length that was allowed.
        allowed: i64,
    },

    /// File transfer bytes do not hash to the declared digest.
    #[error("hash mismatch for transfer {id}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Transfer identifier.
        id: i32,
        /// Digest declared in the start record.
        expected: String,
        /// Digest of the received bytes.
        actual: String,
    },

    /// The peer offered a script version outside the supported range.
    #[error("script version {offered} unsupported (supported {min_supported}..={max_supported})")]
    VersionIncompatible {
        /// Version tag sent by the peer.
        offered: u8,
        /// Oldest version tag accepted locally.
        min_supported: u8,
        /// Newest version tag accepted locally.
        max_supported: u8,
    },

    /// A message referenced an entity that is not in the world map.
    #[error("unknown entity {0}")]
    UnknownEntity(NetHandle),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::MalformedPacket`].
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedPacket(detail.into())
    }

    /// Whether this error alone terminates the connection.
    ///
    /// Only a version mismatch is fatal on first occurrence; repeated
    /// malformed packets are counted by the session layer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::VersionIncompatible { .. })
    }

    /// Whether this error counts as a strike against the sending peer.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPacket(_))
    }
}

impl From<prost::DecodeError> for ProtocolError {
    fn from(e: prost::DecodeError) -> Self {
        ProtocolError::MalformedPacket(e.to_string())
    }
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Narrow a wire `uint32` carrying a byte-sized field.
pub(crate) fn narrow_u8(value: u32, field: &'static str) -> Result<u8> {
    u8::try_from(value).map_err(|_| ProtocolError::malformed(format!("{field} out of range: {value}")))
}

/// Narrow a wire `int32` carrying a short-sized field.
pub(crate) fn narrow_i16(value: i32, field: &'static str) -> Result<i16> {
    i16::try_from(value).map_err(|_| ProtocolError::malformed(format!("{field} out of range: {value}")))
}
