//! Typed messages and the discriminator envelope.
//!
//! Envelope layout, little-endian:
//!
//! ```text
//! [discriminator: i32][payload length: i32][payload: length bytes]
//! ```
//!
//! The header is validated before the payload is read, so a hostile length
//! never causes an allocation.

use crate::actor::{PedData, PlayerDisconnect, VehicleData};
use crate::codec::WireRecord;
use crate::discovery::DiscoveryResponse;
use crate::error::{ProtocolError, Result};
use crate::handshake::{ConnectionRequest, ConnectionResponse};
use crate::packet::PacketType;
use crate::sync_event::SyncEvent;
use crate::transfer::{DataDownloadStart, FileAcceptDeny, FileChunk, FileTransferComplete};
use crate::world::{CreateEntity, DeleteEntity};

/// Size of the envelope header in bytes.
pub const HEADER_LEN: usize = 8;

/// Size limits applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    /// Largest envelope payload accepted.
    pub max_payload_size: usize,
    /// Largest file a transfer may declare.
    pub max_file_length: usize,
    /// Bytes per outgoing file chunk.
    pub file_chunk_size: usize,
    /// Transfers a receiver keeps in flight at once.
    pub max_concurrent_transfers: usize,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_payload_size: 1024 * 1024,
            max_file_length: 64 * 1024 * 1024,
            file_chunk_size: 16 * 1024,
            max_concurrent_transfers: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Body of a kind whose schema belongs to another layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueBody {
    kind: PacketType,
    body: Vec<u8>,
}

impl OpaqueBody {
    /// Wrap `body`. Fails for kinds this crate has a schema for.
    pub fn new(kind: PacketType, body: Vec<u8>) -> Result<Self> {
        if kind.has_schema() {
            return Err(ProtocolError::malformed(format!(
                "{kind:?} has a schema and cannot travel opaquely"
            )));
        }
        Ok(Self { kind, body })
    }

    pub fn kind(&self) -> PacketType {
        self.kind
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Every message this layer sends or receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    VehiclePosition(VehicleData),
    PedPosition(PedData),
    NpcVehiclePosition(VehicleData),
    NpcPedPosition(PedData),
    PlayerDisconnect(PlayerDisconnect),
    DiscoveryResponse(DiscoveryResponse),
    ConnectionRequest(ConnectionRequest),
    ConnectionConfirmed(ConnectionResponse),
    CreateEntity(CreateEntity),
    DeleteEntity(DeleteEntity),
    SyncEvent(SyncEvent),
    FileChunk(FileChunk),
    FileTransferRequest(DataDownloadStart),
    FileTransferComplete(FileTransferComplete),
    /// Same shape as a creation; the payload must be a marker.
    UpdateMarkerProperties(CreateEntity),
    FileAcceptDeny(FileAcceptDeny),
    Opaque(OpaqueBody),
}

impl Message {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::VehiclePosition(_) => PacketType::VehiclePositionData,
            Self::PedPosition(_) => PacketType::PedPositionData,
            Self::NpcVehiclePosition(_) => PacketType::NpcVehPositionData,
            Self::NpcPedPosition(_) => PacketType::NpcPedPositionData,
            Self::PlayerDisconnect(_) => PacketType::PlayerDisconnect,
            Self::DiscoveryResponse(_) => PacketType::DiscoveryResponse,
            Self::ConnectionRequest(_) => PacketType::ConnectionRequest,
            Self::ConnectionConfirmed(_) => PacketType::ConnectionConfirmed,
            Self::CreateEntity(_) => PacketType::CreateEntity,
            Self::DeleteEntity(_) => PacketType::DeleteEntity,
            Self::SyncEvent(_) => PacketType::SyncEvent,
            Self::FileChunk(_) => PacketType::FileTransferTick,
            Self::FileTransferRequest(_) => PacketType::FileTransferRequest,
            Self::FileTransferComplete(_) => PacketType::FileTransferComplete,
            Self::UpdateMarkerProperties(_) => PacketType::UpdateMarkerProperties,
            Self::FileAcceptDeny(_) => PacketType::FileAcceptDeny,
            Self::Opaque(o) => o.kind,
        }
    }

    /// Protobuf payload without the envelope header.
    pub fn encode_body(&self) -> Vec<u8> {
        match self {
            Self::VehiclePosition(m) | Self::NpcVehiclePosition(m) => m.encode(),
            Self::PedPosition(m) | Self::NpcPedPosition(m) => m.encode(),
            Self::PlayerDisconnect(m) => m.encode(),
            Self::DiscoveryResponse(m) => m.encode(),
            Self::ConnectionRequest(m) => m.encode(),
            Self::ConnectionConfirmed(m) => m.encode(),
            Self::CreateEntity(m) | Self::UpdateMarkerProperties(m) => m.encode(),
            Self::DeleteEntity(m) => m.encode(),
            Self::SyncEvent(m) => m.encode(),
            Self::FileChunk(m) => m.encode(),
            Self::FileTransferRequest(m) => m.encode(),
            Self::FileTransferComplete(m) => m.encode(),
            Self::FileAcceptDeny(m) => m.encode(),
            Self::Opaque(o) => o.body.clone(),
        }
    }

    /// Decode a payload with the schema bound to `kind`.
    pub fn decode_body(kind: PacketType, body: &[u8]) -> Result<Self> {
        Ok(match kind {
            PacketType::VehiclePositionData => Self::VehiclePosition(VehicleData::decode(body)?),
            PacketType::PedPositionData => Self::PedPosition(PedData::decode(body)?),
            PacketType::NpcVehPositionData => Self::NpcVehiclePosition(VehicleData::decode(body)?),
            PacketType::NpcPedPositionData => Self::NpcPedPosition(PedData::decode(body)?),
            PacketType::PlayerDisconnect => Self::PlayerDisconnect(PlayerDisconnect::decode(body)?),
            PacketType::DiscoveryResponse => Self::DiscoveryResponse(DiscoveryResponse::decode(body)?),
            PacketType::ConnectionRequest => Self::ConnectionRequest(ConnectionRequest::decode(body)?),
            PacketType::ConnectionConfirmed => Self::ConnectionConfirmed(ConnectionResponse::decode(body)?),
            PacketType::CreateEntity => Self::CreateEntity(CreateEntity::decode(body)?),
            PacketType::DeleteEntity => Self::DeleteEntity(DeleteEntity::decode(body)?),
            PacketType::SyncEvent => Self::SyncEvent(SyncEvent::decode(body)?),
            PacketType::FileTransferTick => Self::FileChunk(FileChunk::decode(body)?),
            PacketType::FileTransferRequest => Self::FileTransferRequest(DataDownloadStart::decode(body)?),
            PacketType::FileTransferComplete => {
                Self::FileTransferComplete(FileTransferComplete::decode(body)?)
            }
            PacketType::UpdateMarkerProperties => {
                let update = CreateEntity::decode(body)?;
                update.properties.expect_type(crate::entity::EntityType::Marker)?;
                Self::UpdateMarkerProperties(update)
            }
            PacketType::FileAcceptDeny => Self::FileAcceptDeny(FileAcceptDeny::decode(body)?),
            opaque => Self::Opaque(OpaqueBody::new(opaque, body.to_vec())?),
        })
    }

    /// Full envelope: header followed by the payload.
    pub fn encode_envelope(&self) -> Vec<u8> {
        let body = self.encode_body();
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&i32::from(self.packet_type().id()).to_le_bytes());
        out.extend_from_slice(&(body.len() as i32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Decode a complete envelope held in memory.
    pub fn decode_envelope(bytes: &[u8], limits: &ProtocolLimits) -> Result<Self> {
        let header_bytes: &[u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(ProtocolError::LengthViolation {
                field: "envelope.header",
                actual: bytes.len() as i64,
                allowed: HEADER_LEN as i64,
            })?;
        let header = EnvelopeHeader::parse(header_bytes, limits)?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != header.payload_len {
            return Err(ProtocolError::LengthViolation {
                field: "envelope.payload",
                actual: body.len() as i64,
                allowed: header.payload_len as i64,
            });
        }
        Self::decode_body(header.packet_type()?, body)
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed envelope header.
///
/// The discriminator is kept raw so a reader can still skip the payload of
/// an unknown kind and stay in sync with the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub discriminator: i32,
    pub payload_len: usize,
}

impl EnvelopeHeader {
    /// Parse and bound-check a header.
    pub fn parse(bytes: &[u8; HEADER_LEN], limits: &ProtocolLimits) -> Result<Self> {
        let [d0, d1, d2, d3, l0, l1, l2, l3] = *bytes;
        let discriminator = i32::from_le_bytes([d0, d1, d2, d3]);
        let declared = i32::from_le_bytes([l0, l1, l2, l3]);
        let payload_len = usize::try_from(declared)
            .ok()
            .filter(|len| *len <= limits.max_payload_size)
            .ok_or(ProtocolError::LengthViolation {
                field: "envelope.length",
                actual: i64::from(declared),
                allowed: limits.max_payload_size as i64,
            })?;
        Ok(Self {
            discriminator,
            payload_len,
        })
    }

    /// Look up the discriminator.
    pub fn packet_type(&self) -> Result<PacketType> {
        PacketType::from_id(self.discriminator)
    }
}
