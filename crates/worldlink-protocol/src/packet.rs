//! Packet discriminator registry.
//!
//! Every message kind maps to a stable small integer. The list is
//! append-only: ids are never reordered or reused, so older peers keep
//! decoding whatever they already understand.

use crate::error::{ProtocolError, Result};

/// Discriminator written at the head of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PacketType {
    /// Per-tick snapshot of a player driving a vehicle.
    VehiclePositionData = 0,
    /// Chat line.
    ChatData = 1,
    /// A player left the session.
    PlayerDisconnect = 2,
    /// Per-tick snapshot of a player on foot.
    PedPositionData = 3,
    /// Per-tick snapshot of a non-player vehicle.
    NpcVehPositionData = 4,
    /// Per-tick snapshot of a non-player pedestrian.
    NpcPedPositionData = 5,
    /// World-sharing for a client has stopped.
    WorldSharingStop = 6,
    /// Connectionless reply to a server listing query.
    DiscoveryResponse = 7,
    /// Client asks to join.
    ConnectionRequest = 8,
    /// Native function invocation.
    NativeCall = 9,
    /// Result of a native call.
    NativeResponse = 10,
    /// A player respawned.
    PlayerRespawned = 11,
    /// Register a per-tick native call.
    NativeTick = 12,
    /// Remove a per-tick native call.
    NativeTickRecall = 13,
    /// Register a native call to run on disconnect.
    NativeOnDisconnect = 14,
    /// Remove an on-disconnect native call.
    NativeOnDisconnectRecall = 15,
    /// A networked entity was created.
    CreateEntity = 16,
    /// A networked entity was destroyed.
    DeleteEntity = 17,
    /// Script-defined event.
    ScriptEventTrigger = 18,
    /// Tagged ad hoc state mutation.
    SyncEvent = 19,
    /// A chunk of an in-flight file.
    FileTransferTick = 20,
    /// Start of a file transfer.
    FileTransferRequest = 21,
    /// End of a file transfer.
    FileTransferComplete = 22,
    /// Server accepted the connection.
    ConnectionConfirmed = 23,
    /// A player was killed.
    PlayerKilled = 24,
    /// A resource stopped.
    StopResource = 25,
    /// Marker properties changed.
    UpdateMarkerProperties = 26,
    /// Receiver accepts or refuses a file transfer.
    FileAcceptDeny = 27,
}

/// Delivery class of a packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityTier {
    /// Sent every tick; a later packet supersedes a lost one.
    Unreliable,
    /// Must arrive; loss or corruption is a protocol problem.
    Reliable,
}

impl PacketType {
    /// Every known kind, in discriminator order.
    pub const ALL: [PacketType; 28] = [
        Self::VehiclePositionData,
        Self::ChatData,
        Self::PlayerDisconnect,
        Self::PedPositionData,
        Self::NpcVehPositionData,
        Self::NpcPedPositionData,
        Self::WorldSharingStop,
        Self::DiscoveryResponse,
        Self::ConnectionRequest,
        Self::NativeCall,
        Self::NativeResponse,
        Self::PlayerRespawned,
        Self::NativeTick,
        Self::NativeTickRecall,
        Self::NativeOnDisconnect,
        Self::NativeOnDisconnectRecall,
        Self::CreateEntity,
        Self::DeleteEntity,
        Self::ScriptEventTrigger,
        Self::SyncEvent,
        Self::FileTransferTick,
        Self::FileTransferRequest,
        Self::FileTransferComplete,
        Self::ConnectionConfirmed,
        Self::PlayerKilled,
        Self::StopResource,
        Self::UpdateMarkerProperties,
        Self::FileAcceptDeny,
    ];

    /// The wire discriminator.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a discriminator read from the wire.
    pub fn from_id(id: i32) -> Result<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| ProtocolError::malformed(format!("unknown packet discriminator {id}")))
    }

    /// Delivery class of this kind.
    pub fn reliability(self) -> ReliabilityTier {
        match self {
            Self::VehiclePositionData
            | Self::PedPositionData
            | Self::NpcVehPositionData
            | Self::NpcPedPositionData => ReliabilityTier::Unreliable,
            _ => ReliabilityTier::Reliable,
        }
    }

    /// Whether this layer owns the body schema of this kind.
    ///
    /// Bodies of the remaining kinds belong to the chat, scripting, and
    /// native-call layers and are carried opaquely.
    pub fn has_schema(self) -> bool {
        !matches!(
            self,
            Self::ChatData
                | Self::WorldSharingStop
                | Self::NativeCall
                | Self::NativeResponse
                | Self::PlayerRespawned
                | Self::NativeTick
                | Self::NativeTickRecall
                | Self::NativeOnDisconnect
                | Self::NativeOnDisconnectRecall
                | Self::ScriptEventTrigger
                | Self::PlayerKilled
                | Self::StopResource
        )
    }
}

impl TryFrom<i32> for PacketType {
    type Error = ProtocolError;

    fn try_from(id: i32) -> Result<Self> {
        Self::from_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable() {
        assert_eq!(PacketType::VehiclePositionData.id(), 0);
        assert_eq!(PacketType::DiscoveryResponse.id(), 7);
        assert_eq!(PacketType::ConnectionRequest.id(), 8);
        assert_eq!(PacketType::CreateEntity.id(), 16);
        assert_eq!(PacketType::SyncEvent.id(), 19);
        assert_eq!(PacketType::FileTransferRequest.id(), 21);
        assert_eq!(PacketType::ConnectionConfirmed.id(), 23);
        assert_eq!(PacketType::FileAcceptDeny.id(), 27);
    }

    #[test]
    fn test_all_table_matches_discriminants() {
        for (i, kind) in PacketType::ALL.iter().enumerate() {
            assert_eq!(kind.id() as usize, i);
            assert_eq!(PacketType::from_id(i as i32).unwrap(), *kind);
        }
    }

    #[test]
    fn test_unknown_discriminator_is_malformed() {
        for id in [-1, 28, 255, i32::MAX] {
            let err = PacketType::from_id(id).unwrap_err();
            assert!(err.is_malformed(), "id {id} should be rejected");
        }
    }

    #[test]
    fn test_position_kinds_are_unreliable() {
        assert_eq!(
            PacketType::PedPositionData.reliability(),
            ReliabilityTier::Unreliable
        );
        assert_eq!(
            PacketType::FileTransferTick.reliability(),
            ReliabilityTier::Reliable
        );
    }

    #[test]
    fn test_schema_ownership() {
        assert!(PacketType::CreateEntity.has_schema());
        assert!(PacketType::FileAcceptDeny.has_schema());
        assert!(!PacketType::ChatData.has_schema());
        assert!(!PacketType::NativeCall.has_schema());
    }
}
