//! Wire protocol for multiplayer world synchronization.
//!
//! Typed records for world entities, per-tick actor snapshots, connection
//! negotiation, server discovery, file transfer and sync events, together
//! with the discriminator envelope that carries them. Every record converts
//! to and from a protobuf schema in [`wire`] through [`WireRecord`].
//!
//! Nothing here owns a thread or a socket. Decoding is deterministic, has no
//! side effects, and never allocates more than a validated declared length.

pub mod actor;
pub mod codec;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod handle;
pub mod handshake;
pub mod math;
pub mod message;
pub mod packet;
pub mod sync_event;
pub mod transfer;
pub mod wire;
pub mod world;

pub use actor::{ActorSnapshot, ActorSnapshotBuffer, PedData, PlayerDisconnect, VehicleData};
pub use codec::WireRecord;
pub use discovery::{DiscoveryResponse, ServerInfo};
pub use entity::{
    BlipProperties, EntityProperties, EntityType, EntityVariant, MarkerProperties, PickupProperties,
    VehicleProperties,
};
pub use error::{ProtocolError, Result};
pub use handle::{LocalHandle, NetHandle};
pub use handshake::{
    ClientHandshake, ClientState, ConnectionRequest, ConnectionResponse, HandshakeError, HandshakeRejection,
    ScriptVersion, ServerHandshakePolicy, VersionRange,
};
pub use math::Vector3;
pub use message::{EnvelopeHeader, HEADER_LEN, Message, OpaqueBody, ProtocolLimits};
pub use packet::{PacketType, ReliabilityTier};
pub use sync_event::{ArgumentKind, Lights, NativeArgument, SyncAction, SyncEffect, SyncEvent, SyncEventType};
pub use transfer::{
    ClientsideScript, CompletedFile, DataDownloadStart, FileAcceptDeny, FileChunk, FileTransferComplete,
    FileTransferReceiver, FileType, FileUpload, ScriptCollection, md5_hex,
};
pub use world::{CreateEntity, DeleteEntity, EntityCategory, ServerMap};
