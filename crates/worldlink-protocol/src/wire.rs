//! Protobuf wire schemas.
//!
//! These structs are the exact on-the-wire shape of every payload. Field tags
//! are part of the protocol and must never be reassigned; new fields take
//! unused tags. Domain modules convert to and from these types and own all
//! validation and defaulting; callers normally only touch them in tests
//! or when building raw payloads.
//!
//! Optional scalars mark fields whose documented default is not the protobuf
//! zero value (vehicle health, blip scale and alpha), so that an omitted field
//! can be told apart from an explicit zero.

use std::collections::HashMap;

/// `{x, y, z}` float vector.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Vector3 {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
}

// ---------------------------------------------------------------------------
// Entity properties
// ---------------------------------------------------------------------------

/// Base entity record. The variant sub-message lives at tags 5..=8.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntityProperties {
    #[prost(message, optional, tag = "1")]
    pub position: Option<Vector3>,
    #[prost(message, optional, tag = "2")]
    pub rotation: Option<Vector3>,
    #[prost(int32, tag = "3")]
    pub model_hash: i32,
    #[prost(uint32, tag = "4")]
    pub entity_type: u32,
    #[prost(oneof = "entity_properties::Variant", tags = "5, 6, 7, 8")]
    pub variant: Option<entity_properties::Variant>,
}

pub mod entity_properties {
    /// Variant-specific payload of an entity record.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "5")]
        Vehicle(super::VehicleProperties),
        #[prost(message, tag = "6")]
        Blip(super::BlipProperties),
        #[prost(message, tag = "7")]
        Marker(super::MarkerProperties),
        #[prost(message, tag = "8")]
        Pickup(super::PickupProperties),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VehicleProperties {
    #[prost(int32, tag = "1")]
    pub primary_color: i32,
    #[prost(int32, tag = "2")]
    pub secondary_color: i32,
    #[prost(float, optional, tag = "3")]
    pub health: Option<f32>,
    #[prost(bool, tag = "4")]
    pub is_dead: bool,
    #[prost(int32, repeated, tag = "5")]
    pub mods: Vec<i32>,
    #[prost(bool, tag = "6")]
    pub siren: bool,
    #[prost(bool, repeated, tag = "7")]
    pub doors: Vec<bool>,
    #[prost(int32, tag = "8")]
    pub trailer: i32,
    #[prost(bool, repeated, tag = "9")]
    pub tires: Vec<bool>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BlipProperties {
    #[prost(int32, tag = "1")]
    pub sprite: i32,
    #[prost(float, optional, tag = "2")]
    pub scale: Option<f32>,
    #[prost(int32, tag = "3")]
    pub color: i32,
    #[prost(bool, tag = "4")]
    pub is_short_range: bool,
    #[prost(int32, optional, tag = "5")]
    pub alpha: Option<i32>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct MarkerProperties {
    #[prost(message, optional, tag = "1")]
    pub direction: Option<Vector3>,
    #[prost(int32, tag = "2")]
    pub marker_type: i32,
    #[prost(int32, tag = "3")]
    pub red: i32,
    #[prost(int32, tag = "4")]
    pub green: i32,
    #[prost(int32, tag = "5")]
    pub blue: i32,
    #[prost(int32, tag = "6")]
    pub alpha: i32,
    #[prost(message, optional, tag = "7")]
    pub scale: Option<Vector3>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PickupProperties {
    #[prost(int32, tag = "1")]
    pub amount: i32,
    #[prost(bool, tag = "2")]
    pub picked_up: bool,
}

// ---------------------------------------------------------------------------
// World state
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerMap {
    #[prost(map = "int32, message", tag = "1")]
    pub objects: HashMap<i32, EntityProperties>,
    #[prost(map = "int32, message", tag = "2")]
    pub vehicles: HashMap<i32, EntityProperties>,
    #[prost(map = "int32, message", tag = "3")]
    pub blips: HashMap<i32, EntityProperties>,
    #[prost(map = "int32, message", tag = "4")]
    pub markers: HashMap<i32, EntityProperties>,
    #[prost(map = "int32, message", tag = "5")]
    pub pickups: HashMap<i32, EntityProperties>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateEntity {
    #[prost(int32, tag = "1")]
    pub net_handle: i32,
    #[prost(uint32, tag = "2")]
    pub entity_type: u32,
    #[prost(message, optional, tag = "3")]
    pub properties: Option<EntityProperties>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteEntity {
    #[prost(int32, tag = "1")]
    pub net_handle: i32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct PlayerDisconnect {
    #[prost(int64, tag = "1")]
    pub id: i64,
}

// ---------------------------------------------------------------------------
// Per-frame actor state
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VehicleData {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int32, tag = "3")]
    pub vehicle_model_hash: i32,
    #[prost(int32, tag = "4")]
    pub ped_model_hash: i32,
    #[prost(int32, tag = "5")]
    pub weapon_hash: i32,
    #[prost(bool, tag = "6")]
    pub is_shooting: bool,
    #[prost(message, optional, tag = "7")]
    pub position: Option<Vector3>,
    /// Three components despite the name; kept for wire compatibility.
    #[prost(message, optional, tag = "8")]
    pub quaternion: Option<Vector3>,
    #[prost(int32, tag = "9")]
    pub vehicle_seat: i32,
    #[prost(float, tag = "10")]
    pub vehicle_health: f32,
    #[prost(int32, tag = "11")]
    pub player_health: i32,
    #[prost(float, tag = "12")]
    pub latency: f32,
    #[prost(bool, tag = "13")]
    pub is_pressing_horn: bool,
    #[prost(bool, tag = "14")]
    pub is_siren_active: bool,
    #[prost(float, tag = "15")]
    pub speed: f32,
    #[prost(int32, tag = "16")]
    pub vehicle_handle: i32,
    #[prost(int32, tag = "17")]
    pub net_handle: i32,
    #[prost(message, optional, tag = "18")]
    pub velocity: Option<Vector3>,
    #[prost(int32, tag = "19")]
    pub ped_armor: i32,
    #[prost(bool, tag = "20")]
    pub is_vehicle_dead: bool,
    #[prost(message, optional, tag = "21")]
    pub aim_coords: Option<Vector3>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PedData {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int32, tag = "3")]
    pub ped_model_hash: i32,
    #[prost(message, optional, tag = "4")]
    pub position: Option<Vector3>,
    /// Three components despite the name; kept for wire compatibility.
    #[prost(message, optional, tag = "5")]
    pub quaternion: Option<Vector3>,
    #[prost(message, optional, tag = "6")]
    pub aim_coords: Option<Vector3>,
    #[prost(int32, tag = "7")]
    pub weapon_hash: i32,
    #[prost(int32, tag = "8")]
    pub player_health: i32,
    #[prost(float, tag = "9")]
    pub latency: f32,
    #[prost(int32, tag = "10")]
    pub net_handle: i32,
    #[prost(float, tag = "11")]
    pub speed: f32,
    #[prost(int32, tag = "12")]
    pub ped_armor: i32,
    #[prost(bool, tag = "13")]
    pub is_jumping: bool,
    #[prost(bool, tag = "14")]
    pub is_shooting: bool,
    #[prost(bool, tag = "15")]
    pub is_aiming: bool,
    #[prost(bool, tag = "16")]
    pub is_parachute_open: bool,
    #[prost(bool, tag = "17")]
    pub is_ragdoll: bool,
    #[prost(bool, tag = "18")]
    pub is_in_melee_combat: bool,
    #[prost(bool, tag = "19")]
    pub is_freefalling_with_chute: bool,
}

// ---------------------------------------------------------------------------
// Handshake / discovery
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConnectionRequest {
    #[prost(string, tag = "1")]
    pub social_club_name: String,
    #[prost(string, tag = "2")]
    pub password: String,
    #[prost(string, tag = "3")]
    pub display_name: String,
    #[prost(uint32, tag = "4")]
    pub game_version: u32,
    #[prost(uint32, tag = "5")]
    pub script_version: u32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ConnectionResponse {
    #[prost(uint32, tag = "1")]
    pub assigned_channel: u32,
    #[prost(int32, tag = "2")]
    pub character_handle: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DiscoveryResponse {
    #[prost(string, tag = "1")]
    pub server_name: String,
    #[prost(int32, tag = "2")]
    pub max_players: i32,
    #[prost(int32, tag = "3")]
    pub player_count: i32,
    #[prost(bool, tag = "4")]
    pub password_protected: bool,
    #[prost(int32, tag = "5")]
    pub port: i32,
    #[prost(string, tag = "6")]
    pub gamemode: String,
    #[prost(bool, tag = "7")]
    pub lan: bool,
}

// ---------------------------------------------------------------------------
// File transfer
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataDownloadStart {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(uint32, tag = "2")]
    pub file_type: u32,
    #[prost(string, tag = "3")]
    pub file_name: String,
    #[prost(string, tag = "4")]
    pub resource_parent: String,
    #[prost(int32, tag = "5")]
    pub length: i32,
    #[prost(string, tag = "6")]
    pub md5_hash: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileChunk {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct FileTransferComplete {
    #[prost(int32, tag = "1")]
    pub id: i32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct FileAcceptDeny {
    #[prost(int32, tag = "1")]
    pub id: i32,
    #[prost(bool, tag = "2")]
    pub accepted: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScriptCollection {
    #[prost(message, repeated, tag = "1")]
    pub clientside_scripts: Vec<ClientsideScript>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientsideScript {
    #[prost(string, tag = "1")]
    pub resource_parent: String,
    #[prost(string, tag = "2")]
    pub script: String,
}

// ---------------------------------------------------------------------------
// Sync events
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncEvent {
    #[prost(uint32, tag = "1")]
    pub event_type: u32,
    #[prost(message, repeated, tag = "2")]
    pub arguments: Vec<NativeArgument>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NativeArgument {
    #[prost(oneof = "native_argument::Value", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub value: Option<native_argument::Value>,
}

pub mod native_argument {
    /// Concrete value of a loosely-typed argument.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(int32, tag = "1")]
        Int(i32),
        #[prost(uint32, tag = "2")]
        UInt(u32),
        #[prost(string, tag = "3")]
        String(String),
        #[prost(float, tag = "4")]
        Float(f32),
        #[prost(bool, tag = "5")]
        Bool(bool),
        #[prost(message, tag = "6")]
        Vector3(super::Vector3),
        #[prost(int32, tag = "7")]
        Entity(i32),
        #[prost(message, tag = "8")]
        LocalPlayer(super::LocalPlayer),
    }
}

/// Empty marker standing for "the receiving player's own character".
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct LocalPlayer {}
