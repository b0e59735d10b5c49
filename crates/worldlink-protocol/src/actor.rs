//! High-frequency actor snapshots.
//!
//! [`VehicleData`] and [`PedData`] are sent once per simulation tick on the
//! unreliable tier. Every field may be omitted and decodes to zero, empty or
//! `false`; a receiver applies whatever arrived and never waits for the rest.

use std::collections::HashMap;

use crate::codec::WireRecord;
use crate::error::Result;
use crate::handle::NetHandle;
use crate::math::Vector3;
use crate::wire;

/// Snapshot of a player driving a vehicle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleData {
    /// Connection-scoped player id.
    pub id: i64,
    pub name: String,
    pub vehicle_model_hash: i32,
    pub ped_model_hash: i32,
    pub weapon_hash: i32,
    pub is_shooting: bool,
    pub position: Vector3,
    /// Euler orientation. Carried in the wire field named `quaternion`,
    /// which has always held three components.
    pub orientation: Vector3,
    /// Seat index; -1 is the driver.
    pub vehicle_seat: i32,
    pub vehicle_health: f32,
    pub player_health: i32,
    /// Round-trip estimate in seconds.
    pub latency: f32,
    pub is_pressing_horn: bool,
    pub is_siren_active: bool,
    pub speed: f32,
    /// The vehicle being driven.
    pub vehicle_handle: NetHandle,
    /// The driver's character.
    pub net_handle: NetHandle,
    pub velocity: Vector3,
    pub ped_armor: i32,
    pub is_vehicle_dead: bool,
    pub aim_coords: Vector3,
}

/// Snapshot of a player on foot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PedData {
    /// Connection-scoped player id.
    pub id: i64,
    pub name: String,
    pub ped_model_hash: i32,
    pub position: Vector3,
    /// Euler orientation. See [`VehicleData::orientation`].
    pub orientation: Vector3,
    pub aim_coords: Vector3,
    pub weapon_hash: i32,
    pub player_health: i32,
    pub latency: f32,
    /// The player's character.
    pub net_handle: NetHandle,
    pub speed: f32,
    pub ped_armor: i32,
    pub is_jumping: bool,
    pub is_shooting: bool,
    pub is_aiming: bool,
    pub is_parachute_open: bool,
    pub is_ragdoll: bool,
    pub is_in_melee_combat: bool,
    pub is_freefalling_with_chute: bool,
}

/// A player left the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerDisconnect {
    pub id: i64,
}

impl WireRecord for VehicleData {
    type Wire = wire::VehicleData;

    fn to_wire(&self) -> wire::VehicleData {
        wire::VehicleData {
            id: self.id,
            name: self.name.clone(),
            vehicle_model_hash: self.vehicle_model_hash,
            ped_model_hash: self.ped_model_hash,
            weapon_hash: self.weapon_hash,
            is_shooting: self.is_shooting,
            position: self.position.to_wire(),
            quaternion: self.orientation.to_wire(),
            vehicle_seat: self.vehicle_seat,
            vehicle_health: self.vehicle_health,
            player_health: self.player_health,
            latency: self.latency,
            is_pressing_horn: self.is_pressing_horn,
            is_siren_active: self.is_siren_active,
            speed: self.speed,
            vehicle_handle: self.vehicle_handle.value(),
            net_handle: self.net_handle.value(),
            velocity: self.velocity.to_wire(),
            ped_armor: self.ped_armor,
            is_vehicle_dead: self.is_vehicle_dead,
            aim_coords: self.aim_coords.to_wire(),
        }
    }

    fn from_wire(w: wire::VehicleData) -> Result<Self> {
        Ok(Self {
            id: w.id,
            name: w.name,
            vehicle_model_hash: w.vehicle_model_hash,
            ped_model_hash: w.ped_model_hash,
            weapon_hash: w.weapon_hash,
            is_shooting: w.is_shooting,
            position: Vector3::from_wire(w.position),
            orientation: Vector3::from_wire(w.quaternion),
            vehicle_seat: w.vehicle_seat,
            vehicle_health: w.vehicle_health,
            player_health: w.player_health,
            latency: w.latency,
            is_pressing_horn: w.is_pressing_horn,
            is_siren_active: w.is_siren_active,
            speed: w.speed,
            vehicle_handle: NetHandle(w.vehicle_handle),
            net_handle: NetHandle(w.net_handle),
            velocity: Vector3::from_wire(w.velocity),
            ped_armor: w.ped_armor,
            is_vehicle_dead: w.is_vehicle_dead,
            aim_coords: Vector3::from_wire(w.aim_coords),
        })
    }
}

impl WireRecord for PedData {
    type Wire = wire::PedData;

    fn to_wire(&self) -> wire::PedData {
        wire::PedData {
            id: self.id,
            name: self.name.clone(),
            ped_model_hash: self.ped_model_hash,
            position: self.position.to_wire(),
            quaternion: self.orientation.to_wire(),
            aim_coords: self.aim_coords.to_wire(),
            weapon_hash: self.weapon_hash,
            player_health: self.player_health,
            latency: self.latency,
            net_handle: self.net_handle.value(),
            speed: self.speed,
            ped_armor: self.ped_armor,
            is_jumping: self.is_jumping,
            is_shooting: self.is_shooting,
            is_aiming: self.is_aiming,
            is_parachute_open: self.is_parachute_open,
            is_ragdoll: self.is_ragdoll,
            is_in_melee_combat: self.is_in_melee_combat,
            is_freefalling_with_chute: self.is_freefalling_with_chute,
        }
    }

    fn from_wire(w: wire::PedData) -> Result<Self> {
        Ok(Self {
            id: w.id,
            name: w.name,
            ped_model_hash: w.ped_model_hash,
            position: Vector3::from_wire(w.position),
            orientation: Vector3::from_wire(w.quaternion),
            aim_coords: Vector3::from_wire(w.aim_coords),
            weapon_hash: w.weapon_hash,
            player_health: w.player_health,
            latency: w.latency,
            net_handle: NetHandle(w.net_handle),
            speed: w.speed,
            ped_armor: w.ped_armor,
            is_jumping: w.is_jumping,
            is_shooting: w.is_shooting,
            is_aiming: w.is_aiming,
            is_parachute_open: w.is_parachute_open,
            is_ragdoll: w.is_ragdoll,
            is_in_melee_combat: w.is_in_melee_combat,
            is_freefalling_with_chute: w.is_freefalling_with_chute,
        })
    }
}

impl WireRecord for PlayerDisconnect {
    type Wire = wire::PlayerDisconnect;

    fn to_wire(&self) -> wire::PlayerDisconnect {
        wire::PlayerDisconnect { id: self.id }
    }

    fn from_wire(w: wire::PlayerDisconnect) -> Result<Self> {
        Ok(Self { id: w.id })
    }
}

// ---------------------------------------------------------------------------
// Snapshot buffer
// ---------------------------------------------------------------------------

/// A per-tick record that names the actor it describes.
pub trait ActorSnapshot {
    /// The actor this snapshot belongs to.
    fn actor(&self) -> NetHandle;
}

impl ActorSnapshot for VehicleData {
    fn actor(&self) -> NetHandle {
        self.net_handle
    }
}

impl ActorSnapshot for PedData {
    fn actor(&self) -> NetHandle {
        self.net_handle
    }
}

/// Latest snapshot per actor.
///
/// Unreliable delivery may reorder packets; a snapshot stamped with an
/// older tick than the one already held is discarded.
#[derive(Debug, Clone)]
pub struct ActorSnapshotBuffer<T> {
    latest: HashMap<NetHandle, (u64, T)>,
}

impl<T> Default for ActorSnapshotBuffer<T> {
    fn default() -> Self {
        Self {
            latest: HashMap::new(),
        }
    }
}

impl<T: ActorSnapshot> ActorSnapshotBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a snapshot received at `tick`. Returns `false` when it was stale.
    pub fn offer(&mut self, tick: u64, snapshot: T) -> bool {
        let actor = snapshot.actor();
        match self.latest.get(&actor) {
            Some((held, _)) if *held > tick => {
                tracing::trace!(%actor, tick, held, "dropping stale actor snapshot");
                false
            }
            _ => {
                self.latest.insert(actor, (tick, snapshot));
                true
            }
        }
    }

    /// Most recent snapshot for `actor`.
    pub fn get(&self, actor: NetHandle) -> Option<&T> {
        self.latest.get(&actor).map(|(_, s)| s)
    }

    /// Tick of the most recent snapshot for `actor`.
    pub fn tick_of(&self, actor: NetHandle) -> Option<u64> {
        self.latest.get(&actor).map(|(t, _)| *t)
    }

    /// Forget an actor, e.g. when its entity is deleted or the character
    /// handle of a disconnecting player is released.
    pub fn remove(&mut self, actor: NetHandle) -> Option<T> {
        self.latest.remove(&actor).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
