//! Tagged, argument-list based state mutations.
//!
//! A [`SyncEvent`] is an event-type tag plus an ordered list of loosely typed
//! [`NativeArgument`]s. Each [`SyncEventType`] has a fixed signature whose
//! first argument is always the target entity. [`SyncEvent::interpret`]
//! checks arity and argument types and yields a typed [`SyncAction`]; an
//! event that does not match its signature is malformed and is never
//! partially applied.

use crate::codec::WireRecord;
use crate::entity::{DOOR_COUNT, EntityProperties, EntityType, TIRE_COUNT};
use crate::error::{ProtocolError, Result, narrow_u8};
use crate::handle::NetHandle;
use crate::math::Vector3;
use crate::wire::{self, native_argument::Value};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// A loosely typed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeArgument {
    /// Signed integer.
    Int(i32),
    /// Unsigned integer.
    UInt(u32),
    /// String.
    String(String),
    /// Float.
    Float(f32),
    /// Boolean.
    Bool(bool),
    /// Vector.
    Vector3(Vector3),
    /// Networked entity.
    Entity(NetHandle),
    /// The receiving player's own character.
    LocalPlayer,
}

/// Type of a [`NativeArgument`], used in event signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// [`NativeArgument::Int`].
    Int,
    /// [`NativeArgument::UInt`].
    UInt,
    /// [`NativeArgument::String`].
    String,
    /// [`NativeArgument::Float`].
    Float,
    /// [`NativeArgument::Bool`].
    Bool,
    /// [`NativeArgument::Vector3`].
    Vector3,
    /// [`NativeArgument::Entity`].
    Entity,
    /// [`NativeArgument::LocalPlayer`].
    LocalPlayer,
}

impl NativeArgument {
    /// The type of this argument.
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Self::Int(_) => ArgumentKind::Int,
            Self::UInt(_) => ArgumentKind::UInt,
            Self::String(_) => ArgumentKind::String,
            Self::Float(_) => ArgumentKind::Float,
            Self::Bool(_) => ArgumentKind::Bool,
            Self::Vector3(_) => ArgumentKind::Vector3,
            Self::Entity(_) => ArgumentKind::Entity,
            Self::LocalPlayer => ArgumentKind::LocalPlayer,
        }
    }

    fn from_wire(w: wire::NativeArgument) -> Result<Self> {
        let value = w
            .value
            .ok_or_else(|| ProtocolError::malformed("native argument without a value"))?;
        Ok(match value {
            Value::Int(v) => Self::Int(v),
            Value::UInt(v) => Self::UInt(v),
            Value::String(v) => Self::String(v),
            Value::Float(v) => Self::Float(v),
            Value::Bool(v) => Self::Bool(v),
            Value::Vector3(v) => Self::Vector3(Vector3::new(v.x, v.y, v.z)),
            Value::Entity(v) => Self::Entity(NetHandle(v)),
            Value::LocalPlayer(_) => Self::LocalPlayer,
        })
    }

    fn to_wire(&self) -> wire::NativeArgument {
        let value = match self {
            Self::Int(v) => Value::Int(*v),
            Self::UInt(v) => Value::UInt(*v),
            Self::String(v) => Value::String(v.clone()),
            Self::Float(v) => Value::Float(*v),
            Self::Bool(v) => Value::Bool(*v),
            Self::Vector3(v) => Value::Vector3(wire::Vector3 {
                x: v.x,
                y: v.y,
                z: v.z,
            }),
            Self::Entity(h) => Value::Entity(h.value()),
            Self::LocalPlayer => Value::LocalPlayer(wire::LocalPlayer {}),
        };
        wire::NativeArgument { value: Some(value) }
    }
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Sync event tag. Values are fixed forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SyncEventType {
    /// Aircraft landing gear state.
    LandingGearChange = 0,
    /// A vehicle door opened or closed.
    DoorStateChange = 1,
    /// Vehicle lights toggled.
    BooleanLights = 2,
    /// Trailer attached or detached.
    TrailerDeTach = 3,
    /// A tire burst.
    TireBurst = 4,
    /// Vehicle radio station changed.
    RadioChange = 5,
    /// A pickup was collected.
    PickupPickedUp = 6,
}

impl SyncEventType {
    /// Look up a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::LandingGearChange),
            1 => Ok(Self::DoorStateChange),
            2 => Ok(Self::BooleanLights),
            3 => Ok(Self::TrailerDeTach),
            4 => Ok(Self::TireBurst),
            5 => Ok(Self::RadioChange),
            6 => Ok(Self::PickupPickedUp),
            other => Err(ProtocolError::malformed(format!(
                "unknown sync event type {other}"
            ))),
        }
    }

    /// The full argument signature, target entity first.
    pub fn signature(self) -> &'static [ArgumentKind] {
        use ArgumentKind::{Bool, Entity, Int};
        match self {
            Self::LandingGearChange => &[Entity, Int],
            Self::DoorStateChange => &[Entity, Int, Bool],
            Self::BooleanLights => &[Entity, Int, Bool],
            Self::TrailerDeTach => &[Entity, Bool, Entity],
            Self::TireBurst => &[Entity, Int],
            Self::RadioChange => &[Entity, Int],
            Self::PickupPickedUp => &[Entity],
        }
    }

    /// Entity variant the target must be.
    pub fn target_type(self) -> EntityType {
        match self {
            Self::PickupPickedUp => EntityType::Pickup,
            _ => EntityType::Vehicle,
        }
    }
}

/// Which vehicle lights a [`SyncAction::BooleanLights`] toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lights {
    /// Regular headlights.
    NormalLights = 0,
    /// High beams.
    Highbeams = 1,
}

// ---------------------------------------------------------------------------
// SyncEvent / SyncAction
// ---------------------------------------------------------------------------

/// A sync event as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEvent {
    /// Raw event-type tag.
    pub event_type: u8,
    /// Ordered argument list.
    pub arguments: Vec<NativeArgument>,
}

/// A validated sync event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncAction {
    /// Landing gear moved to `state`.
    LandingGearChange {
        /// Target vehicle.
        vehicle: NetHandle,
        /// Engine-defined gear state.
        state: i32,
    },
    /// A door opened or closed.
    DoorStateChange {
        /// Target vehicle.
        vehicle: NetHandle,
        /// Door id, below [`DOOR_COUNT`].
        door: usize,
        /// New open state.
        open: bool,
    },
    /// Lights toggled.
    BooleanLights {
        /// Target vehicle.
        vehicle: NetHandle,
        /// Which lights.
        lights: Lights,
        /// New state.
        on: bool,
    },
    /// Trailer attached to or detached from a vehicle.
    TrailerDeTach {
        /// Towing vehicle.
        vehicle: NetHandle,
        /// `true` when attaching.
        attached: bool,
        /// Trailer entity; ignored when detaching.
        trailer: NetHandle,
    },
    /// A tire burst.
    TireBurst {
        /// Target vehicle.
        vehicle: NetHandle,
        /// Tire id, below [`TIRE_COUNT`].
        tire: usize,
    },
    /// Radio station changed.
    RadioChange {
        /// Target vehicle.
        vehicle: NetHandle,
        /// Engine-defined station id.
        station: i32,
    },
    /// A pickup was collected.
    PickupPickedUp {
        /// Target pickup.
        pickup: NetHandle,
    },
}

/// What applying a [`SyncAction`] did to entity properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    /// A replicated property changed.
    Mutated,
    /// No replicated property covers this event; it is only forwarded to
    /// the simulation layer.
    ForwardOnly,
}

impl SyncEvent {
    /// Build the wire event for a typed action.
    pub fn from_action(action: &SyncAction) -> Self {
        use NativeArgument::{Bool, Entity, Int};
        let arguments = match *action {
            SyncAction::LandingGearChange { vehicle, state } => vec![Entity(vehicle), Int(state)],
            SyncAction::DoorStateChange {
                vehicle,
                door,
                open,
            } => vec![Entity(vehicle), Int(wire_index(door)), Bool(open)],
            SyncAction::BooleanLights {
                vehicle,
                lights,
                on,
            } => vec![Entity(vehicle), Int(lights as i32), Bool(on)],
            SyncAction::TrailerDeTach {
                vehicle,
                attached,
                trailer,
            } => vec![Entity(vehicle), Bool(attached), Entity(trailer)],
            SyncAction::TireBurst { vehicle, tire } => vec![Entity(vehicle), Int(wire_index(tire))],
            SyncAction::RadioChange { vehicle, station } => vec![Entity(vehicle), Int(station)],
            SyncAction::PickupPickedUp { pickup } => vec![Entity(pickup)],
        };
        Self {
            event_type: action.event_type() as u8,
            arguments,
        }
    }

    /// Validate arity, argument types, and ranges, producing a typed action.
    pub fn interpret(&self) -> Result<SyncAction> {
        let event_type = SyncEventType::from_tag(self.event_type)?;
        let signature = event_type.signature();
        if self.arguments.len() != signature.len() {
            return Err(ProtocolError::malformed(format!(
                "{event_type:?} expects {} arguments, got {}",
                signature.len(),
                self.arguments.len()
            )));
        }
        for (i, (arg, expected)) in self.arguments.iter().zip(signature).enumerate() {
            if arg.kind() != *expected {
                return Err(ProtocolError::malformed(format!(
                    "{event_type:?} argument {i} must be {expected:?}, got {:?}",
                    arg.kind()
                )));
            }
        }

        let args = &self.arguments;
        let target = entity_at(args, 0);
        Ok(match event_type {
            SyncEventType::LandingGearChange => SyncAction::LandingGearChange {
                vehicle: target,
                state: int_at(args, 1),
            },
            SyncEventType::DoorStateChange => SyncAction::DoorStateChange {
                vehicle: target,
                door: index_at(args, 1, DOOR_COUNT, "door")?,
                open: bool_at(args, 2),
            },
            SyncEventType::BooleanLights => SyncAction::BooleanLights {
                vehicle: target,
                lights: match int_at(args, 1) {
                    0 => Lights::NormalLights,
                    1 => Lights::Highbeams,
                    other => {
                        return Err(ProtocolError::malformed(format!("unknown lights kind {other}")));
                    }
                },
                on: bool_at(args, 2),
            },
            SyncEventType::TrailerDeTach => SyncAction::TrailerDeTach {
                vehicle: target,
                attached: bool_at(args, 1),
                trailer: entity_at(args, 2),
            },
            SyncEventType::TireBurst => SyncAction::TireBurst {
                vehicle: target,
                tire: index_at(args, 1, TIRE_COUNT, "tire")?,
            },
            SyncEventType::RadioChange => SyncAction::RadioChange {
                vehicle: target,
                station: int_at(args, 1),
            },
            SyncEventType::PickupPickedUp => SyncAction::PickupPickedUp { pickup: target },
        })
    }
}

// Accessors below run only after the signature check, so the kinds match.

fn entity_at(args: &[NativeArgument], i: usize) -> NetHandle {
    match args[i] {
        NativeArgument::Entity(h) => h,
        _ => NetHandle::NULL,
    }
}

fn int_at(args: &[NativeArgument], i: usize) -> i32 {
    match args[i] {
        NativeArgument::Int(v) => v,
        _ => 0,
    }
}

fn bool_at(args: &[NativeArgument], i: usize) -> bool {
    matches!(args[i], NativeArgument::Bool(true))
}

fn index_at(args: &[NativeArgument], i: usize, len: usize, what: &str) -> Result<usize> {
    let raw = int_at(args, i);
    usize::try_from(raw)
        .ok()
        .filter(|idx| *idx < len)
        .ok_or_else(|| ProtocolError::malformed(format!("{what} index {raw} out of range 0..{len}")))
}

/// Indices beyond `i32` saturate so the receiver rejects them as out of range.
fn wire_index(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn out_of_range(what: &str, index: usize, len: usize) -> ProtocolError {
    ProtocolError::malformed(format!("{what} index {index} out of range 0..{len}"))
}

impl SyncAction {
    /// The event tag for this action.
    pub fn event_type(&self) -> SyncEventType {
        match self {
            Self::LandingGearChange { .. } => SyncEventType::LandingGearChange,
            Self::DoorStateChange { .. } => SyncEventType::DoorStateChange,
            Self::BooleanLights { .. } => SyncEventType::BooleanLights,
            Self::TrailerDeTach { .. } => SyncEventType::TrailerDeTach,
            Self::TireBurst { .. } => SyncEventType::TireBurst,
            Self::RadioChange { .. } => SyncEventType::RadioChange,
            Self::PickupPickedUp { .. } => SyncEventType::PickupPickedUp,
        }
    }

    /// The entity this action mutates.
    pub fn target(&self) -> NetHandle {
        match *self {
            Self::LandingGearChange { vehicle, .. }
            | Self::DoorStateChange { vehicle, .. }
            | Self::BooleanLights { vehicle, .. }
            | Self::TrailerDeTach { vehicle, .. }
            | Self::TireBurst { vehicle, .. }
            | Self::RadioChange { vehicle, .. } => vehicle,
            Self::PickupPickedUp { pickup } => pickup,
        }
    }

    /// Apply to the target's properties.
    ///
    /// Fails with [`ProtocolError::SchemaMismatch`] before touching anything
    /// when `props` is not the variant this action targets.
    pub fn apply(&self, props: &mut EntityProperties) -> Result<SyncEffect> {
        props.expect_type(self.event_type().target_type())?;
        match *self {
            Self::DoorStateChange { door, open, .. } => {
                let slot = props
                    .vehicle_mut()?
                    .doors
                    .get_mut(door)
                    .ok_or_else(|| out_of_range("door", door, DOOR_COUNT))?;
                *slot = open;
            }
            Self::TrailerDeTach {
                attached, trailer, ..
            } => {
                props.vehicle_mut()?.trailer = if attached { trailer } else { NetHandle::NULL };
            }
            Self::TireBurst { tire, .. } => {
                let slot = props
                    .vehicle_mut()?
                    .tires
                    .get_mut(tire)
                    .ok_or_else(|| out_of_range("tire", tire, TIRE_COUNT))?;
                *slot = true;
            }
            Self::PickupPickedUp { .. } => {
                props.pickup_mut()?.picked_up = true;
            }
            Self::LandingGearChange { .. } | Self::BooleanLights { .. } | Self::RadioChange { .. } => {
                return Ok(SyncEffect::ForwardOnly);
            }
        }
        Ok(SyncEffect::Mutated)
    }
}

impl WireRecord for SyncEvent {
    type Wire = wire::SyncEvent;

    fn to_wire(&self) -> wire::SyncEvent {
        wire::SyncEvent {
            event_type: u32::from(self.event_type),
            arguments: self.arguments.iter().map(NativeArgument::to_wire).collect(),
        }
    }

    fn from_wire(w: wire::SyncEvent) -> Result<Self> {
        Ok(Self {
            event_type: narrow_u8(w.event_type, "sync_event.event_type")?,
            arguments: w
                .arguments
                .into_iter()
                .map(NativeArgument::from_wire)
                .collect::<Result<_>>()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityVariant;

    fn vehicle_props() -> EntityProperties {
        EntityProperties::new(EntityType::Vehicle)
    }

    #[test]
    fn test_tire_burst_sets_only_that_slot() {
        let event = SyncEvent {
            event_type: SyncEventType::TireBurst as u8,
            arguments: vec![NativeArgument::Entity(NetHandle(9)), NativeArgument::Int(3)],
        };
        let mut props = vehicle_props();
        let action = event.interpret().unwrap();
        assert_eq!(action.apply(&mut props).unwrap(), SyncEffect::Mutated);

        let tires = props.as_vehicle().unwrap().tires;
        for (i, burst) in tires.iter().enumerate() {
            assert_eq!(*burst, i == 3, "tire {i}");
        }
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let event = SyncEvent {
            event_type: SyncEventType::TireBurst as u8,
            arguments: vec![NativeArgument::Entity(NetHandle(9))],
        };
        assert!(event.interpret().unwrap_err().is_malformed());
    }

    #[test]
    fn test_wrong_argument_type_is_malformed() {
        let event = SyncEvent {
            event_type: SyncEventType::DoorStateChange as u8,
            arguments: vec![
                NativeArgument::Entity(NetHandle(9)),
                NativeArgument::Float(2.0),
                NativeArgument::Bool(true),
            ],
        };
        assert!(event.interpret().unwrap_err().is_malformed());
    }

    #[test]
    fn test_out_of_range_index_is_malformed() {
        for (kind, index) in [(SyncEventType::TireBurst, 8), (SyncEventType::TireBurst, -1)] {
            let event = SyncEvent {
                event_type: kind as u8,
                arguments: vec![NativeArgument::Entity(NetHandle(1)), NativeArgument::Int(index)],
            };
            assert!(event.interpret().unwrap_err().is_malformed());
        }
        let door = SyncEvent::from_action(&SyncAction::DoorStateChange {
            vehicle: NetHandle(1),
            door: 6,
            open: true,
        });
        assert!(door.interpret().is_ok());
    }

    #[test]
    fn test_unknown_event_type_is_malformed() {
        let event = SyncEvent {
            event_type: 42,
            arguments: vec![],
        };
        assert!(event.interpret().unwrap_err().is_malformed());
    }

    #[test]
    fn test_door_and_trailer_mutations() {
        let mut props = vehicle_props();
        SyncAction::DoorStateChange {
            vehicle: NetHandle(1),
            door: 2,
            open: true,
        }
        .apply(&mut props)
        .unwrap();
        SyncAction::TrailerDeTach {
            vehicle: NetHandle(1),
            attached: true,
            trailer: NetHandle(77),
        }
        .apply(&mut props)
        .unwrap();
        let v = props.as_vehicle().unwrap();
        assert!(v.doors[2]);
        assert_eq!(v.trailer, NetHandle(77));

        SyncAction::TrailerDeTach {
            vehicle: NetHandle(1),
            attached: false,
            trailer: NetHandle(77),
        }
        .apply(&mut props)
        .unwrap();
        assert!(props.as_vehicle().unwrap().trailer.is_null());
    }

    #[test]
    fn test_pickup_collected() {
        let mut props = EntityProperties::new(EntityType::Pickup);
        let effect = SyncAction::PickupPickedUp {
            pickup: NetHandle(5),
        }
        .apply(&mut props)
        .unwrap();
        assert_eq!(effect, SyncEffect::Mutated);
        assert!(props.as_pickup().unwrap().picked_up);
    }

    #[test]
    fn test_forward_only_events_leave_properties_untouched() {
        let mut props = vehicle_props();
        let before = props.clone();
        let effect = SyncAction::RadioChange {
            vehicle: NetHandle(1),
            station: 4,
        }
        .apply(&mut props)
        .unwrap();
        assert_eq!(effect, SyncEffect::ForwardOnly);
        assert_eq!(props, before);
    }

    #[test]
    fn test_apply_rejects_out_of_range_index() {
        let mut props = vehicle_props();
        let before = props.clone();
        let door = SyncAction::DoorStateChange {
            vehicle: NetHandle(1),
            door: DOOR_COUNT + 2,
            open: true,
        };
        assert!(door.apply(&mut props).unwrap_err().is_malformed());
        let tire = SyncAction::TireBurst {
            vehicle: NetHandle(1),
            tire: TIRE_COUNT,
        };
        assert!(tire.apply(&mut props).unwrap_err().is_malformed());
        assert_eq!(props, before);
    }

    #[test]
    fn test_huge_index_does_not_wrap_on_wire() {
        let event = SyncEvent::from_action(&SyncAction::TireBurst {
            vehicle: NetHandle(1),
            tire: usize::MAX,
        });
        assert_eq!(event.arguments[1], NativeArgument::Int(i32::MAX));
        assert!(event.interpret().unwrap_err().is_malformed());
    }

    #[test]
    fn test_apply_to_wrong_variant_is_schema_mismatch() {
        let mut blip = EntityProperties::new(EntityType::Blip);
        let before = blip.clone();
        let result = SyncAction::TireBurst {
            vehicle: NetHandle(1),
            tire: 0,
        }
        .apply(&mut blip);
        assert!(matches!(result, Err(ProtocolError::SchemaMismatch { .. })));
        assert_eq!(blip, before);
        assert!(matches!(blip.variant, EntityVariant::Blip(_)));
    }

    #[test]
    fn test_wire_roundtrip_keeps_argument_types() {
        let event = SyncEvent {
            event_type: SyncEventType::BooleanLights as u8,
            arguments: vec![
                NativeArgument::Entity(NetHandle(3)),
                NativeArgument::Int(1),
                NativeArgument::Bool(true),
            ],
        };
        let decoded = SyncEvent::decode(&event.encode()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(
            decoded.interpret().unwrap(),
            SyncAction::BooleanLights {
                vehicle: NetHandle(3),
                lights: Lights::Highbeams,
                on: true,
            }
        );
    }

    #[test]
    fn test_empty_argument_on_wire_is_malformed() {
        let bytes = prost::Message::encode_to_vec(&wire::SyncEvent {
            event_type: 6,
            arguments: vec![wire::NativeArgument { value: None }],
        });
        assert!(SyncEvent::decode(&bytes).unwrap_err().is_malformed());
    }
}
