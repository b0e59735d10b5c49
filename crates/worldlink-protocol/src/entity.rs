//! Polymorphic world-object state.
//!
//! [`EntityProperties`] is a base record (position, rotation, model hash)
//! plus a closed [`EntityVariant`] union. On the wire the base carries an
//! explicit [`EntityType`] tag and at most one variant sub-message; the tag is
//! the only source of truth for which variant a record is. A record whose
//! sub-message disagrees with its tag is rejected with
//! [`ProtocolError::SchemaMismatch`], never coerced.
//!
//! Omitted fields decode to the documented defaults ([`DEFAULT_VEHICLE_HEALTH`],
//! all-zero mods, closed doors, intact tires, blip scale 1.0 and alpha 255),
//! and encoding omits every field equal to its default. Incremental updates can
//! therefore carry only what changed.

use crate::codec::WireRecord;
use crate::error::{ProtocolError, Result};
use crate::handle::NetHandle;
use crate::math::Vector3;
use crate::wire::{self, entity_properties::Variant};

/// Number of vehicle modification slots.
pub const MOD_SLOTS: usize = 50;
/// Number of vehicle doors.
pub const DOOR_COUNT: usize = 7;
/// Number of vehicle tires.
pub const TIRE_COUNT: usize = 8;
/// Health of a freshly spawned vehicle.
pub const DEFAULT_VEHICLE_HEALTH: f32 = 1000.0;
/// Scale of a freshly created blip.
pub const DEFAULT_BLIP_SCALE: f32 = 1.0;
/// Alpha of a freshly created blip.
pub const DEFAULT_BLIP_ALPHA: i32 = 255;

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Wire tag of each concrete entity variant. Values are fixed forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntityType {
    /// Drivable vehicle.
    Vehicle = 1,
    /// Static prop with no variant fields.
    Prop = 2,
    /// Map blip.
    Blip = 3,
    /// World-space marker.
    Marker = 4,
    /// Collectable pickup.
    Pickup = 5,
}

impl EntityType {
    /// The wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u32> for EntityType {
    type Error = ProtocolError;

    fn try_from(tag: u32) -> Result<Self> {
        match tag {
            1 => Ok(Self::Vehicle),
            2 => Ok(Self::Prop),
            3 => Ok(Self::Blip),
            4 => Ok(Self::Marker),
            5 => Ok(Self::Pickup),
            other => Err(ProtocolError::malformed(format!(
                "unknown entity type {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// Replicated vehicle state.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleProperties {
    /// Primary paint color index.
    pub primary_color: i32,
    /// Secondary paint color index.
    pub secondary_color: i32,
    /// Body health; [`DEFAULT_VEHICLE_HEALTH`] when spawned.
    pub health: f32,
    /// Whether the vehicle is destroyed.
    pub is_dead: bool,
    /// Modification index per mod slot.
    pub mods: [i32; MOD_SLOTS],
    /// Whether the siren is on.
    pub siren: bool,
    /// Open state per door id.
    pub doors: [bool; DOOR_COUNT],
    /// Attached trailer, or null.
    pub trailer: NetHandle,
    /// Burst state per tire id.
    pub tires: [bool; TIRE_COUNT],
}

impl Default for VehicleProperties {
    fn default() -> Self {
        Self {
            primary_color: 0,
            secondary_color: 0,
            health: DEFAULT_VEHICLE_HEALTH,
            is_dead: false,
            mods: [0; MOD_SLOTS],
            siren: false,
            doors: [false; DOOR_COUNT],
            trailer: NetHandle::NULL,
            tires: [false; TIRE_COUNT],
        }
    }
}

/// Replicated map blip state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlipProperties {
    /// Sprite id.
    pub sprite: i32,
    /// Icon scale.
    pub scale: f32,
    /// Color index.
    pub color: i32,
    /// Only shown on the minimap when nearby.
    pub is_short_range: bool,
    /// Opacity, 0..=255.
    pub alpha: i32,
}

impl Default for BlipProperties {
    fn default() -> Self {
        Self {
            sprite: 0,
            scale: DEFAULT_BLIP_SCALE,
            color: 0,
            is_short_range: false,
            alpha: DEFAULT_BLIP_ALPHA,
        }
    }
}

/// Replicated marker state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarkerProperties {
    /// Facing direction.
    pub direction: Vector3,
    /// Marker shape id.
    pub marker_type: i32,
    /// Red channel.
    pub red: i32,
    /// Green channel.
    pub green: i32,
    /// Blue channel.
    pub blue: i32,
    /// Alpha channel.
    pub alpha: i32,
    /// Per-axis scale.
    pub scale: Vector3,
}

/// Replicated pickup state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PickupProperties {
    /// Amount granted when collected.
    pub amount: i32,
    /// Whether it has already been collected.
    pub picked_up: bool,
}

/// Variant-specific part of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityVariant {
    /// See [`VehicleProperties`].
    Vehicle(VehicleProperties),
    /// See [`BlipProperties`].
    Blip(BlipProperties),
    /// See [`MarkerProperties`].
    Marker(MarkerProperties),
    /// See [`PickupProperties`].
    Pickup(PickupProperties),
    /// A prop carries only the base fields.
    Prop,
}

impl EntityVariant {
    /// The wire tag for this variant.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Vehicle(_) => EntityType::Vehicle,
            Self::Blip(_) => EntityType::Blip,
            Self::Marker(_) => EntityType::Marker,
            Self::Pickup(_) => EntityType::Pickup,
            Self::Prop => EntityType::Prop,
        }
    }

    /// The variant with every field at its documented default.
    pub fn default_for(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Vehicle => Self::Vehicle(VehicleProperties::default()),
            EntityType::Blip => Self::Blip(BlipProperties::default()),
            EntityType::Marker => Self::Marker(MarkerProperties::default()),
            EntityType::Pickup => Self::Pickup(PickupProperties::default()),
            EntityType::Prop => Self::Prop,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityProperties
// ---------------------------------------------------------------------------

/// Full replicated state of one world object.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityProperties {
    /// World position.
    pub position: Vector3,
    /// Euler rotation.
    pub rotation: Vector3,
    /// Model hash of the spawned object.
    pub model_hash: i32,
    /// Variant-specific state; determines the wire entity type.
    pub variant: EntityVariant,
}

impl EntityProperties {
    /// Create a record with zeroed base fields and a default variant.
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            position: Vector3::ZERO,
            rotation: Vector3::ZERO,
            model_hash: 0,
            variant: EntityVariant::default_for(entity_type),
        }
    }

    /// Create a record with the given base fields and variant.
    pub fn with(position: Vector3, rotation: Vector3, model_hash: i32, variant: EntityVariant) -> Self {
        Self {
            position,
            rotation,
            model_hash,
            variant,
        }
    }

    /// The wire tag for this record.
    pub fn entity_type(&self) -> EntityType {
        self.variant.entity_type()
    }

    /// Fail with [`ProtocolError::SchemaMismatch`] unless this record is `expected`.
    pub fn expect_type(&self, expected: EntityType) -> Result<()> {
        let found = self.entity_type();
        if found == expected {
            Ok(())
        } else {
            Err(ProtocolError::SchemaMismatch { expected, found })
        }
    }

    /// Mutable vehicle state, or a schema mismatch.
    pub fn vehicle_mut(&mut self) -> Result<&mut VehicleProperties> {
        match &mut self.variant {
            EntityVariant::Vehicle(v) => Ok(v),
            other => Err(ProtocolError::SchemaMismatch {
                expected: EntityType::Vehicle,
                found: other.entity_type(),
            }),
        }
    }

    /// Mutable pickup state, or a schema mismatch.
    pub fn pickup_mut(&mut self) -> Result<&mut PickupProperties> {
        match &mut self.variant {
            EntityVariant::Pickup(p) => Ok(p),
            other => Err(ProtocolError::SchemaMismatch {
                expected: EntityType::Pickup,
                found: other.entity_type(),
            }),
        }
    }

    /// Vehicle state, if this is a vehicle.
    pub fn as_vehicle(&self) -> Option<&VehicleProperties> {
        match &self.variant {
            EntityVariant::Vehicle(v) => Some(v),
            _ => None,
        }
    }

    /// Blip state, if this is a blip.
    pub fn as_blip(&self) -> Option<&BlipProperties> {
        match &self.variant {
            EntityVariant::Blip(b) => Some(b),
            _ => None,
        }
    }

    /// Marker state, if this is a marker.
    pub fn as_marker(&self) -> Option<&MarkerProperties> {
        match &self.variant {
            EntityVariant::Marker(m) => Some(m),
            _ => None,
        }
    }

    /// Pickup state, if this is a pickup.
    pub fn as_pickup(&self) -> Option<&PickupProperties> {
        match &self.variant {
            EntityVariant::Pickup(p) => Some(p),
            _ => None,
        }
    }

    /// Decode a record that must be of `expected` type.
    ///
    /// A payload tagged as another variant yields
    /// [`ProtocolError::SchemaMismatch`]; no partially-populated value is
    /// ever returned.
    pub fn decode_as(bytes: &[u8], expected: EntityType) -> Result<Self> {
        let props = Self::decode(bytes)?;
        props.expect_type(expected)?;
        Ok(props)
    }
}

impl WireRecord for EntityProperties {
    type Wire = wire::EntityProperties;

    fn from_wire(w: wire::EntityProperties) -> Result<Self> {
        let declared = EntityType::try_from(w.entity_type)?;
        let variant = match (declared, w.variant) {
            (EntityType::Vehicle, Some(Variant::Vehicle(v))) => {
                EntityVariant::Vehicle(VehicleProperties::from_wire(v)?)
            }
            (EntityType::Blip, Some(Variant::Blip(b))) => EntityVariant::Blip(BlipProperties::from_wire(b)),
            (EntityType::Marker, Some(Variant::Marker(m))) => {
                EntityVariant::Marker(MarkerProperties::from_wire(m))
            }
            (EntityType::Pickup, Some(Variant::Pickup(p))) => {
                EntityVariant::Pickup(PickupProperties::from_wire(p))
            }
            // A tag without a sub-message means every variant field was omitted.
            (declared, None) => EntityVariant::default_for(declared),
            (declared, Some(other)) => {
                return Err(ProtocolError::SchemaMismatch {
                    expected: declared,
                    found: wire_variant_type(&other),
                });
            }
        };

        Ok(Self {
            position: Vector3::from_wire(w.position),
            rotation: Vector3::from_wire(w.rotation),
            model_hash: w.model_hash,
            variant,
        })
    }

    fn to_wire(&self) -> wire::EntityProperties {
        let variant = match &self.variant {
            EntityVariant::Vehicle(v) => Some(Variant::Vehicle(v.to_wire())),
            EntityVariant::Blip(b) => Some(Variant::Blip(b.to_wire())),
            EntityVariant::Marker(m) => Some(Variant::Marker(m.to_wire())),
            EntityVariant::Pickup(p) => Some(Variant::Pickup(p.to_wire())),
            EntityVariant::Prop => None,
        };
        wire::EntityProperties {
            position: self.position.to_wire(),
            rotation: self.rotation.to_wire(),
            model_hash: self.model_hash,
            entity_type: u32::from(self.entity_type().tag()),
            variant,
        }
    }
}

fn wire_variant_type(variant: &Variant) -> EntityType {
    match variant {
        Variant::Vehicle(_) => EntityType::Vehicle,
        Variant::Blip(_) => EntityType::Blip,
        Variant::Marker(_) => EntityType::Marker,
        Variant::Pickup(_) => EntityType::Pickup,
    }
}

/// An empty repeated field means "default"; anything else must be exactly `N` long.
fn fixed_array<T: Copy, const N: usize>(values: Vec<T>, default: T, field: &'static str) -> Result<[T; N]> {
    if values.is_empty() {
        return Ok([default; N]);
    }
    let actual = values.len();
    <[T; N]>::try_from(values).map_err(|_| ProtocolError::LengthViolation {
        field,
        actual: actual as i64,
        allowed: N as i64,
    })
}

/// Arrays still at their default are omitted from the wire.
fn sparse_array<T: Copy + PartialEq>(values: &[T], default: T) -> Vec<T> {
    if values.iter().all(|v| *v == default) {
        Vec::new()
    } else {
        values.to_vec()
    }
}

impl VehicleProperties {
    fn from_wire(w: wire::VehicleProperties) -> Result<Self> {
        Ok(Self {
            primary_color: w.primary_color,
            secondary_color: w.secondary_color,
            health: w.health.unwrap_or(DEFAULT_VEHICLE_HEALTH),
            is_dead: w.is_dead,
            mods: fixed_array(w.mods, 0, "vehicle.mods")?,
            siren: w.siren,
            doors: fixed_array(w.doors, false, "vehicle.doors")?,
            trailer: NetHandle(w.trailer),
            tires: fixed_array(w.tires, false, "vehicle.tires")?,
        })
    }

    fn to_wire(&self) -> wire::VehicleProperties {
        wire::VehicleProperties {
            primary_color: self.primary_color,
            secondary_color: self.secondary_color,
            health: (self.health != DEFAULT_VEHICLE_HEALTH).then_some(self.health),
            is_dead: self.is_dead,
            mods: sparse_array(&self.mods, 0),
            siren: self.siren,
            doors: sparse_array(&self.doors, false),
            trailer: self.trailer.value(),
            tires: sparse_array(&self.tires, false),
        }
    }
}

impl BlipProperties {
    fn from_wire(w: wire::BlipProperties) -> Self {
        Self {
            sprite: w.sprite,
            scale: w.scale.unwrap_or(DEFAULT_BLIP_SCALE),
            color: w.color,
            is_short_range: w.is_short_range,
            alpha: w.alpha.unwrap_or(DEFAULT_BLIP_ALPHA),
        }
    }

    fn to_wire(self) -> wire::BlipProperties {
        wire::BlipProperties {
            sprite: self.sprite,
            scale: (self.scale != DEFAULT_BLIP_SCALE).then_some(self.scale),
            color: self.color,
            is_short_range: self.is_short_range,
            alpha: (self.alpha != DEFAULT_BLIP_ALPHA).then_some(self.alpha),
        }
    }
}

impl MarkerProperties {
    fn from_wire(w: wire::MarkerProperties) -> Self {
        Self {
            direction: Vector3::from_wire(w.direction),
            marker_type: w.marker_type,
            red: w.red,
            green: w.green,
            blue: w.blue,
            alpha: w.alpha,
            scale: Vector3::from_wire(w.scale),
        }
    }

    fn to_wire(self) -> wire::MarkerProperties {
        wire::MarkerProperties {
            direction: self.direction.to_wire(),
            marker_type: self.marker_type,
            red: self.red,
            green: self.green,
            blue: self.blue,
            alpha: self.alpha,
            scale: self.scale.to_wire(),
        }
    }
}

impl PickupProperties {
    fn from_wire(w: wire::PickupProperties) -> Self {
        Self {
            amount: w.amount,
            picked_up: w.picked_up,
        }
    }

    fn to_wire(self) -> wire::PickupProperties {
        wire::PickupProperties {
            amount: self.amount,
            picked_up: self.picked_up,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn sample_vehicle() -> EntityProperties {
        let mut v = VehicleProperties {
            primary_color: 12,
            secondary_color: 3,
            health: 640.5,
            siren: true,
            trailer: NetHandle(88),
            ..Default::default()
        };
        v.mods[11] = 3;
        v.doors[4] = true;
        v.tires[0] = true;
        EntityProperties::with(
            Vector3::new(100.0, -200.0, 30.0),
            Vector3::new(0.0, 0.0, 90.0),
            0x1234,
            EntityVariant::Vehicle(v),
        )
    }

    #[test]
    fn test_vehicle_roundtrip() {
        let original = sample_vehicle();
        let decoded = EntityProperties::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_vehicle_without_health_decodes_to_default() {
        let bytes = wire::EntityProperties {
            entity_type: 1,
            variant: Some(Variant::Vehicle(wire::VehicleProperties {
                primary_color: 5,
                ..Default::default()
            })),
            ..Default::default()
        }
        .encode_to_vec();

        let decoded = EntityProperties::decode(&bytes).unwrap();
        let vehicle = decoded.as_vehicle().unwrap();
        assert_eq!(vehicle.health, DEFAULT_VEHICLE_HEALTH);
        assert_eq!(vehicle.mods, [0; MOD_SLOTS]);
        assert_eq!(vehicle.doors, [false; DOOR_COUNT]);
        assert_eq!(vehicle.tires, [false; TIRE_COUNT]);
        assert!(vehicle.trailer.is_null());
        assert_eq!(vehicle.primary_color, 5);
    }

    #[test]
    fn test_explicit_zero_health_survives() {
        let mut props = EntityProperties::new(EntityType::Vehicle);
        props.vehicle_mut().unwrap().health = 0.0;
        let decoded = EntityProperties::decode(&props.encode()).unwrap();
        assert_eq!(decoded.as_vehicle().unwrap().health, 0.0);
    }

    #[test]
    fn test_blip_defaults_apply_when_omitted() {
        let bytes = wire::EntityProperties {
            entity_type: 3,
            variant: None,
            ..Default::default()
        }
        .encode_to_vec();
        let decoded = EntityProperties::decode(&bytes).unwrap();
        let blip = decoded.as_blip().unwrap();
        assert_eq!(blip.sprite, 0);
        assert_eq!(blip.scale, 1.0);
        assert_eq!(blip.alpha, 255);
    }

    #[test]
    fn test_blip_explicit_zero_alpha_survives() {
        let props = EntityProperties {
            variant: EntityVariant::Blip(BlipProperties {
                alpha: 0,
                scale: 0.0,
                ..Default::default()
            }),
            ..EntityProperties::new(EntityType::Blip)
        };
        let decoded = EntityProperties::decode(&props.encode()).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_default_records_encode_sparsely() {
        let vehicle = EntityProperties::new(EntityType::Vehicle).encode();
        // entity_type field plus an empty vehicle sub-message.
        assert!(vehicle.len() <= 4, "got {} bytes", vehicle.len());
        let decoded = EntityProperties::decode(&vehicle).unwrap();
        assert_eq!(decoded, EntityProperties::new(EntityType::Vehicle));
    }

    #[test]
    fn test_vehicle_decoded_as_blip_is_schema_mismatch() {
        let bytes = sample_vehicle().encode();
        let result = EntityProperties::decode_as(&bytes, EntityType::Blip);
        assert_eq!(
            result,
            Err(ProtocolError::SchemaMismatch {
                expected: EntityType::Blip,
                found: EntityType::Vehicle,
            })
        );
    }

    #[test]
    fn test_tag_disagreeing_with_payload_is_rejected() {
        let bytes = wire::EntityProperties {
            entity_type: u32::from(EntityType::Blip.tag()),
            variant: Some(Variant::Vehicle(wire::VehicleProperties::default())),
            ..Default::default()
        }
        .encode_to_vec();
        assert!(matches!(
            EntityProperties::decode(&bytes),
            Err(ProtocolError::SchemaMismatch {
                expected: EntityType::Blip,
                found: EntityType::Vehicle,
            })
        ));
    }

    #[test]
    fn test_prop_with_variant_payload_is_rejected() {
        let bytes = wire::EntityProperties {
            entity_type: u32::from(EntityType::Prop.tag()),
            variant: Some(Variant::Pickup(wire::PickupProperties::default())),
            ..Default::default()
        }
        .encode_to_vec();
        assert!(matches!(
            EntityProperties::decode(&bytes),
            Err(ProtocolError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_entity_type_is_malformed() {
        for tag in [0u32, 6, 200] {
            let bytes = wire::EntityProperties {
                entity_type: tag,
                ..Default::default()
            }
            .encode_to_vec();
            assert!(EntityProperties::decode(&bytes).unwrap_err().is_malformed());
        }
    }

    #[test]
    fn test_short_mod_array_is_length_violation() {
        let bytes = wire::EntityProperties {
            entity_type: 1,
            variant: Some(Variant::Vehicle(wire::VehicleProperties {
                mods: vec![1; 12],
                ..Default::default()
            })),
            ..Default::default()
        }
        .encode_to_vec();
        assert_eq!(
            EntityProperties::decode(&bytes),
            Err(ProtocolError::LengthViolation {
                field: "vehicle.mods",
                actual: 12,
                allowed: MOD_SLOTS as i64,
            })
        );
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        // A newer peer added field 40 to the marker schema.
        let marker = EntityProperties {
            variant: EntityVariant::Marker(MarkerProperties {
                marker_type: 2,
                red: 255,
                alpha: 120,
                scale: Vector3::new(1.0, 1.0, 2.0),
                ..Default::default()
            }),
            ..EntityProperties::new(EntityType::Marker)
        };
        let mut bytes = marker.encode();
        // field 40, varint: key = (40 << 3) | 0 = 320 -> 0xC0 0x02
        bytes.extend_from_slice(&[0xC0, 0x02, 0x07]);
        assert_eq!(EntityProperties::decode(&bytes).unwrap(), marker);

        // Existing pickup bytes are untouched by the marker extension.
        let pickup = EntityProperties {
            variant: EntityVariant::Pickup(PickupProperties {
                amount: 50,
                picked_up: false,
            }),
            ..EntityProperties::new(EntityType::Pickup)
        };
        assert_eq!(EntityProperties::decode(&pickup.encode()).unwrap(), pickup);
    }

    #[test]
    fn test_accessors_report_mismatch() {
        let mut blip = EntityProperties::new(EntityType::Blip);
        assert!(matches!(
            blip.vehicle_mut(),
            Err(ProtocolError::SchemaMismatch {
                expected: EntityType::Vehicle,
                found: EntityType::Blip,
            })
        ));
        assert!(blip.as_marker().is_none());
        assert!(blip.as_pickup().is_none());
    }
}
