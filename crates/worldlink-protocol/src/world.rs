//! World snapshot model and the entity lifecycle messages that edit it.
//!
//! A [`ServerMap`] groups entity records into five categories. `objects` is
//! heterogeneous; the remaining four only hold their own variant, and a
//! snapshot that violates this is rejected as a whole. Decoding builds the
//! complete value before returning it, so a failed decode never leaves a
//! half-populated map behind.

use std::collections::HashMap;

use crate::codec::WireRecord;
use crate::entity::{EntityProperties, EntityType};
use crate::error::{ProtocolError, Result};
use crate::handle::NetHandle;
use crate::sync_event::{SyncAction, SyncEffect, SyncEvent};
use crate::wire;

/// Storage category inside a [`ServerMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    /// Any variant; props always land here.
    Objects,
    /// Vehicles only.
    Vehicles,
    /// Blips only.
    Blips,
    /// Markers only.
    Markers,
    /// Pickups only.
    Pickups,
}

impl EntityCategory {
    /// Every category, in wire tag order.
    pub const ALL: [EntityCategory; 5] = [
        Self::Objects,
        Self::Vehicles,
        Self::Blips,
        Self::Markers,
        Self::Pickups,
    ];

    /// The category a freshly created entity of `entity_type` is stored in.
    pub fn for_type(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Vehicle => Self::Vehicles,
            EntityType::Blip => Self::Blips,
            EntityType::Marker => Self::Markers,
            EntityType::Pickup => Self::Pickups,
            EntityType::Prop => Self::Objects,
        }
    }

    /// The only variant this category accepts, or `None` for `Objects`.
    pub fn required_type(self) -> Option<EntityType> {
        match self {
            Self::Objects => None,
            Self::Vehicles => Some(EntityType::Vehicle),
            Self::Blips => Some(EntityType::Blip),
            Self::Markers => Some(EntityType::Marker),
            Self::Pickups => Some(EntityType::Pickup),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMap
// ---------------------------------------------------------------------------

/// Full snapshot of every networked world object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerMap {
    objects: HashMap<NetHandle, EntityProperties>,
    vehicles: HashMap<NetHandle, EntityProperties>,
    blips: HashMap<NetHandle, EntityProperties>,
    markers: HashMap<NetHandle, EntityProperties>,
    pickups: HashMap<NetHandle, EntityProperties>,
}

impl ServerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of one category.
    pub fn category(&self, category: EntityCategory) -> &HashMap<NetHandle, EntityProperties> {
        match category {
            EntityCategory::Objects => &self.objects,
            EntityCategory::Vehicles => &self.vehicles,
            EntityCategory::Blips => &self.blips,
            EntityCategory::Markers => &self.markers,
            EntityCategory::Pickups => &self.pickups,
        }
    }

    fn category_mut(&mut self, category: EntityCategory) -> &mut HashMap<NetHandle, EntityProperties> {
        match category {
            EntityCategory::Objects => &mut self.objects,
            EntityCategory::Vehicles => &mut self.vehicles,
            EntityCategory::Blips => &mut self.blips,
            EntityCategory::Markers => &mut self.markers,
            EntityCategory::Pickups => &mut self.pickups,
        }
    }

    /// Store `props` in the category matching its variant, replacing any
    /// previous record under the same handle there.
    pub fn insert(&mut self, handle: NetHandle, props: EntityProperties) -> Option<EntityProperties> {
        let category = EntityCategory::for_type(props.entity_type());
        self.category_mut(category).insert(handle, props)
    }

    /// Store `props` in an explicit category.
    ///
    /// Homogeneous categories reject other variants with
    /// [`ProtocolError::SchemaMismatch`].
    pub fn insert_into(
        &mut self,
        category: EntityCategory,
        handle: NetHandle,
        props: EntityProperties,
    ) -> Result<Option<EntityProperties>> {
        if let Some(required) = category.required_type() {
            props.expect_type(required)?;
        }
        Ok(self.category_mut(category).insert(handle, props))
    }

    /// Look up a handle in one category.
    pub fn get(&self, category: EntityCategory, handle: NetHandle) -> Option<&EntityProperties> {
        self.category(category).get(&handle)
    }

    /// Look up a handle across every category, typed categories first.
    pub fn find(&self, handle: NetHandle) -> Option<(EntityCategory, &EntityProperties)> {
        Self::SEARCH_ORDER
            .iter()
            .find_map(|c| self.get(*c, handle).map(|props| (*c, props)))
    }

    const SEARCH_ORDER: [EntityCategory; 5] = [
        EntityCategory::Vehicles,
        EntityCategory::Blips,
        EntityCategory::Markers,
        EntityCategory::Pickups,
        EntityCategory::Objects,
    ];

    /// Remove a handle from every category. Returns how many records went away.
    pub fn remove(&mut self, handle: NetHandle) -> usize {
        EntityCategory::ALL
            .iter()
            .filter(|c| self.category_mut(**c).remove(&handle).is_some())
            .count()
    }

    /// Total number of records across all categories.
    pub fn len(&self) -> usize {
        EntityCategory::ALL.iter().map(|c| self.category(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record with its category and handle.
    pub fn iter(&self) -> impl Iterator<Item = (EntityCategory, NetHandle, &EntityProperties)> {
        EntityCategory::ALL
            .into_iter()
            .flat_map(move |c| self.category(c).iter().map(move |(h, p)| (c, *h, p)))
    }

    // -- Lifecycle messages -------------------------------------------------

    /// Apply a [`CreateEntity`]. A null handle is malformed.
    pub fn apply_create(&mut self, create: &CreateEntity) -> Result<()> {
        if create.net_handle.is_null() {
            return Err(ProtocolError::malformed("create entity with null handle"));
        }
        if let Some(old) = self.insert(create.net_handle, create.properties.clone()) {
            tracing::debug!(
                handle = %create.net_handle,
                previous = ?old.entity_type(),
                "create replaced existing entity"
            );
        }
        Ok(())
    }

    /// Apply a [`DeleteEntity`]. Returns `false` when the handle was unknown.
    pub fn apply_delete(&mut self, delete: &DeleteEntity) -> bool {
        self.remove(delete.net_handle) > 0
    }

    /// Replace the properties of an existing marker.
    pub fn apply_marker_update(&mut self, update: &CreateEntity) -> Result<()> {
        update.properties.expect_type(EntityType::Marker)?;
        let slot = self
            .markers
            .get_mut(&update.net_handle)
            .ok_or(ProtocolError::UnknownEntity(update.net_handle))?;
        *slot = update.properties.clone();
        Ok(())
    }

    /// Validate a sync event, locate its target, and apply it.
    ///
    /// Validation, lookup and variant check all happen before the first
    /// write, so a failing event leaves the map untouched.
    pub fn apply_sync_event(&mut self, event: &SyncEvent) -> Result<(SyncAction, SyncEffect)> {
        let action = event.interpret()?;
        let target = action.target();
        let typed = EntityCategory::for_type(action.event_type().target_type());
        let category = [typed, EntityCategory::Objects]
            .into_iter()
            .find(|c| self.category(*c).contains_key(&target))
            .ok_or(ProtocolError::UnknownEntity(target))?;
        let props = self
            .category_mut(category)
            .get_mut(&target)
            .ok_or(ProtocolError::UnknownEntity(target))?;
        let effect = action.apply(props)?;
        Ok((action, effect))
    }
}

impl WireRecord for ServerMap {
    type Wire = wire::ServerMap;

    fn to_wire(&self) -> wire::ServerMap {
        let encode = |m: &HashMap<NetHandle, EntityProperties>| {
            m.iter().map(|(h, p)| (h.value(), p.to_wire())).collect()
        };
        wire::ServerMap {
            objects: encode(&self.objects),
            vehicles: encode(&self.vehicles),
            blips: encode(&self.blips),
            markers: encode(&self.markers),
            pickups: encode(&self.pickups),
        }
    }

    fn from_wire(w: wire::ServerMap) -> Result<Self> {
        Ok(Self {
            objects: decode_category(w.objects, EntityCategory::Objects)?,
            vehicles: decode_category(w.vehicles, EntityCategory::Vehicles)?,
            blips: decode_category(w.blips, EntityCategory::Blips)?,
            markers: decode_category(w.markers, EntityCategory::Markers)?,
            pickups: decode_category(w.pickups, EntityCategory::Pickups)?,
        })
    }
}

fn decode_category(
    entries: HashMap<i32, wire::EntityProperties>,
    category: EntityCategory,
) -> Result<HashMap<NetHandle, EntityProperties>> {
    entries
        .into_iter()
        .map(|(handle, w)| {
            let props = EntityProperties::from_wire(w)?;
            if let Some(required) = category.required_type() {
                props.expect_type(required)?;
            }
            Ok((NetHandle(handle), props))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Lifecycle messages
// ---------------------------------------------------------------------------

/// Announces a new networked entity. Also the shape of marker updates.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEntity {
    /// Handle assigned by the authority.
    pub net_handle: NetHandle,
    /// Initial state; its variant is the declared entity type.
    pub properties: EntityProperties,
}

impl WireRecord for CreateEntity {
    type Wire = wire::CreateEntity;

    fn to_wire(&self) -> wire::CreateEntity {
        wire::CreateEntity {
            net_handle: self.net_handle.value(),
            entity_type: u32::from(self.properties.entity_type().tag()),
            properties: Some(self.properties.to_wire()),
        }
    }

    fn from_wire(w: wire::CreateEntity) -> Result<Self> {
        let declared = EntityType::try_from(w.entity_type)?;
        let properties = match w.properties {
            Some(p) => {
                let props = EntityProperties::from_wire(p)?;
                props.expect_type(declared)?;
                props
            }
            None => EntityProperties::new(declared),
        };
        Ok(Self {
            net_handle: NetHandle(w.net_handle),
            properties,
        })
    }
}

/// Destroys a networked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteEntity {
    pub net_handle: NetHandle,
}

impl WireRecord for DeleteEntity {
    type Wire = wire::DeleteEntity;

    fn to_wire(&self) -> wire::DeleteEntity {
        wire::DeleteEntity {
            net_handle: self.net_handle.value(),
        }
    }

    fn from_wire(w: wire::DeleteEntity) -> Result<Self> {
        Ok(Self {
            net_handle: NetHandle(w.net_handle),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
