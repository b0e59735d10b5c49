//! Shared, atomically published copy of the world snapshot.
//!
//! The network task decodes and edits a private [`ServerMap`] and publishes
//! it with a single pointer swap. Readers on the simulation thread hold an
//! `Arc` to whichever snapshot was current when they asked, so they never
//! observe a half-applied update.

use std::sync::Arc;

use tokio::sync::RwLock;
use worldlink_protocol::{Message, ProtocolError, ServerMap, WireRecord};

/// Atomically swapped [`ServerMap`].
pub struct WorldMirror {
    current: RwLock<Arc<ServerMap>>,
}

impl WorldMirror {
    /// Create a mirror holding an empty map.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ServerMap::new())),
        }
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<ServerMap> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the snapshot wholesale.
    pub async fn publish(&self, map: ServerMap) {
        let entities = map.len();
        *self.current.write().await = Arc::new(map);
        tracing::debug!(entities, "world snapshot published");
    }

    /// Decode a full snapshot and publish it. On failure the previous
    /// snapshot stays in place.
    pub async fn publish_encoded(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let map = ServerMap::decode(bytes)?;
        self.publish(map).await;
        Ok(())
    }

    /// Edit the current snapshot and publish it if `edit` succeeds.
    ///
    /// With no reader holding the snapshot the map is edited in place, so
    /// `edit` must leave it untouched when it returns an error. The
    /// `ServerMap::apply_*` methods all check before their first write.
    /// Otherwise a copy is edited and swapped in, and readers keep theirs.
    pub async fn update<T>(
        &self,
        edit: impl FnOnce(&mut ServerMap) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let mut guard = self.current.write().await;
        if let Some(map) = Arc::get_mut(&mut *guard) {
            return edit(map);
        }
        let mut next = ServerMap::clone(&guard);
        let out = edit(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }

    /// Apply a world-editing message. Returns `false` for kinds that do not
    /// touch the world map.
    pub async fn apply(&self, message: &Message) -> Result<bool, ProtocolError> {
        match message {
            Message::CreateEntity(create) => self.update(|map| map.apply_create(create)).await?,
            Message::DeleteEntity(delete) => {
                let removed = self.update(|map| Ok(map.apply_delete(delete))).await?;
                if !removed {
                    tracing::debug!(handle = %delete.net_handle, "delete for unknown entity");
                }
            }
            Message::UpdateMarkerProperties(update) => self.update(|map| map.apply_marker_update(update)).await?,
            Message::SyncEvent(event) => {
                let (action, effect) = self.update(|map| map.apply_sync_event(event)).await?;
                tracing::trace!(?action, ?effect, "sync event applied");
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl Default for WorldMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldlink_protocol::{
        CreateEntity, DeleteEntity, EntityCategory, EntityProperties, EntityType, NativeArgument, NetHandle,
        PedData, SyncEvent, SyncEventType,
    };

    fn create(handle: i32, entity_type: EntityType) -> Message {
        Message::CreateEntity(CreateEntity {
            net_handle: NetHandle(handle),
            properties: EntityProperties::new(entity_type),
        })
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot() {
        let mirror = WorldMirror::new();
        let before = mirror.snapshot().await;
        mirror.apply(&create(1, EntityType::Vehicle)).await.unwrap();
        let after = mirror.snapshot().await;

        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_decode_keeps_previous_snapshot() {
        let mirror = WorldMirror::new();
        mirror.apply(&create(1, EntityType::Blip)).await.unwrap();

        let mut bad = ServerMap::new();
        bad.insert(NetHandle(2), EntityProperties::new(EntityType::Marker));
        let mut bytes = bad.encode();
        bytes.truncate(bytes.len() - 1);

        assert!(mirror.publish_encoded(&bytes).await.is_err());
        let current = mirror.snapshot().await;
        assert!(current.get(EntityCategory::Blips, NetHandle(1)).is_some());
        assert_eq!(current.len(), 1);
    }

    #[tokio::test]
    async fn test_publish_encoded_replaces_everything() {
        let mirror = WorldMirror::new();
        mirror.apply(&create(1, EntityType::Blip)).await.unwrap();

        let mut fresh = ServerMap::new();
        fresh.insert(NetHandle(7), EntityProperties::new(EntityType::Pickup));
        mirror.publish_encoded(&fresh.encode()).await.unwrap();

        assert_eq!(*mirror.snapshot().await, fresh);
    }

    #[tokio::test]
    async fn test_failed_sync_event_leaves_world_untouched() {
        let mirror = WorldMirror::new();
        mirror.apply(&create(1, EntityType::Blip)).await.unwrap();
        let before = mirror.snapshot().await;

        let event = Message::SyncEvent(SyncEvent {
            event_type: SyncEventType::TireBurst as u8,
            arguments: vec![NativeArgument::Entity(NetHandle(1)), NativeArgument::Int(2)],
        });
        assert!(mirror.apply(&event).await.is_err());
        assert!(Arc::ptr_eq(&before, &mirror.snapshot().await));
    }

    #[tokio::test]
    async fn test_unshared_snapshot_is_edited_in_place() {
        let mirror = WorldMirror::new();
        mirror.apply(&create(1, EntityType::Blip)).await.unwrap();
        let ptr = Arc::as_ptr(&mirror.snapshot().await);

        mirror.apply(&create(2, EntityType::Marker)).await.unwrap();
        let after = mirror.snapshot().await;
        assert_eq!(Arc::as_ptr(&after), ptr);
        assert_eq!(after.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_in_place_edit_leaves_world_untouched() {
        let mirror = WorldMirror::new();
        mirror.apply(&create(1, EntityType::Blip)).await.unwrap();
        let expected = ServerMap::clone(&*mirror.snapshot().await);

        let event = Message::SyncEvent(SyncEvent {
            event_type: SyncEventType::DoorStateChange as u8,
            arguments: vec![
                NativeArgument::Entity(NetHandle(1)),
                NativeArgument::Int(0),
                NativeArgument::Bool(true),
            ],
        });
        assert!(mirror.apply(&event).await.is_err());
        assert_eq!(*mirror.snapshot().await, expected);
    }

    #[tokio::test]
    async fn test_apply_routes_world_messages() {
        let mirror = WorldMirror::new();
        mirror.apply(&create(3, EntityType::Vehicle)).await.unwrap();
        let burst = Message::SyncEvent(SyncEvent {
            event_type: SyncEventType::TireBurst as u8,
            arguments: vec![NativeArgument::Entity(NetHandle(3)), NativeArgument::Int(5)],
        });
        assert!(mirror.apply(&burst).await.unwrap());
        let tires = mirror
            .snapshot()
            .await
            .get(EntityCategory::Vehicles, NetHandle(3))
            .and_then(|p| p.as_vehicle().map(|v| v.tires))
            .unwrap();
        assert!(tires[5]);

        let delete = Message::DeleteEntity(DeleteEntity {
            net_handle: NetHandle(3),
        });
        assert!(mirror.apply(&delete).await.unwrap());
        assert!(mirror.snapshot().await.is_empty());

        let unrelated = Message::PedPosition(PedData::default());
        assert!(!mirror.apply(&unrelated).await.unwrap());
    }
}
