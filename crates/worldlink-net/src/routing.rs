//! Message routing: dispatch decoded messages to per-kind handlers.
//!
//! The [`MessageRouter`] maps [`PacketType`] discriminators to
//! [`MessageHandler`] implementations. Messages arrive from the network task
//! via a bounded [`tokio::sync::mpsc`] channel and are drained each
//! simulation tick by [`process_incoming_messages`].

use std::collections::HashMap;

use tokio::sync::mpsc;
use worldlink_protocol::{Message, PacketType, ReliabilityTier};

use crate::connection::ConnectionId;

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Context provided to every message handler.
pub struct HandlerContext {
    /// The connection that sent this message.
    pub connection_id: ConnectionId,
}

/// Trait for message handlers. Implemented for closures.
pub trait MessageHandler: Send + Sync {
    /// Process a single incoming message.
    fn handle(&self, msg: Message, ctx: &HandlerContext);
}

impl<F> MessageHandler for F
where
    F: Fn(Message, &HandlerContext) + Send + Sync,
{
    fn handle(&self, msg: Message, ctx: &HandlerContext) {
        self(msg, ctx);
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Routes incoming messages to registered handlers by [`PacketType`].
pub struct MessageRouter {
    handlers: HashMap<PacketType, Box<dyn MessageHandler>>,
}

impl MessageRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a packet kind, replacing any previous one.
    pub fn register<H: MessageHandler + 'static>(&mut self, kind: PacketType, handler: H) {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Route an incoming message to the registered handler.
    ///
    /// Returns `true` if a handler was found, `false` if the message was
    /// dropped.
    pub fn route(&self, msg: Message, ctx: &HandlerContext) -> bool {
        let kind = msg.packet_type();
        if let Some(handler) = self.handlers.get(&kind) {
            handler.handle(msg, ctx);
            true
        } else {
            // Position kinds arrive every tick; only reliable kinds are worth a warning.
            match kind.reliability() {
                ReliabilityTier::Unreliable => {
                    tracing::trace!(?kind, connection = %ctx.connection_id, "no handler, dropping")
                }
                ReliabilityTier::Reliable => {
                    tracing::warn!(?kind, connection = %ctx.connection_id, "no handler registered, dropping message")
                }
            }
            false
        }
    }

    /// Registered kinds, for startup logging.
    pub fn registered_kinds(&self) -> impl Iterator<Item = &PacketType> {
        self.handlers.keys()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Channel bridge
// ---------------------------------------------------------------------------

/// A decoded message and its source connection.
pub struct IncomingMessage {
    /// The connection that sent this message.
    pub connection_id: ConnectionId,
    /// The decoded message.
    pub message: Message,
}

/// Create a channel pair for passing messages from network tasks to the
/// simulation thread.
pub fn message_channel(buffer: usize) -> (mpsc::Sender<IncomingMessage>, mpsc::Receiver<IncomingMessage>) {
    mpsc::channel(buffer)
}

/// Drain all pending incoming messages and route them. Returns how many
/// found a handler.
pub fn process_incoming_messages(receiver: &mut mpsc::Receiver<IncomingMessage>, router: &MessageRouter) -> usize {
    let mut routed = 0;
    while let Ok(incoming) = receiver.try_recv() {
        let ctx = HandlerContext {
            connection_id: incoming.connection_id,
        };
        if router.route(incoming.message, &ctx) {
            routed += 1;
        }
    }
    routed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use worldlink_protocol::{
        ConnectionRequest, DeleteEntity, NativeArgument, NetHandle, PedData, SyncEvent,
    };

    fn ctx() -> HandlerContext {
        HandlerContext {
            connection_id: ConnectionId(1),
        }
    }

    fn delete(handle: i32) -> Message {
        Message::DeleteEntity(DeleteEntity {
            net_handle: NetHandle(handle),
        })
    }

    #[test]
    fn test_message_routed_to_correct_handler() {
        let handled = Arc::new(AtomicBool::new(false));
        let handled_clone = Arc::clone(&handled);

        let mut router = MessageRouter::new();
        router.register(PacketType::DeleteEntity, move |_msg: Message, _ctx: &HandlerContext| {
            handled_clone.store(true, Ordering::SeqCst);
        });

        assert!(router.route(delete(4), &ctx()));
        assert!(handled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unhandled_kind_dropped() {
        let router = MessageRouter::new();
        assert!(!router.route(delete(4), &ctx()));
        assert!(!router.route(Message::PedPosition(PedData::default()), &ctx()));
    }

    #[test]
    fn test_handler_receives_correct_payload() {
        let received = Arc::new(Mutex::new(String::new()));
        let received_clone = Arc::clone(&received);

        let mut router = MessageRouter::new();
        router.register(
            PacketType::ConnectionRequest,
            move |msg: Message, _ctx: &HandlerContext| {
                if let Message::ConnectionRequest(req) = msg {
                    *received_clone.lock().unwrap() = req.display_name;
                }
            },
        );

        let req = ConnectionRequest::new("sc", "TestPlayer", 1);
        router.route(Message::ConnectionRequest(req), &ctx());
        assert_eq!(*received.lock().unwrap(), "TestPlayer");
    }

    #[test]
    fn test_routing_is_kind_safe() {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);

        let mut router = MessageRouter::new();
        router.register(PacketType::SyncEvent, move |_: Message, _: &HandlerContext| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        router.route(delete(1), &ctx());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let event = Message::SyncEvent(SyncEvent {
            event_type: 6,
            arguments: vec![NativeArgument::Entity(NetHandle(1))],
        });
        router.route(event, &ctx());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_sees_source_connection() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let mut router = MessageRouter::new();
        router.register(PacketType::DeleteEntity, move |_: Message, ctx: &HandlerContext| {
            *seen_clone.lock().unwrap() = Some(ctx.connection_id);
        });

        let handler_ctx = HandlerContext {
            connection_id: ConnectionId(77),
        };
        router.route(delete(2), &handler_ctx);
        assert_eq!(*seen.lock().unwrap(), Some(ConnectionId(77)));
        assert_eq!(router.registered_kinds().count(), 1);
    }

    #[tokio::test]
    async fn test_message_channel_delivers_messages() {
        let (tx, mut rx) = message_channel(16);

        tx.send(IncomingMessage {
            connection_id: ConnectionId(5),
            message: delete(8),
        })
        .await
        .unwrap();

        let incoming = rx.recv().await.unwrap();
        assert_eq!(incoming.connection_id, ConnectionId(5));
        assert_eq!(incoming.message.packet_type(), PacketType::DeleteEntity);
    }

    #[tokio::test]
    async fn test_process_drains_channel() {
        let (tx, mut rx) = message_channel(16);
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        let mut router = MessageRouter::new();
        router.register(PacketType::DeleteEntity, move |_: Message, _: &HandlerContext| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        for handle in 1..=3 {
            tx.send(IncomingMessage {
                connection_id: ConnectionId(1),
                message: delete(handle),
            })
            .await
            .unwrap();
        }
        tx.send(IncomingMessage {
            connection_id: ConnectionId(1),
            message: Message::PedPosition(PedData::default()),
        })
        .await
        .unwrap();

        assert_eq!(process_incoming_messages(&mut rx, &router), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(rx.try_recv().is_err());
    }
}
