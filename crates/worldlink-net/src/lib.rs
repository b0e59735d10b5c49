//! Async plumbing around the worldlink protocol: envelope framing over byte
//! streams, routing by packet kind, server-side sessions, and the shared
//! world snapshot.

pub mod connection;
pub mod framing;
pub mod mirror;
pub mod routing;
pub mod session;

pub use connection::{ConnectionId, IdGenerator};
pub use framing::{FrameError, read_message, write_message};
pub use mirror::WorldMirror;
pub use routing::{
    HandlerContext, IncomingMessage, MessageHandler, MessageRouter, message_channel, process_incoming_messages,
};
pub use session::{PeerSession, SessionError, SessionManager, SessionState, StrikeVerdict, timeout_check};
