//! Server-side connection sessions.
//!
//! Tracks each connection through `AwaitingRequest → Connected → removed`,
//! runs the handshake against a [`ServerHandshakePolicy`], and counts
//! malformed packets per peer. Provides timeout detection for stale
//! sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use worldlink_protocol::{
    ConnectionRequest, ConnectionResponse, HandshakeError, NetHandle, PacketType, ProtocolError, ReliabilityTier,
    ServerHandshakePolicy,
};

use crate::connection::ConnectionId;

/// Number of ordered channels handed out round-robin to new players.
pub const ORDERED_CHANNELS: u32 = 32;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connected, waiting for a `ConnectionRequest`.
    AwaitingRequest,
    /// Handshake succeeded, player is in the world.
    Connected,
}

/// Per-connection session data.
#[derive(Debug, Clone)]
pub struct PeerSession {
    /// The underlying connection identifier.
    pub connection_id: ConnectionId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Display name from the handshake.
    pub display_name: String,
    /// Character entity; null until connected.
    pub character: NetHandle,
    /// Ordered channel assigned at handshake.
    pub channel: u8,
    /// Malformed packets received so far.
    pub strikes: u32,
    /// Timestamp of the last received message, for timeout detection.
    pub last_activity: Instant,
}

/// Errors from [`SessionManager::handle_connection_request`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    #[error("session not found for connection {0}")]
    SessionNotFound(ConnectionId),
    /// The session already completed its handshake.
    #[error("invalid session state for handshake: {0:?}")]
    InvalidState(SessionState),
    /// The handshake itself failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

impl SessionError {
    /// Whether the connection must be closed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Handshake(e) => e.is_fatal(),
            Self::SessionNotFound(_) | Self::InvalidState(_) => false,
        }
    }
}

/// Outcome of reporting a bad message against a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeVerdict {
    /// Drop the message and keep the connection.
    Tolerated {
        /// Strikes accumulated so far.
        strikes: u32,
    },
    /// Close the connection.
    Disconnect,
}

/// Manages all active sessions and provides lifecycle operations.
pub struct SessionManager {
    sessions: RwLock<HashMap<ConnectionId, PeerSession>>,
    policy: ServerHandshakePolicy,
    strike_limit: u32,
    next_character: AtomicI32,
    next_channel: AtomicU32,
}

impl SessionManager {
    /// Create a session manager admitting players under `policy`. A peer is
    /// disconnected once its malformed-packet count reaches `strike_limit`.
    pub fn new(policy: ServerHandshakePolicy, strike_limit: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
            strike_limit,
            next_character: AtomicI32::new(1),
            next_channel: AtomicU32::new(0),
        }
    }

    /// Called when a transport connection is accepted.
    pub async fn on_connect(&self, connection_id: ConnectionId) {
        let session = PeerSession {
            connection_id,
            state: SessionState::AwaitingRequest,
            display_name: String::new(),
            character: NetHandle::NULL,
            channel: 0,
            strikes: 0,
            last_activity: Instant::now(),
        };
        self.sessions.write().await.insert(connection_id, session);
        tracing::debug!(connection = %connection_id, "session opened");
    }

    /// Run the handshake for a connection's `ConnectionRequest`.
    ///
    /// A fatal failure removes the session; the caller must close the
    /// transport. No response is produced unless the request was admitted.
    pub async fn handle_connection_request(
        &self,
        connection_id: ConnectionId,
        request: &ConnectionRequest,
    ) -> Result<ConnectionResponse, SessionError> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get(&connection_id)
            .map(|s| s.state)
            .ok_or(SessionError::SessionNotFound(connection_id))?;
        if state != SessionState::AwaitingRequest {
            return Err(SessionError::InvalidState(state));
        }

        let players = sessions
            .values()
            .filter(|s| s.state == SessionState::Connected)
            .count();
        let channel = (self.next_channel.load(Ordering::Relaxed) % ORDERED_CHANNELS) as u8 + 1;
        let character = NetHandle(self.next_character.load(Ordering::Relaxed));

        match self.policy.admit(request, players, channel, character) {
            Ok(response) => {
                self.next_channel.fetch_add(1, Ordering::Relaxed);
                self.next_character.fetch_add(1, Ordering::Relaxed);
                if let Some(session) = sessions.get_mut(&connection_id) {
                    session.state = SessionState::Connected;
                    session.display_name = request.display_name.clone();
                    session.character = response.character_handle;
                    session.channel = response.assigned_channel;
                    session.last_activity = Instant::now();
                }
                Ok(response)
            }
            Err(e) => {
                if e.is_fatal() {
                    sessions.remove(&connection_id);
                }
                Err(e.into())
            }
        }
    }

    /// Report a message from `connection_id` that failed to decode or apply.
    ///
    /// `kind` is `None` when the discriminator itself was unknown. Malformed
    /// packets on reliable kinds count as strikes; fatal errors disconnect
    /// immediately.
    pub async fn record_error(
        &self,
        connection_id: ConnectionId,
        kind: Option<PacketType>,
        error: &ProtocolError,
    ) -> StrikeVerdict {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&connection_id) else {
            return StrikeVerdict::Disconnect;
        };

        if error.is_fatal() {
            tracing::warn!(connection = %connection_id, "fatal protocol error: {error}");
            sessions.remove(&connection_id);
            return StrikeVerdict::Disconnect;
        }

        let counts = error.is_malformed()
            && kind.is_none_or(|k| k.reliability() == ReliabilityTier::Reliable);
        if counts {
            session.strikes += 1;
        }
        let strikes = session.strikes;
        tracing::warn!(connection = %connection_id, ?kind, strikes, "dropped message: {error}");

        if strikes >= self.strike_limit {
            tracing::warn!(connection = %connection_id, strikes, "strike limit reached");
            sessions.remove(&connection_id);
            StrikeVerdict::Disconnect
        } else {
            StrikeVerdict::Tolerated { strikes }
        }
    }

    /// Remove a connection. Returns the session that was closed.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) -> Option<PeerSession> {
        let session = self.sessions.write().await.remove(&connection_id)?;
        tracing::info!(
            connection = %connection_id,
            name = %session.display_name,
            character = %session.character,
            "session closed"
        );
        Some(session)
    }

    /// Update last_activity timestamp for a connection.
    pub async fn touch(&self, connection_id: ConnectionId) {
        if let Some(session) = self.sessions.write().await.get_mut(&connection_id) {
            session.last_activity = Instant::now();
        }
    }

    /// Get the current state of a session.
    pub async fn state(&self, connection_id: ConnectionId) -> Option<SessionState> {
        self.sessions.read().await.get(&connection_id).map(|s| s.state)
    }

    /// Snapshot of a session.
    pub async fn session(&self, connection_id: ConnectionId) -> Option<PeerSession> {
        self.sessions.read().await.get(&connection_id).cloned()
    }

    /// Number of players past the handshake.
    pub async fn player_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.state == SessionState::Connected)
            .count()
    }
}

/// Disconnect every session idle for longer than `timeout`. Returns the
/// connections that were closed.
pub async fn timeout_check(session_manager: &SessionManager, timeout: Duration) -> Vec<ConnectionId> {
    let sessions = session_manager.sessions.read().await;
    let stale: Vec<ConnectionId> = sessions
        .iter()
        .filter(|(_, s)| s.last_activity.elapsed() > timeout)
        .map(|(id, _)| *id)
        .collect();
    drop(sessions);

    for id in &stale {
        tracing::warn!(connection = %id, "session timed out");
        session_manager.on_disconnect(*id).await;
    }
    stale
}
