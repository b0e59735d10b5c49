//! Connection negotiation.
//!
//! The client sends a [`ConnectionRequest`] and waits; the server either
//! answers with a [`ConnectionResponse`] or rejects. A script version outside
//! the server's supported range is a protocol error and ends the connection;
//! the remaining rejections are recoverable and leave the client free to try
//! again.

use crate::codec::WireRecord;
use crate::error::{ProtocolError, Result, narrow_u8};
use crate::handle::NetHandle;
use crate::wire;

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Script/protocol version tag. Strictly increasing with each release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ScriptVersion {
    Unknown = 0,
    V0_6 = 1,
    V0_6_1 = 2,
    V0_7 = 3,
    V0_8_1 = 4,
    V0_9 = 5,
}

impl ScriptVersion {
    /// The newest version this build speaks.
    pub const LATEST: ScriptVersion = ScriptVersion::V0_9;

    /// Look up a wire tag. Tags from newer releases are `None`.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Unknown),
            1 => Some(Self::V0_6),
            2 => Some(Self::V0_6_1),
            3 => Some(Self::V0_7),
            4 => Some(Self::V0_8_1),
            5 => Some(Self::V0_9),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Inclusive range of script version tags a peer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub min: u8,
    pub max: u8,
}

impl VersionRange {
    pub fn new(min: ScriptVersion, max: ScriptVersion) -> Self {
        Self {
            min: min.tag(),
            max: max.tag(),
        }
    }

    pub fn contains(&self, offered: u8) -> bool {
        (self.min..=self.max).contains(&offered)
    }

    /// Fail with [`ProtocolError::VersionIncompatible`] outside the range.
    pub fn check(&self, offered: u8) -> Result<()> {
        if self.contains(offered) {
            Ok(())
        } else {
            Err(ProtocolError::VersionIncompatible {
                offered,
                min_supported: self.min,
                max_supported: self.max,
            })
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::new(ScriptVersion::V0_6, ScriptVersion::LATEST)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Join request sent by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub social_club_name: String,
    /// Plain server password; empty when none.
    pub password: String,
    pub display_name: String,
    pub game_version: u8,
    pub script_version: u8,
}

impl ConnectionRequest {
    /// A request advertising [`ScriptVersion::LATEST`].
    pub fn new(social_club_name: impl Into<String>, display_name: impl Into<String>, game_version: u8) -> Self {
        Self {
            social_club_name: social_club_name.into(),
            password: String::new(),
            display_name: display_name.into(),
            game_version,
            script_version: ScriptVersion::LATEST.tag(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }
}

/// Server's acceptance of a [`ConnectionRequest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionResponse {
    /// Channel the client should use for ordered traffic.
    pub assigned_channel: u8,
    /// Character entity created for the player.
    pub character_handle: NetHandle,
}

impl WireRecord for ConnectionRequest {
    type Wire = wire::ConnectionRequest;

    fn to_wire(&self) -> wire::ConnectionRequest {
        wire::ConnectionRequest {
            social_club_name: self.social_club_name.clone(),
            password: self.password.clone(),
            display_name: self.display_name.clone(),
            game_version: u32::from(self.game_version),
            script_version: u32::from(self.script_version),
        }
    }

    fn from_wire(w: wire::ConnectionRequest) -> Result<Self> {
        Ok(Self {
            social_club_name: w.social_club_name,
            password: w.password,
            display_name: w.display_name,
            game_version: narrow_u8(w.game_version, "connection_request.game_version")?,
            script_version: narrow_u8(w.script_version, "connection_request.script_version")?,
        })
    }
}

impl WireRecord for ConnectionResponse {
    type Wire = wire::ConnectionResponse;

    fn to_wire(&self) -> wire::ConnectionResponse {
        wire::ConnectionResponse {
            assigned_channel: u32::from(self.assigned_channel),
            character_handle: self.character_handle.value(),
        }
    }

    fn from_wire(w: wire::ConnectionResponse) -> Result<Self> {
        Ok(Self {
            assigned_channel: narrow_u8(w.assigned_channel, "connection_response.assigned_channel")?,
            character_handle: NetHandle(w.character_handle),
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Recoverable reasons a server turns a client away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeRejection {
    #[error("wrong password")]
    WrongPassword,
    #[error("server is full")]
    ServerFull,
    #[error("empty display name")]
    EmptyName,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection rejected: {0}")]
    Rejected(#[from] HandshakeRejection),

    #[error("handshake message in state {state:?}: {detail}")]
    UnexpectedState {
        state: ClientState,
        detail: &'static str,
    },
}

impl HandshakeError {
    /// Whether the connection must be closed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Protocol(e) => e.is_fatal(),
            Self::Rejected(_) | Self::UnexpectedState { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Admission rules the server applies to every [`ConnectionRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandshakePolicy {
    pub versions: VersionRange,
    /// Required password; `None` for an open server.
    pub password: Option<String>,
    pub max_players: usize,
}

impl Default for ServerHandshakePolicy {
    fn default() -> Self {
        Self {
            versions: VersionRange::default(),
            password: None,
            max_players: 32,
        }
    }
}

impl ServerHandshakePolicy {
    /// Decide whether `request` may join a server with `current_players` online.
    ///
    /// The version check runs first so an incompatible peer is always told
    /// so, whatever else is wrong with its request.
    pub fn evaluate(&self, request: &ConnectionRequest, current_players: usize) -> std::result::Result<(), HandshakeError> {
        self.versions.check(request.script_version)?;

        if request.display_name.trim().is_empty() {
            return Err(HandshakeRejection::EmptyName.into());
        }
        if let Some(expected) = &self.password
            && !expected.is_empty()
            && request.password != *expected
        {
            return Err(HandshakeRejection::WrongPassword.into());
        }
        if current_players >= self.max_players {
            return Err(HandshakeRejection::ServerFull.into());
        }
        Ok(())
    }

    /// Evaluate `request` and build the response on admission.
    ///
    /// No response exists unless the request passed every check.
    pub fn admit(
        &self,
        request: &ConnectionRequest,
        current_players: usize,
        assigned_channel: u8,
        character_handle: NetHandle,
    ) -> std::result::Result<ConnectionResponse, HandshakeError> {
        match self.evaluate(request, current_players) {
            Ok(()) => {
                tracing::info!(
                    name = %request.display_name,
                    script_version = request.script_version,
                    channel = assigned_channel,
                    %character_handle,
                    "connection admitted"
                );
                Ok(ConnectionResponse {
                    assigned_channel,
                    character_handle,
                })
            }
            Err(e) => {
                tracing::warn!(name = %request.display_name, "connection refused: {e}");
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Client connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientState {
    #[default]
    Idle,
    AwaitingResponse,
    Connected(ConnectionResponse),
}

/// Client half of the handshake.
#[derive(Debug, Default)]
pub struct ClientHandshake {
    state: ClientState,
}

impl ClientHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Connected(_))
    }

    /// Mark `request` as sent. Only valid from `Idle`.
    pub fn begin(&mut self, request: &ConnectionRequest) -> std::result::Result<(), HandshakeError> {
        if self.state != ClientState::Idle {
            return Err(HandshakeError::UnexpectedState {
                state: self.state,
                detail: "connection request while not idle",
            });
        }
        tracing::debug!(name = %request.display_name, version = request.script_version, "sending connection request");
        self.state = ClientState::AwaitingResponse;
        Ok(())
    }

    /// Accept the server's response.
    pub fn on_response(&mut self, response: ConnectionResponse) -> std::result::Result<(), HandshakeError> {
        if self.state != ClientState::AwaitingResponse {
            return Err(HandshakeError::UnexpectedState {
                state: self.state,
                detail: "connection response without a pending request",
            });
        }
        tracing::info!(channel = response.assigned_channel, handle = %response.character_handle, "connected");
        self.state = ClientState::Connected(response);
        Ok(())
    }

    /// The server refused; return to `Idle`.
    pub fn on_rejected(&mut self, reason: &HandshakeError) {
        if self.state == ClientState::AwaitingResponse {
            tracing::warn!("connection rejected: {reason}");
            self.state = ClientState::Idle;
        }
    }

    /// Drop back to `Idle` after a disconnect.
    pub fn reset(&mut self) {
        self.state = ClientState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConnectionRequest {
        ConnectionRequest::new("sc_name", "Player", 3)
    }

    #[test]
    fn test_script_version_ordering() {
        assert!(ScriptVersion::V0_9 > ScriptVersion::V0_8_1);
        assert_eq!(ScriptVersion::LATEST.tag(), 5);
        assert_eq!(ScriptVersion::from_tag(2), Some(ScriptVersion::V0_6_1));
        assert_eq!(ScriptVersion::from_tag(6), None);
    }

    #[test]
    fn test_newest_version_against_older_max_is_incompatible() {
        let policy = ServerHandshakePolicy {
            versions: VersionRange::new(ScriptVersion::V0_6, ScriptVersion::V0_8_1),
            ..Default::default()
        };
        let result = policy.admit(&request(), 0, 1, NetHandle(100));
        let err = result.unwrap_err();
        assert_eq!(
            err,
            HandshakeError::Protocol(ProtocolError::VersionIncompatible {
                offered: 5,
                min_supported: 1,
                max_supported: 4,
            })
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_admission_builds_response() {
        let policy = ServerHandshakePolicy::default();
        let response = policy.admit(&request(), 3, 2, NetHandle(55)).unwrap();
        assert_eq!(response.assigned_channel, 2);
        assert_eq!(response.character_handle, NetHandle(55));
    }

    #[test]
    fn test_recoverable_rejections() {
        let policy = ServerHandshakePolicy {
            password: Some("hunter2".into()),
            max_players: 2,
            ..Default::default()
        };
        let wrong = policy.evaluate(&request().with_password("nope"), 0).unwrap_err();
        assert_eq!(wrong, HandshakeError::Rejected(HandshakeRejection::WrongPassword));
        assert!(!wrong.is_fatal());

        let full = policy.evaluate(&request().with_password("hunter2"), 2).unwrap_err();
        assert_eq!(full, HandshakeError::Rejected(HandshakeRejection::ServerFull));

        let unnamed = ConnectionRequest::new("sc", "  ", 3).with_password("hunter2");
        assert_eq!(
            policy.evaluate(&unnamed, 0).unwrap_err(),
            HandshakeError::Rejected(HandshakeRejection::EmptyName)
        );

        assert!(policy.evaluate(&request().with_password("hunter2"), 1).is_ok());
    }

    #[test]
    fn test_version_checked_before_password() {
        let policy = ServerHandshakePolicy {
            password: Some("secret".into()),
            ..Default::default()
        };
        let mut old = request();
        old.script_version = ScriptVersion::Unknown.tag();
        assert!(policy.evaluate(&old, 0).unwrap_err().is_fatal());
    }

    #[test]
    fn test_client_state_machine() {
        let mut client = ClientHandshake::new();
        client.begin(&request()).unwrap();
        assert_eq!(client.state(), ClientState::AwaitingResponse);
        assert!(client.begin(&request()).is_err());

        client.on_rejected(&HandshakeRejection::ServerFull.into());
        assert_eq!(client.state(), ClientState::Idle);

        client.begin(&request()).unwrap();
        let response = ConnectionResponse {
            assigned_channel: 1,
            character_handle: NetHandle(9),
        };
        client.on_response(response).unwrap();
        assert!(client.is_connected());
        assert!(client.on_response(response).is_err());

        client.reset();
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[test]
    fn test_response_without_request_is_rejected() {
        let mut client = ClientHandshake::new();
        let err = client.on_response(ConnectionResponse::default()).unwrap_err();
        assert!(matches!(err, HandshakeError::UnexpectedState { state: ClientState::Idle, .. }));
    }

    #[test]
    fn test_request_wire_roundtrip() {
        let original = request().with_password("pw");
        assert_eq!(ConnectionRequest::decode(&original.encode()).unwrap(), original);
    }

    #[test]
    fn test_oversized_version_tag_is_malformed() {
        use prost::Message;
        let bytes = wire::ConnectionRequest {
            script_version: 300,
            ..Default::default()
        }
        .encode_to_vec();
        assert!(ConnectionRequest::decode(&bytes).unwrap_err().is_malformed());
    }
}
