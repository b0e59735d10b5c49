//! Connectionless server listing replies.

use crate::codec::WireRecord;
use crate::error::{Result, narrow_i16};
use crate::wire;

/// Advertisement sent in reply to a listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResponse {
    pub server_name: String,
    pub max_players: i16,
    pub player_count: i16,
    pub password_protected: bool,
    pub port: i32,
    pub gamemode: String,
    /// Reachable on the local network.
    pub lan: bool,
}

impl WireRecord for DiscoveryResponse {
    type Wire = wire::DiscoveryResponse;

    fn to_wire(&self) -> wire::DiscoveryResponse {
        wire::DiscoveryResponse {
            server_name: self.server_name.clone(),
            max_players: i32::from(self.max_players),
            player_count: i32::from(self.player_count),
            password_protected: self.password_protected,
            port: self.port,
            gamemode: self.gamemode.clone(),
            lan: self.lan,
        }
    }

    fn from_wire(w: wire::DiscoveryResponse) -> Result<Self> {
        Ok(Self {
            server_name: w.server_name,
            max_players: narrow_i16(w.max_players, "discovery.max_players")?,
            player_count: narrow_i16(w.player_count, "discovery.player_count")?,
            password_protected: w.password_protected,
            port: w.port,
            gamemode: w.gamemode,
            lan: w.lan,
        })
    }
}

/// Static server settings that feed every [`DiscoveryResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub max_players: usize,
    pub port: u16,
    pub gamemode: String,
    pub password_protected: bool,
    pub lan: bool,
}

impl ServerInfo {
    /// Build the reply for the current player count.
    ///
    /// Counts beyond the wire range are clamped.
    pub fn advertise(&self, player_count: usize) -> DiscoveryResponse {
        let clamp = |n: usize| i16::try_from(n).unwrap_or(i16::MAX);
        DiscoveryResponse {
            server_name: self.name.clone(),
            max_players: clamp(self.max_players),
            player_count: clamp(player_count),
            password_protected: self.password_protected,
            port: i32::from(self.port),
            gamemode: self.gamemode.clone(),
            lan: self.lan,
        }
    }
}
