//! `UserNode` (spec §3.2): one client visible anywhere on the network.

use crate::clock::Timestamp;
use std::net::IpAddr;

/// Per-user mode bits (spec §3.2).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserModes {
    pub invisible: bool,
    pub oper: bool,
    pub helper: bool,
    pub service: bool,
    pub deaf: bool,
    pub hidden_host: bool,
    pub gagged: bool,
    pub stamped: bool,
    pub persistent: bool,
    pub local: bool,
    pub dead: bool,
    pub registering: bool,
}

/// One client, local or remote, known to this server's view of the network.
#[derive(Debug, Clone)]
pub struct UserNode {
    pub nick: String,
    pub ident: String,
    pub hostname: String,
    pub fakehost: Option<String>,
    pub ip: Option<IpAddr>,
    pub info: String,
    pub modes: UserModes,
    /// Nick-change time; also the burst collision tiebreak.
    pub timestamp: Timestamp,
    pub uplink: String,
    pub handle: Option<String>,
    /// Channels this user currently occupies, lowercased, join order.
    pub channels: Vec<String>,
}

impl UserNode {
    pub fn new(nick: &str, ident: &str, hostname: &str, uplink: &str, now: Timestamp) -> Self {
        Self {
            nick: nick.to_string(),
            ident: ident.to_string(),
            hostname: hostname.to_string(),
            fakehost: None,
            ip: None,
            info: String::new(),
            modes: UserModes::default(),
            timestamp: now,
            uplink: uplink.to_string(),
            handle: None,
            channels: Vec::new(),
        }
    }

    /// The nickname used to look the user up in `clients`, case-folded.
    pub fn key(nick: &str) -> String {
        nick.to_ascii_lowercase()
    }

    pub fn is_on_channel(&self, channel_key: &str) -> bool {
        self.channels.iter().any(|c| c == channel_key)
    }

    /// Whether this is a services pseudo-client, not a networked user.
    pub fn is_local_pseudo(&self) -> bool {
        self.modes.local || self.modes.service
    }
}
