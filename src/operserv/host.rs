//! `HostInfo` (spec §3.3): per-IP roster of currently connected users,
//! created on first connection and destroyed when the last one disconnects.

use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Default, Clone)]
pub struct HostInfo {
    pub clients: Vec<String>,
}

/// Keyed by IP address (spec §8 invariant 3: `U ∈ hostInfo[A].clients ⇔ A
/// equals the textual form of U.ip`).
#[derive(Debug, Default)]
pub struct HostTable {
    hosts: HashMap<IpAddr, HostInfo>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: &IpAddr) -> Option<&HostInfo> {
        self.hosts.get(addr)
    }

    /// Record `nick` as connected from `addr`, creating the entry if this is
    /// the first connection. Returns the new client count for `addr`.
    pub fn add_client(&mut self, addr: IpAddr, nick: &str) -> usize {
        let entry = self.hosts.entry(addr).or_default();
        if !entry.clients.iter().any(|n| n.eq_ignore_ascii_case(nick)) {
            entry.clients.push(nick.to_string());
        }
        entry.clients.len()
    }

    /// Remove `nick` from `addr`'s roster, destroying the entry once empty.
    pub fn remove_client(&mut self, addr: IpAddr, nick: &str) {
        if let Some(entry) = self.hosts.get_mut(&addr) {
            entry.clients.retain(|n| !n.eq_ignore_ascii_case(nick));
            if entry.clients.is_empty() {
                self.hosts.remove(&addr);
            }
        }
    }

    pub fn client_count(&self, addr: &IpAddr) -> usize {
        self.hosts.get(addr).map_or(0, |h| h.clients.len())
    }
}
