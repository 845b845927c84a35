//! Trusted hosts (spec §3.3 `TrustedHost`): administrator-declared exceptions
//! to the global per-IP clone limit, with optional scheduled expiry.

use crate::clock::Timestamp;
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct TrustedHost {
    pub limit: u32,
    pub issuer: String,
    pub issued_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub reason: String,
}

/// Keyed by IP (spec §3.3: "keyed by IP string" — an `IpAddr` is the typed
/// equivalent here).
#[derive(Debug, Default)]
pub struct TrustTable {
    hosts: HashMap<IpAddr, TrustedHost>,
}

impl TrustTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: IpAddr, host: TrustedHost) {
        self.hosts.insert(addr, host);
    }

    pub fn get(&self, addr: &IpAddr) -> Option<&TrustedHost> {
        self.hosts.get(addr)
    }

    pub fn remove(&mut self, addr: &IpAddr) -> Option<TrustedHost> {
        self.hosts.remove(addr)
    }

    /// The clone limit in effect for `addr`: the trust's limit if trusted
    /// and not expired, otherwise `default_limit`.
    pub fn limit_for(&self, addr: &IpAddr, now: Timestamp, default_limit: u32) -> u32 {
        match self.hosts.get(addr) {
            Some(host) if host.expires_at.is_none_or(|exp| exp > now) => host.limit,
            _ => default_limit,
        }
    }

    /// Drop every trust whose expiry has passed, returning the addresses
    /// removed (the time-queue entry that scheduled this call is the
    /// caller's responsibility, per spec §4.5 / §8 invariant 6).
    pub fn expire(&mut self, now: Timestamp) -> Vec<IpAddr> {
        let expired: Vec<IpAddr> = self
            .hosts
            .iter()
            .filter(|(_, h)| h.expires_at.is_some_and(|exp| exp <= now))
            .map(|(addr, _)| *addr)
            .collect();
        for addr in &expired {
            self.hosts.remove(addr);
        }
        expired
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IpAddr, &TrustedHost)> {
        self.hosts.iter()
    }
}
