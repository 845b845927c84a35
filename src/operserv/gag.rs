//! Gag list (spec §3.3 `Gag`, §4.5 "Walk the gag list"): mask-based mute
//! suppressing outbound messages from matching users.

use crate::clock::Timestamp;
use crate::wildcard::glob_match;

#[derive(Debug, Clone)]
pub struct Gag {
    pub mask: String,
    pub owner: String,
    pub reason: String,
    pub expires_at: Option<Timestamp>,
}

/// A plain linked-list-in-spirit collection (spec: "Linked list"); modeled
/// as a `Vec` since nothing here needs stable addresses across mutation.
#[derive(Debug, Default)]
pub struct GagList {
    gags: Vec<Gag>,
}

impl GagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, gag: Gag) {
        self.gags.push(gag);
    }

    pub fn remove_mask(&mut self, mask: &str) -> bool {
        let before = self.gags.len();
        self.gags.retain(|g| !g.mask.eq_ignore_ascii_case(mask));
        self.gags.len() != before
    }

    /// Drop expired gags as of `now`.
    pub fn expire(&mut self, now: Timestamp) {
        self.gags.retain(|g| g.expires_at.is_none_or(|exp| exp > now));
    }

    /// Whether `hostmask` (`nick!user@host`) matches any active gag.
    pub fn matches(&self, hostmask: &str) -> bool {
        self.gags.iter().any(|g| glob_match(&g.mask, hostmask))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gag> {
        self.gags.iter()
    }

    pub fn len(&self) -> usize {
        self.gags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_mask_gags_a_user() {
        let mut gags = GagList::new();
        gags.add(Gag { mask: "*!*@evil.example".into(), owner: "oper".into(), reason: "spam".into(), expires_at: None });
        assert!(gags.matches("bob!x@evil.example"));
        assert!(!gags.matches("bob!x@good.example"));
    }

    #[test]
    fn expired_gags_are_dropped() {
        let mut gags = GagList::new();
        gags.add(Gag { mask: "*!*@evil.example".into(), owner: "oper".into(), reason: "spam".into(), expires_at: Some(100) });
        gags.expire(200);
        assert!(gags.is_empty());
    }
}
