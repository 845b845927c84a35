//! `ModeNode` (spec §3.2): the per-(channel,user) membership record.

use crate::clock::Timestamp;

/// Membership-scoped modes and bookkeeping for one user on one channel.
///
/// Exactly one `ModeNode` exists per (channel, user) pair while the user is
/// on the channel (spec §3.2 invariant); `Network` is responsible for
/// inserting/removing it from both the channel's member list and the user's
/// channel list atomically.
#[derive(Debug, Clone)]
pub struct ModeNode {
    pub channel: String,
    pub nick: String,
    pub op: bool,
    pub voice: bool,
    pub idle_since: Timestamp,
    pub op_level: Option<i32>,
}

impl ModeNode {
    pub fn new(channel: &str, nick: &str, now: Timestamp) -> Self {
        Self {
            channel: channel.to_string(),
            nick: nick.to_string(),
            op: false,
            voice: false,
            idle_since: now,
            op_level: None,
        }
    }
}
