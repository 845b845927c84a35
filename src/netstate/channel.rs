//! `ChanNode` and `BanNode` (spec §3.2).

use super::membership::ModeNode;
use crate::clock::Timestamp;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub setter: String,
    pub set_at: Timestamp,
}

/// Channel-wide mode bits and parameters the core needs to reason about.
/// This is not the full P10/RFC1459 mode set (wire framing is out of scope,
/// spec §1) — only the ones services logic and the spec's invariants touch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChannelModes {
    pub secret: bool,
    pub private: bool,
    pub moderated: bool,
    pub invite_only: bool,
    pub no_external: bool,
    pub topic_lock: bool,
    pub registered: bool,
    /// `+D`: delay-join, used by the join-flood reaction.
    pub delay_join: bool,
}

#[derive(Debug, Clone)]
pub struct BanNode {
    pub mask: String,
    pub setter: String,
    pub set_at: Timestamp,
}

/// An ordered membership list: insertion order preserved for reproducible
/// iteration (mirrors `recdb::OrderedObject`'s approach), keyed by
/// case-folded nickname.
#[derive(Debug, Clone, Default)]
pub struct MemberList {
    order: Vec<String>,
    nodes: HashMap<String, ModeNode>,
}

impl MemberList {
    pub fn insert(&mut self, node: ModeNode) {
        let key = node.nick.to_ascii_lowercase();
        if !self.nodes.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.nodes.insert(key, node);
    }

    pub fn remove(&mut self, nick_key: &str) -> Option<ModeNode> {
        if let Some(pos) = self.order.iter().position(|k| k == nick_key) {
            self.order.remove(pos);
        }
        self.nodes.remove(nick_key)
    }

    pub fn get(&self, nick_key: &str) -> Option<&ModeNode> {
        self.nodes.get(nick_key)
    }

    pub fn get_mut(&mut self, nick_key: &str) -> Option<&mut ModeNode> {
        self.nodes.get_mut(nick_key)
    }

    pub fn contains(&self, nick_key: &str) -> bool {
        self.nodes.contains_key(nick_key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModeNode> {
        self.order.iter().map(move |k| self.nodes.get(k).expect("order/nodes desync"))
    }
}

#[derive(Debug, Clone)]
pub struct ChanNode {
    pub name: String,
    pub created: Timestamp,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    pub key: Option<String>,
    pub limit: Option<u32>,
    pub members: MemberList,
    pub bans: Vec<BanNode>,
    /// Number of outstanding locks suspending the empty-channel deletion
    /// rule (spec §3.2 invariant).
    pub lock_count: u32,
    pub bad_channel: bool,
    pub join_flooded: bool,
}

impl ChanNode {
    pub fn new(name: &str, created: Timestamp) -> Self {
        Self {
            name: name.to_string(),
            created,
            topic: None,
            modes: ChannelModes::default(),
            key: None,
            limit: None,
            members: MemberList::default(),
            bans: Vec::new(),
            lock_count: 0,
            bad_channel: false,
            join_flooded: false,
        }
    }

    pub fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    /// Whether the empty-channel deletion rule applies right now (spec
    /// §3.2: "empty channels without locks and without the REGISTERED mode
    /// are deleted immediately on the last part/kick").
    pub fn should_delete_when_empty(&self) -> bool {
        self.members.is_empty() && self.lock_count == 0 && !self.modes.registered
    }

    pub fn lock(&mut self) {
        self.lock_count += 1;
    }

    /// Release one lock. Returns whether the channel should now be deleted
    /// under the empty-channel rule.
    pub fn unlock(&mut self) -> bool {
        self.lock_count = self.lock_count.saturating_sub(1);
        self.should_delete_when_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_unlocked_unregistered_channel_is_deletable() {
        let chan = ChanNode::new("#test", 0);
        assert!(chan.should_delete_when_empty());
    }

    #[test]
    fn locked_channel_is_not_deletable_even_if_empty() {
        let mut chan = ChanNode::new("#test", 0);
        chan.lock();
        assert!(!chan.should_delete_when_empty());
        assert!(chan.unlock());
    }

    #[test]
    fn registered_channel_survives_empty() {
        let mut chan = ChanNode::new("#test", 0);
        chan.modes.registered = true;
        assert!(!chan.should_delete_when_empty());
    }
}
