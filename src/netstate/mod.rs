//! Network state engine (spec §3.2, component E): servers, users, channels,
//! memberships and bans, plus the hook fan-out fired by mutating them.
//!
//! Grounded on the teacher's `state/channel.rs`/`state/user.rs` struct-shape
//! idiom, adapted from `DashMap`-backed concurrent registries to plain
//! `HashMap`s owned by one `Network` root — this core is single-threaded
//! cooperative (spec §5), so there is nothing to protect with interior
//! mutability across threads.

mod channel;
mod events;
mod membership;
mod server;
mod user;

pub use channel::{BanNode, ChanNode, ChannelModes, MemberList, Topic};
pub use events::{
    AllowAuthArgs, AuthArgs, DelChannelArgs, DelUserArgs, ExitArgs, FailPwArgs, HandleMergeArgs,
    HandleRenameArgs, JoinArgs, KickArgs, NetworkHooks, NewChannelArgs, NewUserArgs,
    NickChangeArgs, PartArgs, RelAge, ServerLinkArgs, UnregArgs, XqueryArgs,
};
pub use membership::ModeNode;
pub use server::Server;
pub use user::{UserModes, UserNode};

use crate::clock::Timestamp;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("no such user: {0}")]
    UnknownUser(String),
    #[error("no such channel: {0}")]
    UnknownChannel(String),
    #[error("no such server: {0}")]
    UnknownServer(String),
    #[error("user {0} already exists")]
    UserExists(String),
    #[error("server {0} already exists")]
    ServerExists(String),
    #[error("user {0} is not on channel {1}")]
    NotOnChannel(String, String),
    #[error("cannot delete server {0}: it is the root server")]
    CannotDeleteSelf(String),
}

/// Authoritative in-memory model of the IRC network (spec §3.2).
pub struct Network {
    pub hooks: NetworkHooks,
    self_server: String,
    servers: HashMap<String, Server>,
    clients: HashMap<String, UserNode>,
    channels: HashMap<String, ChanNode>,
}

impl Network {
    /// `self_name` is this pseudo-server's own name (spec §3.2: "the server
    /// graph is a tree rooted at `self`").
    pub fn new(self_name: &str, now: Timestamp) -> Self {
        let mut servers = HashMap::new();
        servers.insert(self_name.to_string(), Server::new(self_name, "AA", None, now));
        Self {
            hooks: NetworkHooks::default(),
            self_server: self_name.to_string(),
            servers,
            clients: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    // -- lookups --------------------------------------------------------

    pub fn user(&self, nick: &str) -> Option<&UserNode> {
        self.clients.get(&UserNode::key(nick))
    }

    pub fn user_mut(&mut self, nick: &str) -> Option<&mut UserNode> {
        self.clients.get_mut(&UserNode::key(nick))
    }

    pub fn channel(&self, name: &str) -> Option<&ChanNode> {
        self.channels.get(&ChanNode::key(name))
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut ChanNode> {
        self.channels.get_mut(&ChanNode::key(name))
    }

    pub fn server(&self, name: &str) -> Option<&Server> {
        self.servers.get(name)
    }

    pub fn user_count(&self) -> usize {
        self.clients.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &UserNode> {
        self.clients.values()
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChanNode> {
        self.channels.values()
    }

    // -- servers ----------------------------------------------------------

    pub fn new_server(&mut self, name: &str, numeric: &str, uplink: &str, now: Timestamp) -> Result<(), StateError> {
        if self.servers.contains_key(name) {
            return Err(StateError::ServerExists(name.to_string()));
        }
        if !self.servers.contains_key(uplink) {
            return Err(StateError::UnknownServer(uplink.to_string()));
        }
        self.servers.insert(name.to_string(), Server::new(name, numeric, Some(uplink), now));
        self.servers.get_mut(uplink).expect("checked above").children.push(name.to_string());
        self.hooks.server_link.fire(&ServerLinkArgs { server: name.to_string() });
        Ok(())
    }

    /// Remove `name` from the server tree. All downstream users are removed
    /// first, depth-first, post-order (spec §3.2 invariant).
    pub fn del_server(&mut self, name: &str, now: Timestamp) -> Result<(), StateError> {
        if name == self.self_server {
            return Err(StateError::CannotDeleteSelf(name.to_string()));
        }
        let Some(server) = self.servers.get(name).cloned() else {
            return Err(StateError::UnknownServer(name.to_string()));
        };
        for child in server.children.clone() {
            self.del_server(&child, now)?;
        }
        let nicks: Vec<String> = self
            .clients
            .values()
            .filter(|u| u.uplink == name)
            .map(|u| u.nick.clone())
            .collect();
        for nick in nicks {
            self.del_user(&nick, "netsplit", now)?;
        }
        if let Some(uplink) = &server.uplink {
            if let Some(parent) = self.servers.get_mut(uplink) {
                parent.children.retain(|c| c != name);
            }
        }
        self.servers.remove(name);
        self.hooks.exit.fire(&ExitArgs { server: name.to_string() });
        Ok(())
    }

    // -- users --------------------------------------------------------

    pub fn new_user(
        &mut self,
        nick: &str,
        ident: &str,
        hostname: &str,
        uplink: &str,
        now: Timestamp,
    ) -> Result<(), StateError> {
        let key = UserNode::key(nick);
        if self.clients.contains_key(&key) {
            return Err(StateError::UserExists(nick.to_string()));
        }
        if let Some(server) = self.servers.get_mut(uplink) {
            server.client_count += 1;
        } else {
            return Err(StateError::UnknownServer(uplink.to_string()));
        }
        self.clients.insert(key, UserNode::new(nick, ident, hostname, uplink, now));
        self.hooks.new_user.fire(&NewUserArgs { nick: nick.to_string() });
        Ok(())
    }

    /// Fire del-user hooks, then unlink from every joined channel (applying
    /// the empty-channel deletion rule), then remove from `clients` and the
    /// uplink server (spec §6.3).
    pub fn del_user(&mut self, nick: &str, reason: &str, now: Timestamp) -> Result<(), StateError> {
        let key = UserNode::key(nick);
        let Some(user) = self.clients.get(&key).cloned() else {
            return Err(StateError::UnknownUser(nick.to_string()));
        };
        self.hooks.del_user.fire(&DelUserArgs {
            nick: nick.to_string(),
            reason: reason.to_string(),
        });
        for chan_key in user.channels.clone() {
            self.remove_membership(&chan_key, &key, now);
        }
        if let Some(server) = self.servers.get_mut(&user.uplink) {
            server.client_count = server.client_count.saturating_sub(1);
        }
        self.clients.remove(&key);
        Ok(())
    }

    /// Change `old_nick`'s nickname to `new_nick`, re-indexing `clients` and
    /// updating the change timestamp (spec §6.3).
    pub fn nick_change(&mut self, old_nick: &str, new_nick: &str, now: Timestamp) -> Result<(), StateError> {
        let old_key = UserNode::key(old_nick);
        let new_key = UserNode::key(new_nick);
        let Some(mut user) = self.clients.remove(&old_key) else {
            return Err(StateError::UnknownUser(old_nick.to_string()));
        };
        if self.clients.contains_key(&new_key) {
            // Collision: put the user back under the old key and fail.
            self.clients.insert(old_key, user);
            return Err(StateError::UserExists(new_nick.to_string()));
        }
        user.nick = new_nick.to_string();
        user.timestamp = now;
        for chan_key in user.channels.clone() {
            if let Some(chan) = self.channels.get_mut(&chan_key) {
                if let Some(mut node) = chan.members.remove(&old_key) {
                    node.nick = new_nick.to_string();
                    chan.members.insert(node);
                }
            }
        }
        self.clients.insert(new_key, user);
        self.hooks.nick_change.fire(&NickChangeArgs {
            old_nick: old_nick.to_string(),
            new_nick: new_nick.to_string(),
            when: now,
        });
        Ok(())
    }

    pub fn auth(&mut self, nick: &str, handle: &str) -> Result<(), StateError> {
        let key = UserNode::key(nick);
        let user = self.clients.get_mut(&key).ok_or_else(|| StateError::UnknownUser(nick.to_string()))?;
        user.handle = Some(handle.to_string());
        user.modes.stamped = true;
        self.hooks.auth.fire(&AuthArgs {
            nick: nick.to_string(),
            handle: handle.to_string(),
        });
        Ok(())
    }

    // -- channels -------------------------------------------------------

    /// Join `nick` to `channel`. `incoming_ts` is the channel creation
    /// timestamp carried by an inbound burst/SJOIN, if any; `None` means a
    /// purely local join with no timestamp comparison to make (spec §6.3).
    pub fn join(
        &mut self,
        nick: &str,
        channel: &str,
        now: Timestamp,
        incoming_ts: Option<Timestamp>,
    ) -> Result<RelAge, StateError> {
        let nick_key = UserNode::key(nick);
        if !self.clients.contains_key(&nick_key) {
            return Err(StateError::UnknownUser(nick.to_string()));
        }
        let chan_key = ChanNode::key(channel);
        let rel_age = if !self.channels.contains_key(&chan_key) {
            let ts = incoming_ts.unwrap_or(now);
            self.channels.insert(chan_key.clone(), ChanNode::new(channel, ts));
            self.hooks.new_channel.fire(&NewChannelArgs { channel: channel.to_string() });
            RelAge::Equal
        } else {
            let current_ts = self.channels.get(&chan_key).expect("checked above").created;
            match incoming_ts {
                None => RelAge::Equal,
                Some(ts) if ts < current_ts => RelAge::Older,
                Some(ts) if ts == current_ts => RelAge::Equal,
                Some(_) => RelAge::Newer,
            }
        };

        if rel_age == RelAge::Older {
            self.wipe_channel(&chan_key, incoming_ts.expect("Older implies Some"));
        }

        let chan = self.channels.get_mut(&chan_key).expect("created or existing above");
        if !chan.members.contains(&nick_key) {
            chan.members.insert(ModeNode::new(channel, nick, now));
        }
        let user = self.clients.get_mut(&nick_key).expect("checked above");
        if !user.channels.contains(&chan_key) {
            user.channels.push(chan_key.clone());
        }

        self.hooks.join.fire(&JoinArgs {
            nick: nick.to_string(),
            channel: channel.to_string(),
            rel_age,
        });
        Ok(rel_age)
    }

    /// Reset topic/modes/bans and re-op services on the channel, because an
    /// incoming burst carries a strictly older timestamp (the "wipeout"
    /// policy, spec §6.3).
    fn wipe_channel(&mut self, chan_key: &str, new_ts: Timestamp) {
        let service_nicks: Vec<String> = {
            let chan = self.channels.get(chan_key).expect("caller holds entry");
            chan.members
                .iter()
                .filter(|m| self.clients.get(&UserNode::key(&m.nick)).is_some_and(|u| u.modes.service))
                .map(|m| m.nick.clone())
                .collect()
        };
        let chan = self.channels.get_mut(chan_key).expect("caller holds entry");
        chan.created = new_ts;
        chan.topic = None;
        chan.modes = ChannelModes::default();
        chan.bans.clear();
        for nick in service_nicks {
            if let Some(node) = chan.members.get_mut(&UserNode::key(&nick)) {
                node.op = true;
            }
        }
    }

    pub fn part(&mut self, nick: &str, channel: &str, reason: Option<&str>, now: Timestamp) -> Result<(), StateError> {
        let nick_key = UserNode::key(nick);
        let chan_key = ChanNode::key(channel);
        if !self.channels.get(&chan_key).is_some_and(|c| c.members.contains(&nick_key)) {
            return Err(StateError::NotOnChannel(nick.to_string(), channel.to_string()));
        }
        self.hooks.part.fire(&PartArgs {
            nick: nick.to_string(),
            channel: channel.to_string(),
            reason: reason.map(str::to_string),
        });
        self.remove_membership(&chan_key, &nick_key, now);
        Ok(())
    }

    pub fn kick(&mut self, kicker: &str, victim: &str, channel: &str, reason: &str, now: Timestamp) -> Result<(), StateError> {
        let victim_key = UserNode::key(victim);
        let chan_key = ChanNode::key(channel);
        if !self.channels.get(&chan_key).is_some_and(|c| c.members.contains(&victim_key)) {
            return Err(StateError::NotOnChannel(victim.to_string(), channel.to_string()));
        }
        self.hooks.kick.fire(&KickArgs {
            kicker: kicker.to_string(),
            victim: victim.to_string(),
            channel: channel.to_string(),
            reason: reason.to_string(),
        });
        self.remove_membership(&chan_key, &victim_key, now);
        Ok(())
    }

    /// Shared tail of part/kick/quit: drop the `ModeNode` from both sides,
    /// then apply the empty-channel deletion rule.
    fn remove_membership(&mut self, chan_key: &str, nick_key: &str, _now: Timestamp) {
        if let Some(user) = self.clients.get_mut(nick_key) {
            user.channels.retain(|c| c != chan_key);
        }
        let Some(chan) = self.channels.get_mut(chan_key) else { return };
        chan.members.remove(nick_key);
        if chan.should_delete_when_empty() {
            let name = chan.name.clone();
            self.channels.remove(chan_key);
            self.hooks.del_channel.fire(&DelChannelArgs { channel: name });
        }
    }

    /// Set the topic. Spec §6.3: topic hooks are fired "or skipped if set
    /// by a local user via services" — there is no `topic` entry in the F
    /// hook-kind enumeration, so this simply records state; callers that
    /// need to notify peers do so through the outbound-action surface
    /// (§6.4), which is an external collaborator.
    pub fn set_topic(&mut self, channel: &str, text: &str, setter: &str, now: Timestamp) -> Result<(), StateError> {
        let chan = self
            .channel_mut(channel)
            .ok_or_else(|| StateError::UnknownChannel(channel.to_string()))?;
        chan.topic = Some(Topic {
            text: text.to_string(),
            setter: setter.to_string(),
            set_at: now,
        });
        Ok(())
    }
}
