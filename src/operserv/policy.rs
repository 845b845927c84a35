//! Join-time and new-user policy pipelines (spec §4.5).
//!
//! Both pipelines are plain functions over borrowed collaborators rather
//! than methods on one big struct, so each step can be unit-tested in
//! isolation and [`super::OperServ`] stays a thin wiring layer (grounded on
//! the teacher's preference for free functions over God-objects in
//! `handlers/`).

use super::alert::{AlertTable, Reaction};
use super::gag::GagList;
use super::gline::{Gline, GlineSink, GlineTable};
use super::host::HostTable;
use super::trust::TrustTable;
use crate::clock::Timestamp;
use crate::netstate::{BanNode, Network};
use crate::policer::Policer;
use crate::timeq::TimeQueue;
use crate::wildcard::glob_match;
use std::collections::HashMap;
use std::net::IpAddr;

/// Channel names a bad word is forgiven on, e.g. the help/support channels
/// that legitimately discuss banned terms (spec §4.5, §8 "exempt list").
#[derive(Debug, Default)]
pub struct ExemptChannels {
    names: std::collections::HashSet<String>,
}

impl ExemptChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: &str) {
        self.names.insert(channel.to_ascii_lowercase());
    }

    pub fn remove(&mut self, channel: &str) -> bool {
        self.names.remove(&channel.to_ascii_lowercase())
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.names.contains(&channel.to_ascii_lowercase())
    }
}

/// Registered bad words. Matching is an unanchored, case-insensitive
/// substring scan (spec §8 Open Question: "whether it should be anchored or
/// word-boundary is unspecified by the source" — resolved in DESIGN.md as
/// plain substring, the least surprising reading of "contains a bad word").
#[derive(Debug, Default)]
pub struct BadWordList {
    words: Vec<String>,
}

impl BadWordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, word: &str) {
        let word = word.to_ascii_lowercase();
        if !self.words.contains(&word) {
            self.words.push(word);
        }
    }

    pub fn remove(&mut self, word: &str) -> bool {
        let before = self.words.len();
        let word = word.to_ascii_lowercase();
        self.words.retain(|w| *w != word);
        self.words.len() != before
    }

    pub fn contains_bad_word(&self, haystack: &str) -> bool {
        let haystack = haystack.to_ascii_lowercase();
        self.words.iter().any(|w| haystack.contains(w.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

/// Whether `name` is a "bad channel" (spec §3.3 glossary: contains a bad
/// word and isn't exempt, or matches an active gline).
pub fn is_bad_channel(name: &str, bad_words: &BadWordList, exempt: &ExemptChannels, glines: &GlineTable) -> bool {
    if bad_words.contains_bad_word(name) && !exempt.contains(name) {
        return true;
    }
    glines_match_channel(name, glines)
}

fn glines_match_channel(name: &str, glines: &GlineTable) -> bool {
    // Glines are ordinarily user masks (`nick!user@host` or `*@ip`), but an
    // operator can gline a channel-name mask directly to blanket-block
    // rejoining after a takeover; the glossary's "or matches an active
    // gline" clause covers that case, so check the same glob-matcher.
    glines.iter().any(|g| g.enabled && glob_match(&g.target, name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinEvent {
    ChannelWarningBroadcast { channel: String, reason: String },
    BadChannelUserKilled { nick: String },
    BadChannelLockedDown { channel: String },
    AlertFired { name: String, reaction: Reaction },
    JoinFloodMarked { channel: String },
    ChannelModerated { channel: String },
}

/// Reply sent to the joining user/channel when a bad-channel kick fires
/// (spec §6.2 scenario: `reason "OSMSG_ILLEGAL_REASON"`).
pub const ILLEGAL_CHANNEL_REASON: &str = "OSMSG_ILLEGAL_REASON";

/// Runs the join-time policy pipeline (spec §4.5) against a user who has
/// already joined `channel` in `network`. Returns the sequence of policy
/// events that fired, for the caller to log/notify/alert on.
#[allow(clippy::too_many_arguments)]
pub fn join_policy(
    network: &mut Network,
    nick: &str,
    channel: &str,
    now: Timestamp,
    bad_words: &BadWordList,
    exempt: &ExemptChannels,
    glines: &GlineTable,
    alerts: &AlertTable,
    warnings: &HashMap<String, String>,
    channel_policers: &mut HashMap<String, Policer>,
    join_policer_size: f64,
    join_policer_rate: f64,
    moderate_threshold: usize,
) -> Vec<JoinEvent> {
    let mut events = Vec::new();

    if let Some(reason) = warnings.get(&channel.to_ascii_lowercase()) {
        events.push(JoinEvent::ChannelWarningBroadcast { channel: channel.to_string(), reason: reason.clone() });
    }

    if is_bad_channel(channel, bad_words, exempt, glines) {
        if !channel.starts_with('#') {
            let _ = network.del_user(nick, ILLEGAL_CHANNEL_REASON, now);
            events.push(JoinEvent::BadChannelUserKilled { nick: nick.to_string() });
        } else {
            lock_down_bad_channel(network, channel, now);
            events.push(JoinEvent::BadChannelLockedDown { channel: channel.to_string() });
        }
        return events;
    }

    for alert in alerts.channel_scoped() {
        let matched = network.user(nick).is_some_and(|u| alert.discriminator.matches(u, network, now, 0, 1));
        if matched {
            events.push(JoinEvent::AlertFired { name: alert.name.clone(), reaction: alert.reaction });
        }
    }

    let key = channel.to_ascii_lowercase();
    let policer = channel_policers
        .entry(key)
        .or_insert_with(|| Policer::new(join_policer_size, join_policer_rate, now));
    if !policer.conforms(now, 1.0) {
        let already_flooded = network.channel(channel).is_some_and(|c| c.join_flooded);
        if !already_flooded {
            if let Some(chan) = network.channel_mut(channel) {
                chan.join_flooded = true;
            }
            events.push(JoinEvent::JoinFloodMarked { channel: channel.to_string() });
        }
        let over_threshold = network.channel(channel).is_some_and(|c| c.members.len() > moderate_threshold);
        if over_threshold {
            if let Some(chan) = network.channel_mut(channel) {
                chan.modes.moderated = true;
                chan.modes.delay_join = true;
            }
            events.push(JoinEvent::ChannelModerated { channel: channel.to_string() });
        }
    }

    events
}

fn lock_down_bad_channel(network: &mut Network, channel: &str, now: Timestamp) {
    if let Some(chan) = network.channel_mut(channel) {
        chan.modes.secret = true;
        chan.modes.invite_only = true;
        chan.bans.push(BanNode { mask: "*!*@*".to_string(), setter: "OperServ".to_string(), set_at: now });
    }
    let members: Vec<String> = network
        .channel(channel)
        .map(|c| c.members.iter().map(|m| m.nick.clone()).collect())
        .unwrap_or_default();
    for member in members {
        let is_service = network.user(&member).is_some_and(|u| u.modes.service);
        if !is_service {
            let _ = network.kick("OperServ", &member, channel, ILLEGAL_CHANNEL_REASON, now);
        }
    }
    // The actual timed `PART` for OperServ itself is scheduled by the
    // caller via the time queue (spec: "schedule a delayed part"); this
    // function only establishes the lockdown state.
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewUserEvent {
    AlertFired { name: String, reaction: Reaction },
    Gagged,
    CloneWarning { ip: IpAddr, count: usize },
    CloneGlined { ip: IpAddr },
    FloodAlertRaised,
    FloodAlertCleared,
}

#[allow(clippy::too_many_arguments)]
pub fn new_user_policy(
    network: &mut Network,
    nick: &str,
    now: Timestamp,
    alerts: &AlertTable,
    gags: &GagList,
    hosts: &mut HostTable,
    trust: &TrustTable,
    glines: &mut GlineTable,
    gline_sink: &dyn GlineSink,
    timeq: &mut TimeQueue,
    default_clone_limit: u32,
    clone_gline_duration: i64,
    flood_policer: &mut Policer,
    flood_alerted: &mut bool,
) -> Vec<NewUserEvent> {
    let mut events = Vec::new();

    for alert in alerts.all() {
        let matched = network.user(nick).is_some_and(|u| alert.discriminator.matches(u, network, now, 0, 1));
        if !matched {
            continue;
        }
        events.push(NewUserEvent::AlertFired { name: alert.name.clone(), reaction: alert.reaction });
        match alert.reaction {
            Reaction::Kill => {
                let _ = network.del_user(nick, &alert.text, now);
                return events;
            }
            Reaction::Gline => {
                if let Some(user) = network.user(nick) {
                    if let Some(ip) = user.ip {
                        let duration = alert.discriminator.duration.unwrap_or(clone_gline_duration);
                        glines.add(
                            Gline {
                                target: format!("*@{ip}"),
                                issuer: alert.owner.clone(),
                                reason: alert.text.clone(),
                                issued_at: now,
                                expires_at: Some(now + duration),
                                enabled: true,
                            },
                            timeq,
                            gline_sink,
                        );
                    }
                }
                let _ = network.del_user(nick, &alert.text, now);
                return events;
            }
            Reaction::Notice => {}
        }
    }

    let hostmask = network
        .user(nick)
        .map(|u| format!("{}!{}@{}", u.nick, u.ident, u.hostname))
        .unwrap_or_default();
    if gags.matches(&hostmask) {
        if let Some(user) = network.user_mut(nick) {
            user.modes.gagged = true;
        }
        events.push(NewUserEvent::Gagged);
    }

    if let Some(ip) = network.user(nick).and_then(|u| u.ip) {
        let count = hosts.add_client(ip, nick);
        if is_valid_non_loopback(ip) {
            let limit = trust.limit_for(&ip, now, default_clone_limit);
            if count as u32 >= limit {
                events.push(NewUserEvent::CloneWarning { ip, count });
            }
            if count as u32 > limit {
                glines.add(
                    Gline {
                        target: format!("*@{ip}"),
                        issuer: "OperServ".to_string(),
                        reason: "clone limit exceeded".to_string(),
                        issued_at: now,
                        expires_at: Some(now + clone_gline_duration),
                        enabled: true,
                    },
                    timeq,
                    gline_sink,
                );
                events.push(NewUserEvent::CloneGlined { ip });
            }
        }
    }

    if !flood_policer.conforms(now, 1.0) {
        if !*flood_alerted {
            *flood_alerted = true;
            events.push(NewUserEvent::FloodAlertRaised);
        }
    } else if *flood_alerted {
        *flood_alerted = false;
        events.push(NewUserEvent::FloodAlertCleared);
    }

    events
}

fn is_valid_non_loopback(ip: IpAddr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discriminator::UserDiscriminator;
    use crate::operserv::alert::UserAlert;
    use std::cell::RefCell;

    #[derive(Default)]
    struct NullSink {
        advertised: RefCell<Vec<String>>,
    }
    impl GlineSink for NullSink {
        fn advertise(&self, gline: &Gline) {
            self.advertised.borrow_mut().push(gline.target.clone());
        }
        fn withdraw(&self, _target: &str) {}
    }

    fn net() -> Network {
        Network::new("services.example.net", 1_000)
    }

    #[test]
    fn bad_word_in_channel_name_triggers_lockdown() {
        let mut n = net();
        n.new_user("opserv", "o", "host", "services.example.net", 1_000).unwrap();
        n.user_mut("opserv").unwrap().modes.service = true;
        n.join("opserv", "#notsoevil", 1_000, None).unwrap();
        n.new_user("alice", "a", "host", "services.example.net", 1_000).unwrap();
        n.join("alice", "#notsoevil", 1_000, None).unwrap();

        let mut bad_words = BadWordList::new();
        bad_words.add("evil");
        let exempt = ExemptChannels::new();
        let glines = GlineTable::new();
        let alerts = AlertTable::new();
        let warnings = HashMap::new();
        let mut policers = HashMap::new();

        let events = join_policy(
            &mut n, "alice", "#notsoevil", 1_000, &bad_words, &exempt, &glines, &alerts, &warnings,
            &mut policers, 10.0, 1.0, 20,
        );
        assert!(events.contains(&JoinEvent::BadChannelLockedDown { channel: "#notsoevil".to_string() }));
        let chan = n.channel("#notsoevil").unwrap();
        assert!(chan.modes.secret);
        assert!(chan.modes.invite_only);
        assert!(!chan.members.contains("alice"), "alice should have been kicked");
        assert!(chan.members.contains("opserv"), "services are exempt from the purge");
    }

    #[test]
    fn exempt_channel_is_never_bad() {
        let mut bad_words = BadWordList::new();
        bad_words.add("evil");
        let mut exempt = ExemptChannels::new();
        exempt.add("#evilempire");
        let glines = GlineTable::new();
        assert!(!is_bad_channel("#evilempire", &bad_words, &exempt, &glines));
    }

    #[test]
    fn join_flood_marks_channel_once() {
        let mut n = net();
        n.new_user("alice", "a", "host", "services.example.net", 1_000).unwrap();
        n.join("alice", "#busy", 1_000, None).unwrap();

        let bad_words = BadWordList::new();
        let exempt = ExemptChannels::new();
        let glines = GlineTable::new();
        let alerts = AlertTable::new();
        let warnings = HashMap::new();
        let mut policers = HashMap::new();

        // size 1.0, rate 0.0: first join consumes the only token; the
        // second is rejected and marks the channel flooded.
        let _ = join_policy(&mut n, "alice", "#busy", 1_000, &bad_words, &exempt, &glines, &alerts, &warnings, &mut policers, 1.0, 0.0, 100);
        let events = join_policy(&mut n, "alice", "#busy", 1_000, &bad_words, &exempt, &glines, &alerts, &warnings, &mut policers, 1.0, 0.0, 100);
        assert!(events.contains(&JoinEvent::JoinFloodMarked { channel: "#busy".to_string() }));
        assert!(n.channel("#busy").unwrap().join_flooded);
    }

    #[test]
    fn clone_limit_warns_then_glines() {
        let mut n = net();
        let ip: IpAddr = "198.51.100.7".parse().unwrap();
        for (i, name) in ["u1", "u2", "u3", "u4"].iter().enumerate() {
            n.new_user(name, "x", "host", "services.example.net", 1_000 + i as i64).unwrap();
            n.user_mut(name).unwrap().ip = Some(ip);
        }

        let alerts = AlertTable::new();
        let gags = GagList::new();
        let mut hosts = HostTable::new();
        let trust = TrustTable::new();
        let mut glines = GlineTable::new();
        let sink = NullSink::default();
        let mut flood = Policer::new(1_000.0, 1.0, 1_000);
        let mut flood_alerted = false;

        for name in ["u1", "u2"] {
            let events = new_user_policy(&mut n, name, 1_000, &alerts, &gags, &mut hosts, &trust, &mut glines, &sink, 3, 3_600, &mut flood, &mut flood_alerted);
            assert!(events.is_empty(), "below the limit should be silent");
        }
        let events = new_user_policy(&mut n, "u3", 1_000, &alerts, &gags, &mut hosts, &trust, &mut glines, &sink, 3, 3_600, &mut flood, &mut flood_alerted);
        assert!(events.contains(&NewUserEvent::CloneWarning { ip, count: 3 }));
        let events = new_user_policy(&mut n, "u4", 1_000, &alerts, &gags, &mut hosts, &trust, &mut glines, &sink, 3, 3_600, &mut flood, &mut flood_alerted);
        assert!(events.contains(&NewUserEvent::CloneGlined { ip }));
    }

    #[test]
    fn gag_sets_gagged_mode_on_matching_new_user() {
        let mut n = net();
        n.new_user("bob", "x", "evil.example", "services.example.net", 1_000).unwrap();
        let alerts = AlertTable::new();
        let mut gags = GagList::new();
        gags.add(super::super::gag::Gag {
            mask: "*!*@evil.example".into(),
            owner: "oper".into(),
            reason: "spam".into(),
            expires_at: None,
        });
        let mut hosts = HostTable::new();
        let trust = TrustTable::new();
        let mut glines = GlineTable::new();
        let sink = NullSink::default();
        let mut flood = Policer::new(1_000.0, 1.0, 1_000);
        let mut flood_alerted = false;

        let events = new_user_policy(&mut n, "bob", 1_000, &alerts, &gags, &mut hosts, &trust, &mut glines, &sink, 100, 3_600, &mut flood, &mut flood_alerted);
        assert!(events.contains(&NewUserEvent::Gagged));
        assert!(n.user("bob").unwrap().modes.gagged);
    }

    #[test]
    fn kill_reaction_removes_user_and_stops_further_checks() {
        let mut n = net();
        n.new_user("evil", "x", "evil.example", "services.example.net", 1_000).unwrap();
        let mut alerts = AlertTable::new();
        alerts.register(UserAlert {
            name: "Z".into(),
            owner: "oper".into(),
            text: "begone".into(),
            discriminator: UserDiscriminator::parse("host evil.example", &n).unwrap(),
            reaction: Reaction::Kill,
        });
        let gags = GagList::new();
        let mut hosts = HostTable::new();
        let trust = TrustTable::new();
        let mut glines = GlineTable::new();
        let sink = NullSink::default();
        let mut flood = Policer::new(1_000.0, 1.0, 1_000);
        let mut flood_alerted = false;

        let events = new_user_policy(&mut n, "evil", 1_000, &alerts, &gags, &mut hosts, &trust, &mut glines, &sink, 100, 3_600, &mut flood, &mut flood_alerted);
        assert!(matches!(events[0], NewUserEvent::AlertFired { reaction: Reaction::Kill, .. }));
        assert!(n.user("evil").is_none());
    }
}
