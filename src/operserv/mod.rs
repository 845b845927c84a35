//! OperServ policy core (spec §4.5, component I): the aggregate root that
//! owns the trust table, per-IP host roster, gag list, alert table, gline
//! table, reserved nicks, bad-channel enforcement, and the join/new-user
//! policy pipelines, wiring them to a shared [`Clock`](crate::clock::Clock)
//! and [`TimeQueue`](crate::timeq::TimeQueue) instead of each owning its own.
//!
//! Grounded on `original_source/opserv.c`'s single `opserv_` global state
//! block; the teacher's equivalent is a per-service struct wired into one
//! `Services` root (see `src/lib.rs`), which is the shape reused here.

mod alert;
mod gag;
mod gline;
mod host;
mod policy;
mod reserved;
mod trust;

pub use alert::{AlertTable, UserAlert};
pub use gag::{Gag, GagList};
pub use gline::{Gline, GlineSink, GlineTable};
pub use host::{HostInfo, HostTable};
pub use policy::{
    is_bad_channel, BadWordList, ExemptChannels, JoinEvent, NewUserEvent, ILLEGAL_CHANNEL_REASON,
};
pub use reserved::{ReservedNick, ReservedNicks};
pub use trust::{TrustTable, TrustedHost};

use crate::clock::SharedClock;
use crate::netstate::Network;
use crate::policer::Policer;
use crate::recdb::Record;
use crate::timeq::TimeQueue;
use std::collections::HashMap;
use std::net::IpAddr;

/// Tunables read from config (spec §4.2/§4.5); kept as plain fields rather
/// than re-reading `Config` on every policy check.
#[derive(Debug, Clone)]
pub struct OperServConfig {
    pub default_clone_limit: u32,
    pub clone_gline_duration: i64,
    pub join_policer_size: f64,
    pub join_policer_rate: f64,
    pub moderate_threshold: usize,
    pub new_user_policer_size: f64,
    pub new_user_policer_rate: f64,
}

impl Default for OperServConfig {
    fn default() -> Self {
        Self {
            default_clone_limit: 3,
            clone_gline_duration: 3_600,
            join_policer_size: 4.0,
            join_policer_rate: 1.0,
            moderate_threshold: 20,
            new_user_policer_size: 20.0,
            new_user_policer_rate: 1.0,
        }
    }
}

/// The OperServ aggregate: trust/clone enforcement, join-flood policing,
/// bad-channel enforcement, the gag list, gline scheduling, and the
/// discriminator-driven alert engine (spec §4.5).
pub struct OperServ {
    clock: SharedClock,
    pub config: OperServConfig,
    pub trust: TrustTable,
    pub hosts: HostTable,
    pub gags: GagList,
    pub alerts: AlertTable,
    pub glines: GlineTable,
    pub reserved: ReservedNicks,
    pub bad_words: BadWordList,
    pub exempt_channels: ExemptChannels,
    /// Channel name -> warning reason, broadcast to opers on any join
    /// (spec §3.3 `ChannelWarning`).
    pub channel_warnings: HashMap<String, String>,
    channel_policers: HashMap<String, Policer>,
    new_user_policer: Policer,
    flood_alerted: bool,
}

impl OperServ {
    pub fn new(clock: SharedClock, config: OperServConfig) -> Self {
        let now = clock.now();
        let new_user_policer = Policer::new(config.new_user_policer_size, config.new_user_policer_rate, now);
        Self {
            clock,
            config,
            trust: TrustTable::new(),
            hosts: HostTable::new(),
            gags: GagList::new(),
            alerts: AlertTable::new(),
            glines: GlineTable::new(),
            reserved: ReservedNicks::new(),
            bad_words: BadWordList::new(),
            exempt_channels: ExemptChannels::new(),
            channel_warnings: HashMap::new(),
            channel_policers: HashMap::new(),
            new_user_policer,
            flood_alerted: false,
        }
    }

    /// Drive the new-user pipeline (spec §4.5 "New-user pipeline").
    pub fn on_new_user(
        &mut self,
        network: &mut Network,
        nick: &str,
        timeq: &mut TimeQueue,
        gline_sink: &dyn GlineSink,
    ) -> Vec<NewUserEvent> {
        let now = self.clock.now();
        policy::new_user_policy(
            network,
            nick,
            now,
            &self.alerts,
            &self.gags,
            &mut self.hosts,
            &self.trust,
            &mut self.glines,
            gline_sink,
            timeq,
            self.config.default_clone_limit,
            self.config.clone_gline_duration,
            &mut self.new_user_policer,
            &mut self.flood_alerted,
        )
    }

    /// Drive the join-time pipeline (spec §4.5 "Join-time policy pipeline").
    pub fn on_join(&mut self, network: &mut Network, nick: &str, channel: &str) -> Vec<JoinEvent> {
        let now = self.clock.now();
        policy::join_policy(
            network,
            nick,
            channel,
            now,
            &self.bad_words,
            &self.exempt_channels,
            &self.glines,
            &self.alerts,
            &self.channel_warnings,
            &mut self.channel_policers,
            self.config.join_policer_size,
            self.config.join_policer_rate,
            self.config.moderate_threshold,
        )
    }

    /// Checked on nick change (spec §4.5 "Alerts": "An alert with a
    /// nick-mask is checked on nick change").
    pub fn on_nick_change(&self, network: &Network, new_nick: &str) -> Vec<&UserAlert> {
        let now = self.clock.now();
        self.alerts
            .nick_masked()
            .filter(|a| network.user(new_nick).is_some_and(|u| a.discriminator.matches(u, network, now, 0, 1)))
            .collect()
    }

    /// Release `nick`'s IP slot in the host table (spec §3.3 `HostInfo`:
    /// "destroyed when last user disconnects"); called from the del-user
    /// hook.
    pub fn on_del_user(&mut self, nick: &str, ip: Option<IpAddr>) {
        if let Some(ip) = ip {
            self.hosts.remove_client(ip, nick);
        }
    }

    /// Sweep all time-bounded state for anything past its expiry: trusted
    /// hosts, gags, glines (spec §8 invariant 6). Normally each of these is
    /// also scheduled individually on the time queue; this is the
    /// idempotent catch-all invoked e.g. after a downtime replay.
    pub fn expire_all(&mut self, gline_sink: &dyn GlineSink) {
        let now = self.clock.now();
        self.trust.expire(now);
        self.gags.expire(now);
        self.glines.expire_due(now, gline_sink);
    }

    // -- saxdb persistence (spec §6.1) -----------------------------------

    /// Serialize gags, trusts, alerts, and persistent reserved nicks. Host
    /// tracking and channel policers are derived runtime state and are not
    /// persisted (spec §3.3: `HostInfo` is "created on first connection",
    /// not restored).
    pub fn to_record(&self) -> Record {
        let mut root = Record::empty_object();
        for (i, gag) in self.gags.iter().enumerate() {
            let path = format!("gags/{i}");
            root.set_path(&format!("{path}/mask"), Record::QString(gag.mask.clone()));
            root.set_path(&format!("{path}/owner"), Record::QString(gag.owner.clone()));
            root.set_path(&format!("{path}/reason"), Record::QString(gag.reason.clone()));
            if let Some(exp) = gag.expires_at {
                root.set_path(&format!("{path}/expires"), Record::QString(exp.to_string()));
            }
        }
        for (addr, host) in self.trust.iter() {
            let path = format!("trusted_hosts/{addr}");
            root.set_path(&format!("{path}/limit"), Record::QString(host.limit.to_string()));
            root.set_path(&format!("{path}/issuer"), Record::QString(host.issuer.clone()));
            root.set_path(&format!("{path}/issued"), Record::QString(host.issued_at.to_string()));
            root.set_path(&format!("{path}/reason"), Record::QString(host.reason.clone()));
            if let Some(exp) = host.expires_at {
                root.set_path(&format!("{path}/expires"), Record::QString(exp.to_string()));
            }
        }
        for nick in self.reserved.persistent() {
            let path = format!("reserved/{}", nick.nick);
            root.set_path(&format!("{path}/reason"), Record::QString(nick.reason.clone()));
        }
        for word in self.bad_words.iter() {
            root.set_path(&format!("bad_words/{word}"), Record::QString("1".to_string()));
        }
        root
    }

    /// Repopulate from a previously-written record tree, a no-op per field
    /// that is absent (spec §6.1: "Missing subsystems read as absent and
    /// initialize to empty/default").
    pub fn load_record(&mut self, root: &Record) {
        if let Some(gags) = root.get_object("gags") {
            for (_, entry) in gags.iter() {
                let Some(mask) = entry.get_str("mask") else { continue };
                self.gags.add(Gag {
                    mask: mask.to_string(),
                    owner: entry.get_str("owner").unwrap_or_default().to_string(),
                    reason: entry.get_str("reason").unwrap_or_default().to_string(),
                    expires_at: entry.get_str("expires").and_then(|s| s.parse().ok()),
                });
            }
        }
        if let Some(hosts) = root.get_object("trusted_hosts") {
            for (addr_str, entry) in hosts.iter() {
                let Ok(addr) = addr_str.parse::<IpAddr>() else { continue };
                let Some(limit) = entry.get_str("limit").and_then(|s| s.parse().ok()) else { continue };
                self.trust.insert(
                    addr,
                    TrustedHost {
                        limit,
                        issuer: entry.get_str("issuer").unwrap_or_default().to_string(),
                        issued_at: entry.get_str("issued").and_then(|s| s.parse().ok()).unwrap_or(0),
                        expires_at: entry.get_str("expires").and_then(|s| s.parse().ok()),
                        reason: entry.get_str("reason").unwrap_or_default().to_string(),
                    },
                );
            }
        }
        if let Some(reserved) = root.get_object("reserved") {
            for (nick, entry) in reserved.iter() {
                self.reserved.reserve(ReservedNick {
                    nick: nick.to_string(),
                    reason: entry.get_str("reason").unwrap_or_default().to_string(),
                    persistent: true,
                });
            }
        }
        if let Some(words) = root.get_object("bad_words") {
            for (word, _) in words.iter() {
                self.bad_words.add(word);
            }
        }
    }
}
