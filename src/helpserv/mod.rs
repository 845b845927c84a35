//! HelpServ request-queue engine (spec §4.6, component J): per-bot help
//! queues with assignment, reassignment, persistence policies, weekly
//! stats rollover, and empty-channel alerting.
//!
//! Grounded on `original_source/mod-helpserv.c`; the per-bot `Bot` struct
//! (`bot.rs`) mirrors its `helpserv_bot_t`, generalized to own `HashMap`
//! registries instead of the source's intrusive linked lists (same
//! adaptation `netstate` makes for `DashMap` -> `HashMap`, spec §9 "global
//! mutable singletons").

mod bot;
mod helper;
mod request;

pub use bot::{BotEvent, BotFlags, LeaveKind, PersistPolicies, PresencePolicy, Templates, Timers};
pub use helper::{Buckets, Helper, HelperLevel, Weekday};
pub use request::{Request, RequestError};

use crate::clock::{SharedClock, Timestamp};
use crate::recdb::Record;
use bot::Bot;
use std::collections::HashMap;

/// The aggregate owning every HelpServ service bot (spec §3.4: the source
/// keys these by bot nickname in a module-global dict).
pub struct HelpServ {
    clock: SharedClock,
    bots: HashMap<String, Bot>,
    /// Day-of-week rollover was last driven for, so `drive_rollover` is a
    /// no-op when called more than once within the same day (spec §4.6
    /// "Missed rollovers during downtime are replayed between
    /// `last_stats_update` and now").
    last_stats_update: Timestamp,
}

impl HelpServ {
    pub fn new(clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            clock,
            bots: HashMap::new(),
            last_stats_update: now,
        }
    }

    pub fn register_bot(&mut self, bot: Bot) {
        self.bots.insert(bot.nick.clone(), bot);
    }

    pub fn bot(&self, nick: &str) -> Option<&Bot> {
        self.bots.get(nick)
    }

    pub fn bot_mut(&mut self, nick: &str) -> Option<&mut Bot> {
        self.bots.get_mut(nick)
    }

    pub fn bots(&self) -> impl Iterator<Item = &Bot> {
        self.bots.values()
    }

    /// Drive the weekly stats rollover for every bot/helper whose personal
    /// week boundary (midnight local time on `week_start`) falls strictly
    /// between `last_stats_update` and `now` (spec §4.6). Bounded to 8
    /// replayed days so a very long downtime can't spin forever.
    pub fn drive_rollover(&mut self, now: Timestamp) {
        const SECS_PER_DAY: i64 = 86_400;
        const MAX_REPLAYED_DAYS: i64 = 8;
        let first_midnight = (self.last_stats_update / SECS_PER_DAY + 1) * SECS_PER_DAY;
        let last_midnight = now / SECS_PER_DAY * SECS_PER_DAY;
        if first_midnight > last_midnight {
            return;
        }
        let days = ((last_midnight - first_midnight) / SECS_PER_DAY + 1).min(MAX_REPLAYED_DAYS);
        for day in 0..days {
            let midnight = first_midnight + day * SECS_PER_DAY;
            // Unix epoch (1970-01-01) was a Thursday: weekday index 4 (0 =
            // Sunday) when counting days-since-epoch mod 7.
            let weekday = (((midnight / SECS_PER_DAY) % 7 + 4) % 7) as Weekday;
            for bot in self.bots.values_mut() {
                for helper in bot.helpers.values_mut() {
                    if helper.week_start == weekday {
                        helper.rollover(midnight);
                    }
                }
            }
        }
        self.last_stats_update = now;
    }

    // -- saxdb persistence (spec §6.1) -----------------------------------

    /// Serialize every bot's helper roster and open requests, keyed by bot
    /// nick (spec §7: "services' own state files").
    pub fn to_record(&self) -> Record {
        let mut root = Record::empty_object();
        for bot in self.bots.values() {
            let base = format!("bots/{}", bot.nick);
            root.set_path(&format!("{base}/help_channel"), Record::QString(bot.help_channel.clone()));
            for helper in bot.helpers.values() {
                let hpath = format!("{base}/helpers/{}", helper.handle);
                root.set_path(&format!("{hpath}/level"), Record::QString(format!("{:?}", helper.level)));
                root.set_path(&format!("{hpath}/week_start"), Record::QString(helper.week_start.to_string()));
                for (name, bucket) in [
                    ("time_per_week", &helper.time_per_week),
                    ("picked_up", &helper.picked_up),
                    ("closed", &helper.closed),
                    ("reassigned_from", &helper.reassigned_from),
                    ("reassigned_to", &helper.reassigned_to),
                ] {
                    root.set_path(
                        &format!("{hpath}/{name}"),
                        Record::StringList(bucket.iter().map(i64::to_string).collect()),
                    );
                }
            }
            for request in bot.requests.values() {
                let rpath = format!("{base}/requests/{}", request.id);
                root.set_path(&format!("{rpath}/text"), Record::StringList(request.text.clone()));
                root.set_path(&format!("{rpath}/open_time"), Record::QString(request.open_time.to_string()));
                if let Some(user) = &request.user_nick {
                    root.set_path(&format!("{rpath}/user"), Record::QString(user.clone()));
                }
                if let Some(handle) = &request.handle {
                    root.set_path(&format!("{rpath}/handle"), Record::QString(handle.clone()));
                }
                if let Some(helper) = &request.helper {
                    root.set_path(&format!("{rpath}/helper"), Record::QString(helper.clone()));
                }
            }
        }
        root
    }

    pub fn load_record(&mut self, root: &Record) {
        let Some(bots) = root.get_object("bots") else { return };
        for (nick, bot_rec) in bots.iter() {
            let Some(bot) = self.bots.get_mut(nick) else { continue };
            if let Some(helpers) = bot_rec.get_object("helpers") {
                for (handle, hrec) in helpers.iter() {
                    let week_start = hrec.get_str("week_start").and_then(|s| s.parse().ok()).unwrap_or(0);
                    let mut helper = Helper::new(handle, HelperLevel::Helper, week_start);
                    for (name, bucket) in [
                        ("time_per_week", &mut helper.time_per_week),
                        ("picked_up", &mut helper.picked_up),
                        ("closed", &mut helper.closed),
                        ("reassigned_from", &mut helper.reassigned_from),
                        ("reassigned_to", &mut helper.reassigned_to),
                    ] {
                        if let Some(values) = hrec.get_string_list(name) {
                            for (slot, value) in bucket.iter_mut().zip(values) {
                                *slot = value.parse().unwrap_or(0);
                            }
                        }
                    }
                    bot.helpers.insert(handle.to_string(), helper);
                }
            }
            if let Some(requests) = bot_rec.get_object("requests") {
                for (id_str, rrec) in requests.iter() {
                    let Ok(id) = id_str.parse::<u32>() else { continue };
                    let text = rrec.get_string_list("text").map(|l| l.to_vec()).unwrap_or_default();
                    let open_time = rrec.get_str("open_time").and_then(|s| s.parse().ok()).unwrap_or(0);
                    let user = rrec.get_str("user").map(str::to_string);
                    let handle = rrec.get_str("handle").map(str::to_string);
                    let Ok(mut request) = Request::new(id, user.as_deref(), handle.as_deref(), text, open_time) else { continue };
                    request.helper = rrec.get_str("helper").map(str::to_string);
                    bot.requests.insert(id, request);
                    if request.helper.is_none() {
                        bot.reopen_unhandled(id);
                    }
                }
            }
        }
    }
}
