//! `Bot` (spec §3.4/§4.6): one HelpServ service nick's help-channel, roster,
//! request queue, timers, and presence policies.

use super::helper::{Helper, HelperLevel};
use super::request::{Request, RequestError};
use crate::clock::Timestamp;
use std::collections::HashMap;

/// What happens to a bound user/helper's requests or assignments when they
/// leave (spec §4.6 "Presence policies").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresencePolicy {
    Part,
    Quit,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveKind {
    Part,
    Quit,
}

impl LeaveKind {
    fn matches(self, policy: PresencePolicy) -> bool {
        matches!(
            (self, policy),
            (LeaveKind::Part, PresencePolicy::Part) | (LeaveKind::Quit, PresencePolicy::Quit)
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PersistPolicies {
    pub request: Option<PresencePolicy>,
    pub helper: Option<PresencePolicy>,
}

/// The five timers named in spec §3.4: idle, whine-delay, whine-interval,
/// empty-interval, stale-delay (all in seconds; `None` disables).
#[derive(Debug, Clone, Copy, Default)]
pub struct Timers {
    pub idle: Option<i64>,
    pub whine_delay: Option<i64>,
    pub whine_interval: Option<i64>,
    pub empty_interval: Option<i64>,
    pub stale_delay: Option<i64>,
}

/// The five parameterized message templates a bot sends (spec §3.4); named
/// by the occasions spec §4.6 describes rather than a generic array.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub opened: String,
    pub assigned: String,
    pub closed: String,
    pub stale_update: String,
    pub page: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BotFlags {
    pub privmsg_only: bool,
    pub req_on_join: bool,
    pub auto_voice: bool,
    pub auto_devoice: bool,
    pub helpchan_empty: bool,
}

/// Events a `Bot` operation produces for the caller to notify/log/page on;
/// the actual IRC send and the log-router call are external collaborators
/// (spec §1/§6.5), this only reports what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    RequestOpened { id: u32, wait_position: usize, on_join: bool },
    RequestAssigned { id: u32, helper: String },
    RequestClosed { id: u32, helper: String },
    RequestDropped { id: u32 },
    StaleUpdatePaged { id: u32, helper: String },
    HelperPaged { helper: String, reason: String },
    HelperAssignmentsReturned { helper: String, count: usize },
    HelperAbsenceAnnounced { helper: String },
    FirstEmpty,
    FirstOnlyTrial,
    EmptyNoMore,
}

pub struct Bot {
    pub nick: String,
    pub help_channel: String,
    pub timers: Timers,
    pub templates: Templates,
    pub persist: PersistPolicies,
    pub flags: BotFlags,
    pub id_wrap: u32,
    pub max_request_length: usize,
    pub helpers: HashMap<String, Helper>,
    pub requests: HashMap<u32, Request>,
    /// Oldest-first open-time order of unassigned requests (spec §3.4
    /// "head of unhandled linked list").
    unhandled: Vec<u32>,
    last_request_id: u32,
    pub last_active: Timestamp,
    /// Armed once the last non-trial helper leaves, cleared when one
    /// rejoins (spec §4.6 "Empty-channel alerting").
    empty_since: Option<Timestamp>,
}

impl Bot {
    pub fn new(nick: &str, help_channel: &str, id_wrap: u32, max_request_length: usize) -> Self {
        Self {
            nick: nick.to_string(),
            help_channel: help_channel.to_string(),
            timers: Timers::default(),
            templates: Templates::default(),
            persist: PersistPolicies::default(),
            flags: BotFlags::default(),
            id_wrap,
            max_request_length,
            helpers: HashMap::new(),
            requests: HashMap::new(),
            unhandled: Vec::new(),
            last_request_id: 0,
            last_active: 0,
            empty_since: None,
        }
    }

    // -- id allocation ----------------------------------------------------

    /// The next allocated id is the smallest positive integer not currently
    /// in use, modulo `id_wrap` (spec §8: "`id_wrap = 0` disables wrap").
    fn next_request_id(&mut self) -> u32 {
        if self.id_wrap == 0 {
            self.last_request_id += 1;
            return self.last_request_id;
        }
        let mut candidate = self.last_request_id % self.id_wrap;
        for _ in 0..=self.id_wrap {
            candidate = if candidate + 1 > self.id_wrap { 1 } else { candidate + 1 };
            if !self.requests.contains_key(&candidate) {
                self.last_request_id = candidate;
                return candidate;
            }
        }
        // Every slot in [1, id_wrap] is occupied; fall back to the next
        // value past the wrap rather than silently colliding.
        self.last_request_id += 1;
        self.last_request_id
    }

    // -- unhandled queue ---------------------------------------------------

    fn insert_unhandled(&mut self, id: u32, prepend_burst: bool) {
        if prepend_burst {
            self.unhandled.insert(0, id);
            return;
        }
        let open_time = self.requests.get(&id).map(|r| r.open_time).unwrap_or(0);
        let pos = self
            .unhandled
            .iter()
            .position(|other| self.requests.get(other).map(|r| r.open_time).unwrap_or(0) > open_time)
            .unwrap_or(self.unhandled.len());
        self.unhandled.insert(pos, id);
    }

    fn remove_unhandled(&mut self, id: u32) -> bool {
        if let Some(pos) = self.unhandled.iter().position(|&x| x == id) {
            self.unhandled.remove(pos);
            true
        } else {
            false
        }
    }

    /// Reinsert a loaded-from-saxdb request (whose `helper` is `None`) into
    /// the unhandled queue, sorted by its `open_time` (spec §6.1 reader
    /// contract: readers repopulate the same visible state).
    pub fn reopen_unhandled(&mut self, id: u32) {
        self.insert_unhandled(id, false);
    }

    pub fn wait_position(&self, id: u32) -> Option<usize> {
        self.unhandled.iter().position(|&x| x == id).map(|p| p + 1)
    }

    pub fn unhandled_len(&self) -> usize {
        self.unhandled.len()
    }

    pub fn oldest_unhandled(&self) -> Option<u32> {
        self.unhandled.first().copied()
    }

    // -- request lifecycle --------------------------------------------------

    /// Create a request (spec §4.6 "Request creation"). During a net-burst,
    /// `is_burst` prepends it ahead of same-timestamp siblings instead of
    /// sorting by open-time, to preserve burst arrival order (spec B.5).
    pub fn open_request(
        &mut self,
        user_nick: Option<&str>,
        handle: Option<&str>,
        first_line: &str,
        now: Timestamp,
        on_join: bool,
        is_burst: bool,
    ) -> Result<BotEvent, RequestError> {
        let id = self.next_request_id();
        let request = Request::new(id, user_nick, handle, vec![first_line.to_string()], now)?;
        self.requests.insert(id, request);
        self.insert_unhandled(id, is_burst);
        self.last_active = now;
        Ok(BotEvent::RequestOpened {
            id,
            wait_position: self.wait_position(id).unwrap_or(1),
            on_join,
        })
    }

    /// Append a follow-on message to the request bound to `user_nick` or
    /// `handle`, if one is open (spec §4.6 "Message routing").
    pub fn append_message(
        &mut self,
        user_nick: Option<&str>,
        handle: Option<&str>,
        line: &str,
        now: Timestamp,
    ) -> Option<Result<(), RequestError>> {
        let id = self.requests.values().find(|r| {
            (user_nick.is_some() && r.user_nick.as_deref() == user_nick)
                || (handle.is_some() && r.handle.as_deref() == handle)
        })?.id;
        let request = self.requests.get_mut(&id)?;
        Some(request.append(line, self.max_request_length, now))
    }

    /// Whether `request_id`'s request has gone stale and needs a helper
    /// page (spec §4.6: "idle longer than `stale_delay` and is not full").
    pub fn check_stale(&mut self, request_id: u32, now: Timestamp) -> Option<BotEvent> {
        let stale_delay = self.timers.stale_delay?;
        let max_len = self.max_request_length;
        let request = self.requests.get_mut(&request_id)?;
        if request.stale_notified || request.text.len() >= max_len {
            return None;
        }
        if request.idle_for(now) < stale_delay {
            return None;
        }
        let helper = request.helper.clone()?;
        request.stale_notified = true;
        Some(BotEvent::StaleUpdatePaged { id: request_id, helper })
    }

    fn assign(&mut self, id: u32, helper_handle: &str, now: Timestamp) -> Result<BotEvent, RequestError> {
        let request = self.requests.get_mut(&id).ok_or(RequestError::NotFound(id))?;
        request.helper = Some(helper_handle.to_string());
        request.assigned_time = Some(now);
        self.remove_unhandled(id);
        if let Some(helper) = self.helpers.get_mut(helper_handle) {
            helper.record_picked_up();
        }
        Ok(BotEvent::RequestAssigned { id, helper: helper_handle.to_string() })
    }

    /// `next`: take the oldest unhandled request (spec §4.6 "Assignment").
    pub fn assign_next(&mut self, helper_handle: &str, now: Timestamp) -> Result<BotEvent, RequestError> {
        let id = self.oldest_unhandled().ok_or(RequestError::NotFound(0))?;
        self.assign(id, helper_handle, now)
    }

    /// `pickup <id|nick|*handle>`.
    pub fn pickup(&mut self, query: &str, helper_handle: &str, now: Timestamp) -> Result<BotEvent, RequestError> {
        let id = if let Some(handle) = query.strip_prefix('*') {
            self.unhandled
                .iter()
                .find(|&&id| self.requests.get(&id).is_some_and(|r| r.handle.as_deref() == Some(handle)))
                .copied()
        } else if let Ok(parsed) = query.parse::<u32>() {
            self.unhandled.iter().find(|&&id| id == parsed).copied()
        } else {
            self.unhandled
                .iter()
                .find(|&&id| self.requests.get(&id).is_some_and(|r| r.user_nick.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(query))))
                .copied()
        };
        self.assign(id.ok_or(RequestError::NotFound(0))?, helper_handle, now)
    }

    /// `reassign`: move an already-assigned request from its current
    /// helper to another (manager-or-higher gate is the caller's
    /// responsibility, since it depends on the acting helper's own level).
    pub fn reassign(&mut self, id: u32, to_helper: &str, now: Timestamp) -> Result<BotEvent, RequestError> {
        let request = self.requests.get_mut(&id).ok_or(RequestError::NotFound(id))?;
        let from = request.helper.clone();
        request.helper = Some(to_helper.to_string());
        request.assigned_time = Some(now);
        if let Some(from) = from {
            if let Some(helper) = self.helpers.get_mut(&from) {
                helper.record_reassigned_from();
            }
        }
        if let Some(helper) = self.helpers.get_mut(to_helper) {
            // Spec §9 Open Question: `picked_up` is not decremented on
            // reassignment anywhere in the source; not "fixed" here.
            helper.record_reassigned_to();
        }
        Ok(BotEvent::RequestAssigned { id, helper: to_helper.to_string() })
    }

    /// Close an assigned request (spec §4.6 "On close, closed counter
    /// increments and the request is logged and removed").
    pub fn close(&mut self, id: u32) -> Result<BotEvent, RequestError> {
        let request = self.requests.remove(&id).ok_or(RequestError::NotFound(id))?;
        self.remove_unhandled(id);
        let helper = request.helper.clone().unwrap_or_default();
        if let Some(h) = request.helper.as_ref().and_then(|h| self.helpers.get_mut(h)) {
            h.record_closed();
        }
        Ok(BotEvent::RequestClosed { id, helper })
    }

    // -- presence policies --------------------------------------------------

    /// A bound user parts or quits the help channel (spec §4.6 "Presence
    /// policies"): `part`/`quit` drop+log the request, `close` nulls the
    /// user but keeps it discoverable by handle.
    pub fn on_user_leave(&mut self, user_nick: &str, kind: LeaveKind, now: Timestamp) -> Vec<BotEvent> {
        let mut events = Vec::new();
        let ids: Vec<u32> = self
            .requests
            .values()
            .filter(|r| r.user_nick.as_deref() == Some(user_nick))
            .map(|r| r.id)
            .collect();
        for id in ids {
            let policy = self.persist.request;
            let should_drop = policy.is_some_and(|p| kind.matches(p));
            if should_drop {
                self.requests.remove(&id);
                self.remove_unhandled(id);
                events.push(BotEvent::RequestDropped { id });
            } else if let Some(request) = self.requests.get_mut(&id) {
                // `close` policy: keep discoverable by handle if bound,
                // otherwise the request becomes orphaned but still open.
                request.user_nick = None;
                request.last_update = now;
            }
        }
        events
    }

    /// A helper parts or quits the help channel.
    pub fn on_helper_leave(&mut self, handle: &str, kind: LeaveKind, now: Timestamp) -> Vec<BotEvent> {
        let mut events = Vec::new();
        if let Some(helper) = self.helpers.get_mut(handle) {
            helper.mark_left(now);
        }
        let policy = self.persist.helper;
        let should_unassign = policy.is_some_and(|p| kind.matches(p));
        if should_unassign {
            let ids: Vec<u32> = self
                .requests
                .values()
                .filter(|r| r.helper.as_deref() == Some(handle))
                .map(|r| r.id)
                .collect();
            for &id in &ids {
                if let Some(request) = self.requests.get_mut(&id) {
                    request.helper = None;
                    request.assigned_time = None;
                }
                self.insert_unhandled(id, false);
            }
            if !ids.is_empty() {
                events.push(BotEvent::HelperAssignmentsReturned { helper: handle.to_string(), count: ids.len() });
                events.push(BotEvent::HelperPaged { helper: handle.to_string(), reason: "assignments returned".to_string() });
            }
        } else {
            events.push(BotEvent::HelperAbsenceAnnounced { helper: handle.to_string() });
        }
        events.extend(self.update_empty_state(now));
        events
    }

    pub fn on_helper_join(&mut self, handle: &str, now: Timestamp) -> Vec<BotEvent> {
        if let Some(helper) = self.helpers.get_mut(handle) {
            helper.mark_joined(now);
        }
        self.update_empty_state(now)
    }

    fn has_full_helper_present(&self) -> bool {
        self.helpers.values().any(|h| h.is_present() && h.level > HelperLevel::Trial)
    }

    fn has_any_helper_present(&self) -> bool {
        self.helpers.values().any(|h| h.is_present())
    }

    /// Re-derive the empty/non-empty state and report the transition, if
    /// any (spec §4.6 "Empty-channel alerting").
    fn update_empty_state(&mut self, now: Timestamp) -> Vec<BotEvent> {
        let mut events = Vec::new();
        if self.has_full_helper_present() {
            if self.empty_since.is_some() {
                self.empty_since = None;
                events.push(BotEvent::EmptyNoMore);
            }
            return events;
        }
        if self.empty_since.is_none() && self.timers.empty_interval.is_some() {
            self.empty_since = Some(now);
            if self.has_any_helper_present() {
                events.push(BotEvent::FirstOnlyTrial);
            } else {
                events.push(BotEvent::FirstEmpty);
            }
        }
        events
    }

    /// Fire a repeat empty-channel alert if the interval has elapsed since
    /// it was armed or last fired; caller re-arms by calling this from a
    /// time-queue callback.
    pub fn empty_alert_due(&self, now: Timestamp) -> bool {
        match (self.empty_since, self.timers.empty_interval) {
            (Some(since), Some(interval)) => now - since >= interval,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> Bot {
        let mut b = Bot::new("HelpServ", "#help", 1_000, 10);
        b.persist.request = Some(PresencePolicy::Part);
        b.persist.helper = Some(PresencePolicy::Part);
        b
    }

    #[test]
    fn request_lifecycle_scenario() {
        let mut b = bot();
        b.helpers.insert("carol".into(), Helper::new("carol", HelperLevel::Helper, 0));

        let event = b.open_request(Some("bob"), None, "help me", 1_000, true, false).unwrap();
        assert_eq!(event, BotEvent::RequestOpened { id: 1, wait_position: 1, on_join: true });

        let event = b.assign_next("carol", 1_010).unwrap();
        assert_eq!(event, BotEvent::RequestAssigned { id: 1, helper: "carol".into() });
        assert_eq!(b.helpers["carol"].picked_up[0], 1);

        let event = b.close(1).unwrap();
        assert_eq!(event, BotEvent::RequestClosed { id: 1, helper: "carol".into() });
        assert!(b.requests.is_empty());
        assert_eq!(b.helpers["carol"].closed[0], 1);
    }

    #[test]
    fn id_wrap_reuses_smallest_free_id() {
        let mut b = Bot::new("HelpServ", "#help", 2, 10);
        b.open_request(Some("a"), None, "x", 1_000, false, false).unwrap();
        b.open_request(Some("b"), None, "x", 1_001, false, false).unwrap();
        b.close(1).unwrap();
        let event = b.open_request(Some("c"), None, "x", 1_002, false, false).unwrap();
        assert_eq!(event, BotEvent::RequestOpened { id: 1, wait_position: 1, on_join: false });
    }

    #[test]
    fn id_wrap_zero_never_wraps() {
        let mut b = Bot::new("HelpServ", "#help", 0, 10);
        for i in 0..5 {
            let event = b.open_request(Some(&format!("u{i}")), None, "x", 1_000, false, false).unwrap();
            assert_eq!(event, BotEvent::RequestOpened { id: i as u32 + 1, wait_position: i + 1, on_join: false });
        }
    }

    #[test]
    fn helper_part_under_part_policy_returns_assignment_to_original_position() {
        let mut b = bot();
        b.helpers.insert("h".into(), Helper::new("h", HelperLevel::Helper, 0));
        b.open_request(Some("a"), None, "x", 1_000, false, false).unwrap(); // id 1
        b.open_request(Some("b"), None, "x", 1_010, false, false).unwrap(); // id 2
        b.assign_next("h", 1_020).unwrap(); // assigns id 1
        assert_eq!(b.unhandled_len(), 1);

        let events = b.on_helper_leave("h", LeaveKind::Part, 1_030);
        assert!(events.contains(&BotEvent::HelperAssignmentsReturned { helper: "h".into(), count: 1 }));
        assert_eq!(b.wait_position(1), Some(1), "should return to the position matching its open-time");
        assert_eq!(b.wait_position(2), Some(2));
    }

    #[test]
    fn user_quit_under_close_policy_nulls_user_but_keeps_request() {
        let mut b = bot();
        b.persist.request = Some(PresencePolicy::Close);
        b.open_request(Some("bob"), Some("bobhandle"), "x", 1_000, false, false).unwrap();
        let events = b.on_user_leave("bob", LeaveKind::Quit, 1_010);
        assert!(events.is_empty(), "close policy never drops the request");
        assert!(b.requests[&1].user_nick.is_none());
        assert_eq!(b.requests[&1].handle.as_deref(), Some("bobhandle"));
    }

    #[test]
    fn empty_channel_alert_fires_once_and_clears_on_rejoin() {
        let mut b = Bot::new("HelpServ", "#help", 0, 10);
        b.timers.empty_interval = Some(300);
        b.helpers.insert("h".into(), Helper::new("h", HelperLevel::Helper, 0));
        b.on_helper_join("h", 1_000);
        let events = b.on_helper_leave("h", LeaveKind::Part, 1_100);
        assert!(events.iter().any(|e| matches!(e, BotEvent::FirstEmpty)));
        let events = b.on_helper_join("h", 1_200);
        assert!(events.contains(&BotEvent::EmptyNoMore));
    }
}
