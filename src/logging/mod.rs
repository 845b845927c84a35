//! Log router (spec §4.3, component C): key-driven destination assignment,
//! audit retention, and the `log_audit`/`log_replay`/`log_module` entry
//! points used throughout the rest of the crate.

mod audit;
mod destination;
mod key;
mod severity;

pub use audit::{AuditEntry, AuditList, LogSearchCriteria};
pub use destination::{Destination, FileDestination, IrcDestination, IrcSink, LogEvent, StdDestination, StdStream};
pub use key::{KeyError, LogKey};
pub use severity::{InvalidSeverity, Severity, ALL_SEVERITIES};

use crate::clock::SharedClock;
use std::collections::HashMap;
use std::rc::Rc;

/// The literal logset name that absorbs any log type with no explicit
/// assignment (spec §4.3: `*` names the default bucket).
pub const DEFAULT_BUCKET: &str = "*";

#[derive(Debug, Clone, Copy)]
pub struct AuditCaps {
    pub max_age: Option<i64>,
    pub max_count: Option<usize>,
}

impl Default for AuditCaps {
    fn default() -> Self {
        Self {
            max_age: None,
            max_count: Some(200),
        }
    }
}

/// Owns destination instances, the (type, severity) -> destinations
/// assignment table, and every log type's audit retention list.
pub struct LogRouter {
    clock: SharedClock,
    /// `kind:args` spec -> shared destination instance. Destinations are
    /// refcounted via `Rc`; dropping the last slot reference (and this
    /// entry) destroys the underlying resource (spec §4.3).
    destinations: HashMap<String, Rc<dyn Destination>>,
    slots: HashMap<(String, Severity), Vec<Rc<dyn Destination>>>,
    audit: HashMap<String, AuditList>,
    default_caps: AuditCaps,
    type_caps: HashMap<String, AuditCaps>,
}

impl std::fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRouter")
            .field("destinations", &self.destinations.keys().collect::<Vec<_>>())
            .field("slot_count", &self.slots.len())
            .finish()
    }
}

impl LogRouter {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            destinations: HashMap::new(),
            slots: HashMap::new(),
            audit: HashMap::new(),
            default_caps: AuditCaps::default(),
            type_caps: HashMap::new(),
        }
    }

    pub fn set_audit_caps(&mut self, log_type: &str, caps: AuditCaps) {
        self.type_caps.insert(log_type.to_string(), caps);
    }

    /// Register or reuse a destination under `dest_spec` (the `kind:args`
    /// identity used for refcounting), then assign it to every (type,
    /// severity) slot `key` expands to.
    pub fn assign(&mut self, key: &str, dest_spec: &str, dest: impl FnOnce() -> Rc<dyn Destination>) -> Result<(), KeyError> {
        let parsed = LogKey::parse(key)?;
        let handle = self.destinations.entry(dest_spec.to_string()).or_insert_with(dest).clone();
        for (log_type, severity) in parsed.expand() {
            self.slots.entry((log_type, severity)).or_default().push(handle.clone());
        }
        Ok(())
    }

    /// Drop every assignment and destination, releasing any refcounted
    /// resources whose last reference was held here.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.destinations.clear();
    }

    fn slot(&self, log_type: &str, severity: Severity) -> Option<&Vec<Rc<dyn Destination>>> {
        self.slots
            .get(&(log_type.to_string(), severity))
            .or_else(|| self.slots.get(&(DEFAULT_BUCKET.to_string(), severity)))
    }

    fn dispatch(&self, log_type: &str, severity: Severity, event: &LogEvent<'_>) {
        if let Some(dests) = self.slot(log_type, severity) {
            for dest in dests {
                dest.handle_event(log_type, severity, event);
            }
        }
        if severity == Severity::Fatal {
            std::process::exit(1);
        }
    }

    /// Close and reopen every distinct destination (e.g. on SIGHUP).
    pub fn reopen_all(&self) {
        for dest in self.destinations.values() {
            dest.reopen();
        }
    }

    /// Route a raw protocol line for debugging. Never retained.
    pub fn log_replay(&self, log_type: &str, severity: Severity, is_write: bool, line: &str) {
        self.dispatch(log_type, severity, &LogEvent::Replay { is_write, line });
    }

    /// Route a one-off formatted message. Never retained.
    pub fn log_module(&self, log_type: &str, severity: Severity, message: &str) {
        self.dispatch(log_type, severity, &LogEvent::Module { message });
    }

    /// Allocate, retain, and route an audit entry. Only
    /// {command, override, staff} severities are accepted (spec §4.3); any
    /// other severity is a caller bug and is ignored defensively rather than
    /// panicking, since log calls must never be able to crash the service
    /// they're instrumenting.
    #[allow(clippy::too_many_arguments)]
    pub fn log_audit(
        &mut self,
        log_type: &str,
        severity: Severity,
        bot: &str,
        channel: Option<&str>,
        nick: &str,
        account: Option<&str>,
        hostmask: Option<&str>,
        command: &str,
    ) {
        if !severity.is_auditable() {
            return;
        }
        let now = self.clock.now();
        let secs_in_day = now.rem_euclid(86_400);
        let default_description = format!(
            "[{:02}:{:02}:{:02}] {bot} {command}",
            secs_in_day / 3600,
            (secs_in_day % 3600) / 60,
            secs_in_day % 60,
        );
        let entry = AuditEntry {
            time: now,
            severity,
            bot: bot.to_string(),
            channel: channel.map(str::to_string),
            nick: nick.to_string(),
            account: account.map(str::to_string),
            hostmask: hostmask.map(str::to_string),
            command: command.to_string(),
            default_description,
        };

        self.dispatch(log_type, severity, &LogEvent::Audit(&entry));

        let caps = self.type_caps.get(log_type).copied().unwrap_or(self.default_caps);
        let list = self
            .audit
            .entry(log_type.to_string())
            .or_insert_with(|| AuditList::new(caps.max_age, caps.max_count));
        list.push(entry, now);
    }

    pub fn search(&self, log_type: &str, criteria: &LogSearchCriteria) -> Vec<&AuditEntry> {
        match self.audit.get(log_type) {
            Some(list) => audit::search(list, criteria, self.clock.now()),
            None => Vec::new(),
        }
    }

    pub fn audit_list(&self, log_type: &str) -> Option<&AuditList> {
        self.audit.get(log_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::RefCell;
    use std::sync::Arc;

    #[derive(Debug)]
    struct RecordingDestination {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Destination for RecordingDestination {
        fn handle_event(&self, log_type: &str, severity: Severity, event: &LogEvent<'_>) {
            self.calls
                .borrow_mut()
                .push(format!("{log_type}.{} {:?}", severity.name(), event));
        }
    }

    fn router() -> LogRouter {
        LogRouter::new(Arc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn assignment_routes_matching_type_and_severity() {
        let mut r = router();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls2 = calls.clone();
        r.assign("opserv.warning,error", "std:out", move || {
            Rc::new(RecordingDestination { calls: calls2.clone() })
        })
        .unwrap();
        r.log_module("opserv", Severity::Warning, "disk low");
        r.log_module("opserv", Severity::Info, "ignored, wrong severity");
        r.log_module("helpserv", Severity::Warning, "ignored, wrong type");
        assert_eq!(calls.borrow().len(), 1);
        assert!(calls.borrow()[0].contains("opserv.warning"));
    }

    #[test]
    fn unmatched_type_falls_back_to_default_bucket() {
        let mut r = router();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls2 = calls.clone();
        r.assign("*.warning", "std:out", move || Rc::new(RecordingDestination { calls: calls2.clone() }))
            .unwrap();
        r.log_module("anything", Severity::Warning, "hi");
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn destinations_are_shared_across_slots() {
        let mut r = router();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls2 = calls.clone();
        let built = Rc::new(std::cell::Cell::new(0));
        let built2 = built.clone();
        r.assign("opserv.warning", "std:out", {
            let calls2 = calls2.clone();
            move || {
                built2.set(built2.get() + 1);
                Rc::new(RecordingDestination { calls: calls2 })
            }
        })
        .unwrap();
        // second assign reuses the cached "std:out" handle, so the builder
        // closure below must never run.
        r.assign("opserv.error", "std:out", || panic!("builder must not run twice")).unwrap();
        r.log_module("opserv", Severity::Warning, "a");
        r.log_module("opserv", Severity::Error, "b");
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(built.get(), 1);
    }

    #[test]
    fn log_audit_rejects_non_auditable_severities() {
        let mut r = router();
        r.log_audit("opserv", Severity::Info, "OpServ", None, "alice", None, None, "whois");
        assert!(r.search("opserv", &LogSearchCriteria::default()).is_empty());
    }

    #[test]
    fn log_audit_retains_and_is_searchable() {
        let mut r = router();
        r.log_audit("opserv", Severity::Staff, "OpServ", Some("#help"), "alice", Some("alice"), None, "gline *@bad.host");
        let found = r.search("opserv", &LogSearchCriteria {
            nick: Some("alice".to_string()),
            ..Default::default()
        });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].command, "gline *@bad.host");
    }
}
