//! Core network-state engine and service bots for an IRC services daemon
//! (spec §1): network state, the discriminator/policy engine, OperServ and
//! HelpServ, the log router, the helpfile renderer, RecDB persistence, and
//! the optional mail queue — wired together by [`Services`], but with no
//! socket I/O, wire codec, or event loop of its own (those are external
//! collaborators per spec §1/§9).

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod discriminator;
pub mod error;
pub mod helpserv;
pub mod hooks;
pub mod logging;
pub mod mailq;
pub mod messages;
pub mod netstate;
pub mod operserv;
pub mod policer;
pub mod recdb;
pub mod saxdb;
pub mod timeq;
pub mod wildcard;

use clock::{SharedClock, Timestamp};
use messages::ServiceNicks;
use saxdb::{Saxdb, SaxdbError};
use std::path::Path;

pub use error::Error;

/// The top-level aggregate root (spec §9 "global mutable singletons"):
/// every module-global dict and counter the original program kept as
/// process globals lives here instead, constructed once at startup and
/// threaded wherever it's needed rather than reached for as a language
/// global.
pub struct Services {
    pub clock: SharedClock,
    pub config: config::Config,
    pub network: netstate::Network,
    pub timeq: timeq::TimeQueue,
    pub logs: logging::LogRouter,
    pub messages: messages::MessageCatalog,
    pub operserv: operserv::OperServ,
    pub helpserv: helpserv::HelpServ,
    pub mail: mailq::MailQueue,
    pub service_nicks: ServiceNicks,
}

impl Services {
    pub fn new(clock: SharedClock, self_server_name: &str, service_nicks: ServiceNicks) -> Self {
        let now = clock.now();
        Self {
            config: config::Config::new(),
            network: netstate::Network::new(self_server_name, now),
            timeq: timeq::TimeQueue::new(),
            logs: logging::LogRouter::new(clock.clone()),
            messages: messages::MessageCatalog::new(),
            operserv: operserv::OperServ::new(clock.clone(), operserv::OperServConfig::default()),
            helpserv: helpserv::HelpServ::new(clock.clone()),
            mail: mailq::MailQueue::new(),
            service_nicks,
            clock,
        }
    }

    /// Drive every subsystem's time-bounded work for `now`: due timers,
    /// weekly HelpServ stats rollover, and OperServ's expiry sweep (spec
    /// §9: the poll loop calls this once per pass; nothing in this crate
    /// reads the OS clock to decide when on its own).
    pub fn tick(&mut self, now: Timestamp, gline_sink: &dyn operserv::GlineSink) {
        self.timeq.dispatch_due(now);
        self.helpserv.drive_rollover(now);
        self.operserv.expire_all(gline_sink);
    }

    /// Assemble a write-only registry and atomically persist every
    /// subsystem's state to `path` (spec §6.1). Kept separate from
    /// [`restore_from`] because the writer half only ever needs `&self`
    /// borrows, letting every subsystem register concurrently without
    /// conflicting with the reader half's `&mut self` borrows.
    pub fn persist_to(&self, path: impl AsRef<Path>) -> Result<(), SaxdbError> {
        let mut db = Saxdb::new();
        db.register_writer("operserv", || self.operserv.to_record());
        db.register_writer("helpserv", || self.helpserv.to_record());
        db.register_writer("mail", || self.mail.to_record());
        db.write_all(path)
    }

    /// Assemble a read-only registry and restore every subsystem's state
    /// from `path` (spec §6.1). Each closure below borrows a distinct field
    /// of `self` exclusively; Rust's per-field closure capture keeps those
    /// borrows from overlapping even though they're all `&mut`.
    pub fn restore_from(&mut self, path: impl AsRef<Path>) -> Result<(), SaxdbError> {
        let mut db = Saxdb::new();
        db.register_reader("operserv", |rec| self.operserv.load_record(rec));
        db.register_reader("helpserv", |rec| self.helpserv.load_record(rec));
        db.register_reader("mail", |rec| self.mail.load_record(rec));
        db.read_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn nicks() -> ServiceNicks {
        ServiceNicks {
            global: "Global".into(),
            chanserv: "ChanServ".into(),
            opserv: "OpServ".into(),
            nickserv: "NickServ".into(),
        }
    }

    #[test]
    fn services_persist_and_restore_round_trip() {
        let clock: SharedClock = Arc::new(ManualClock::new(1_000));
        let mut services = Services::new(clock.clone(), "services.example.net", nicks());
        services.operserv.bad_words.add("evil");
        services.mail.bans.ban("*@blackhole.example");

        let dir = tempdir().unwrap();
        let path = dir.path().join("services.db");
        services.persist_to(&path).unwrap();

        let mut reloaded = Services::new(clock, "services.example.net", nicks());
        reloaded.restore_from(&path).unwrap();

        assert!(reloaded.operserv.bad_words.contains_bad_word("evildoer"));
        assert!(reloaded.mail.bans.is_banned("x@blackhole.example"));
    }

    #[test]
    fn tick_dispatches_due_timers() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let clock: SharedClock = Arc::new(ManualClock::new(1_000));
        let mut services = Services::new(clock.clone(), "services.example.net", nicks());
        let fired = Rc::new(RefCell::new(false));
        let fired2 = fired.clone();
        services.timeq.add(1_500, "test", "once", move || *fired2.borrow_mut() = true);

        struct NullSink;
        impl operserv::GlineSink for NullSink {
            fn advertise(&self, _gline: &operserv::Gline) {}
            fn withdraw(&self, _target: &str) {}
        }

        services.tick(2_000, &NullSink);
        assert!(*fired.borrow());
    }
}
