//! `Request` (spec §3.4): one open help ticket, bound to a user and/or a
//! handle, optionally assigned to a helper.

use crate::clock::Timestamp;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("a request must be bound to a user or a handle (or both)")]
    Unbound,
    #[error("request {0} is already at its maximum length")]
    Full(u32),
    #[error("no such request: {0}")]
    NotFound(u32),
}

#[derive(Debug, Clone)]
pub struct Request {
    pub id: u32,
    /// The assigned helper's handle, if any (spec §3.4 invariant: a request
    /// has a helper iff it is not in the unhandled list).
    pub helper: Option<String>,
    pub text: Vec<String>,
    pub user_nick: Option<String>,
    pub handle: Option<String>,
    pub open_time: Timestamp,
    pub assigned_time: Option<Timestamp>,
    pub last_update: Timestamp,
    /// Set once a stale-update marker has been appended, so a second ping
    /// before the next real update doesn't double-page the helper.
    pub stale_notified: bool,
}

impl Request {
    pub fn new(
        id: u32,
        user_nick: Option<&str>,
        handle: Option<&str>,
        text: Vec<String>,
        open_time: Timestamp,
    ) -> Result<Self, RequestError> {
        if user_nick.is_none() && handle.is_none() {
            return Err(RequestError::Unbound);
        }
        Ok(Self {
            id,
            helper: None,
            text,
            user_nick: user_nick.map(str::to_string),
            handle: handle.map(str::to_string),
            open_time,
            assigned_time: None,
            last_update: open_time,
            stale_notified: false,
        })
    }

    pub fn is_unhandled(&self) -> bool {
        self.helper.is_none()
    }

    /// Append a follow-on line, enforcing `max_len` (spec §4.6 "Message
    /// routing" / §8 boundary: "A request created exactly at `req_maxlen`
    /// lines accepts no further append").
    pub fn append(&mut self, line: &str, max_len: usize, now: Timestamp) -> Result<(), RequestError> {
        if self.text.len() >= max_len {
            return Err(RequestError::Full(self.id));
        }
        self.text.push(line.to_string());
        self.last_update = now;
        self.stale_notified = false;
        Ok(())
    }

    pub fn idle_for(&self, now: Timestamp) -> i64 {
        (now - self.last_update).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_request_is_rejected() {
        let result = Request::new(1, None, None, vec![], 1_000);
        assert_eq!(result.unwrap_err(), RequestError::Unbound);
    }

    #[test]
    fn append_stops_exactly_at_max_len() {
        let mut r = Request::new(1, Some("alice"), None, vec!["hi".into()], 1_000).unwrap();
        assert!(r.append("more", 2, 1_001).is_ok());
        assert_eq!(r.append("even more", 2, 1_002), Err(RequestError::Full(1)));
    }
}
