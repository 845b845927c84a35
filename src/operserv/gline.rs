//! Gline scheduling (spec §4.5 "Gline scheduling", §8 invariant 6): a
//! network-scoped ban advertised to the uplink and removed by the time
//! queue at its expiry.

use crate::clock::Timestamp;
use crate::timeq::{DeleteMatch, TimeQueue};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Gline {
    pub target: String,
    pub issuer: String,
    pub reason: String,
    pub issued_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub enabled: bool,
}

/// An outbound advertisement of a gline's state to the uplink. The wire
/// encoding is out of scope (spec §1); this is the semantic action the core
/// produces.
pub trait GlineSink {
    fn advertise(&self, gline: &Gline);
    fn withdraw(&self, target: &str);
}

const TIMEQ_KIND: &str = "gline_expire";

#[derive(Default)]
pub struct GlineTable {
    glines: HashMap<String, Gline>,
}

impl GlineTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add and enable a gline, advertise it, and (if it has an expiry)
    /// schedule its removal on `timeq`.
    pub fn add(&mut self, gline: Gline, timeq: &mut TimeQueue, sink: &dyn GlineSink) {
        sink.advertise(&gline);
        if let Some(expires_at) = gline.expires_at {
            let target = gline.target.clone();
            self.glines.insert(gline.target.clone(), gline);
            timeq.add(expires_at, TIMEQ_KIND, target.clone(), move || {
                // The caller drives actual removal via `expire_due`, since a
                // `TimeQueue` callback can't safely borrow `self` across the
                // heap's `FnOnce`; this closure only exists to keep the
                // scheduled entry observable/cancellable by `(kind, target)`.
                let _ = target;
            });
        } else {
            self.glines.insert(gline.target.clone(), gline);
        }
    }

    /// Withdraw a gline by hand: advertises the withdrawal, removes the
    /// table entry, and cancels its time-queue expiry (spec §8 invariant 6).
    pub fn remove(&mut self, target: &str, timeq: &mut TimeQueue, sink: &dyn GlineSink) -> bool {
        let removed = self.glines.remove(target).is_some();
        if removed {
            sink.withdraw(target);
            timeq.del(&DeleteMatch {
                when: None,
                kind: Some(TIMEQ_KIND),
                key: Some(target.to_string()),
            });
        }
        removed
    }

    /// Drop every gline whose expiry has passed, withdrawing each.
    pub fn expire_due(&mut self, now: Timestamp, sink: &dyn GlineSink) -> Vec<String> {
        let due: Vec<String> = self
            .glines
            .iter()
            .filter(|(_, g)| g.expires_at.is_some_and(|e| e <= now))
            .map(|(t, _)| t.clone())
            .collect();
        for target in &due {
            self.glines.remove(target);
            sink.withdraw(target);
        }
        due
    }

    /// Re-send every active gline to peers (spec: "Periodic refresh
    /// re-sends active glines to peers").
    pub fn refresh(&self, sink: &dyn GlineSink) {
        for gline in self.glines.values().filter(|g| g.enabled) {
            sink.advertise(gline);
        }
    }

    pub fn get(&self, target: &str) -> Option<&Gline> {
        self.glines.get(target)
    }

    pub fn len(&self) -> usize {
        self.glines.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gline> {
        self.glines.values()
    }
}
