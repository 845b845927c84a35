//! Timed queue: a min-heap of scheduled callbacks (spec §4.8, component G).
//!
//! Every subsystem that needs "do this later" (gline expiry, HelpServ
//! timers, mail retry) goes through one `TimeQueue`. Callbacks are
//! identified by a `kind` tag (standing in for the source's function
//! pointer) and a `key` (standing in for its opaque `data` pointer), since
//! Rust closures aren't comparable the way C function pointers are —
//! `timeq_del` matches on those two dimensions instead.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::clock::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Entry {
    when: Timestamp,
    seq: u64,
    id: TimerId,
    kind: &'static str,
    key: String,
    callback: Box<dyn FnOnce()>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want earliest `when` (and, for ties,
        // earliest inserted) to sort first, so compare in reverse via the
        // Reverse wrapper at the call site instead of here.
        (self.when, self.seq).cmp(&(other.when, other.seq))
    }
}

/// Matcher for [`TimeQueue::del`]. `None` in a field means "any" (wildcard).
#[derive(Debug, Clone, Default)]
pub struct DeleteMatch {
    pub when: Option<Timestamp>,
    pub kind: Option<&'static str>,
    pub key: Option<String>,
}

#[derive(Default)]
pub struct TimeQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    next_id: u64,
    next_seq: u64,
}

impl TimeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedule `callback` to run at `when`, tagged with `kind`/`key` for
    /// later deletion.
    pub fn add(
        &mut self,
        when: Timestamp,
        kind: &'static str,
        key: impl Into<String>,
        callback: impl FnOnce() + 'static,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            when,
            seq,
            id,
            kind,
            key: key.into(),
            callback: Box::new(callback),
        }));
        id
    }

    /// Remove every entry matching `m`, without running its callback.
    /// Returns the count removed.
    pub fn del(&mut self, m: &DeleteMatch) -> usize {
        let kept: Vec<Reverse<Entry>> = std::mem::take(&mut self.heap).into_vec();
        let mut removed = 0;
        for item in kept {
            let e = &item.0;
            let matches = m.when.is_none_or(|w| w == e.when)
                && m.kind.is_none_or(|k| k == e.kind)
                && m.key.as_deref().is_none_or(|k| k == e.key);
            if matches {
                removed += 1;
            } else {
                self.heap.push(item);
            }
        }
        removed
    }

    pub fn del_by_id(&mut self, id: TimerId) -> bool {
        let kept: Vec<Reverse<Entry>> = std::mem::take(&mut self.heap).into_vec();
        let mut found = false;
        for item in kept {
            if item.0.id == id && !found {
                found = true;
            } else {
                self.heap.push(item);
            }
        }
        found
    }

    pub fn peek_next_when(&self) -> Option<Timestamp> {
        self.heap.peek().map(|e| e.0.when)
    }

    /// Pop and run every entry with `when <= now`, in ascending time order.
    /// Tolerates callbacks that add or delete further entries: each
    /// iteration re-checks the heap head after running a callback.
    pub fn dispatch_due(&mut self, now: Timestamp) {
        loop {
            let due = match self.heap.peek() {
                Some(Reverse(e)) if e.when <= now => true,
                _ => false,
            };
            if !due {
                break;
            }
            let Reverse(entry) = self.heap.pop().expect("peeked Some above");
            (entry.callback)();
        }
    }
}
