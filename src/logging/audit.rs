//! Audit retention: per-log-type, age/count-capped, searchable (spec §3.5,
//! §4.3 "Audit retention").

use super::severity::Severity;
use crate::clock::Timestamp;
use crate::wildcard::glob_match;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub time: Timestamp,
    pub severity: Severity,
    pub bot: String,
    pub channel: Option<String>,
    pub nick: String,
    pub account: Option<String>,
    pub hostmask: Option<String>,
    pub command: String,
    pub default_description: String,
}

impl AuditEntry {
    /// `[HH:MM:SS]`-style clock time, as the default description is
    /// timestamped (spec §4.3).
    pub fn formatted_time(&self) -> String {
        let secs_in_day = self.time.rem_euclid(86_400);
        format!(
            "{:02}:{:02}:{:02}",
            secs_in_day / 3600,
            (secs_in_day % 3600) / 60,
            secs_in_day % 60
        )
    }
}

/// A single log type's retained audit list, ordered oldest-first.
#[derive(Debug, Default)]
pub struct AuditList {
    entries: VecDeque<AuditEntry>,
    pub max_age: Option<i64>,
    pub max_count: Option<usize>,
}

impl AuditList {
    pub fn new(max_age: Option<i64>, max_count: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            max_age,
            max_count,
        }
    }

    /// Append at the tail, then trim the head until both caps are satisfied
    /// (spec §4.3, §8 invariant 4).
    pub fn push(&mut self, entry: AuditEntry, now: Timestamp) {
        self.entries.push_back(entry);
        self.trim(now);
    }

    fn trim(&mut self, now: Timestamp) {
        if let Some(max_count) = self.max_count {
            while self.entries.len() > max_count {
                self.entries.pop_front();
            }
        }
        if let Some(max_age) = self.max_age {
            while let Some(oldest) = self.entries.front() {
                if now - oldest.time > max_age {
                    self.entries.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Search discriminator over a log type's audit list.
#[derive(Debug, Clone, Default)]
pub struct LogSearchCriteria {
    pub bot: Option<String>,
    pub channel: Option<String>,
    pub nick: Option<String>,
    pub account: Option<String>,
    pub hostmask: Option<String>,
    pub command_glob: Option<String>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    /// Bitmask over severities; `None` means "any".
    pub severities: Option<Vec<Severity>>,
}

impl LogSearchCriteria {
    fn matches(&self, entry: &AuditEntry, now: Timestamp) -> bool {
        if let Some(bot) = &self.bot {
            if !entry.bot.eq_ignore_ascii_case(bot) {
                return false;
            }
        }
        if let Some(channel) = &self.channel {
            if entry.channel.as_deref().map(str::to_ascii_lowercase) != Some(channel.to_ascii_lowercase()) {
                return false;
            }
        }
        if let Some(nick) = &self.nick {
            if !entry.nick.eq_ignore_ascii_case(nick) {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if entry.account.as_deref().map(str::to_ascii_lowercase) != Some(account.to_ascii_lowercase()) {
                return false;
            }
        }
        if let Some(hostmask) = &self.hostmask {
            if entry.hostmask.as_deref() != Some(hostmask.as_str()) {
                return false;
            }
        }
        if let Some(glob) = &self.command_glob {
            if !glob_match(glob, &entry.command) {
                return false;
            }
        }
        let age = now - entry.time;
        if let Some(min_age) = self.min_age {
            if age < min_age {
                return false;
            }
        }
        if let Some(max_age) = self.max_age {
            if age > max_age {
                return false;
            }
        }
        if let Some(severities) = &self.severities {
            if !severities.contains(&entry.severity) {
                return false;
            }
        }
        true
    }
}

/// Iterate `list` and return every entry matching `criteria`, in list order.
pub fn search<'a>(list: &'a AuditList, criteria: &LogSearchCriteria, now: Timestamp) -> Vec<&'a AuditEntry> {
    list.iter().filter(|e| criteria.matches(e, now)).collect()
}
