//! Channel discriminator (spec §4.4): the parallel predicate for channels.

use super::{user::parse_duration, IntBound, ParseError};
use crate::clock::Timestamp;
use crate::netstate::ChanNode;
use crate::wildcard::glob_match;

/// How a timestamp bound in a channel discriminator should be read: an
/// "ago" interval relative to `now`, or an absolute Unix time (spec §4.4:
/// "interval-style ⇒ 'ago'; digits-only ⇒ absolute Unix time").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSort {
    CreatedAgo(i64),
    CreatedAbsolute(i64),
}

#[derive(Debug, Clone, Default)]
pub struct ChannelDiscriminator {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub user_count: IntBound,
    pub created: Option<ChannelSort>,
}

impl ChannelDiscriminator {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut d = ChannelDiscriminator::default();
        let mut tokens = input.split_whitespace();
        while let Some(key) = tokens.next() {
            let value = tokens.next().ok_or_else(|| ParseError::MissingValue(key.to_string()))?;
            match key {
                "name" => d.name = Some(value.to_string()),
                "topic" => d.topic = Some(value.to_string()),
                "users" | "usercount" => {
                    d.user_count = IntBound::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?
                }
                "created" => {
                    d.created = Some(if value.chars().all(|c| c.is_ascii_digit()) {
                        ChannelSort::CreatedAbsolute(value.parse().map_err(|_| ParseError::InvalidValue(key.into(), value.into()))?)
                    } else {
                        ChannelSort::CreatedAgo(
                            parse_duration(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?,
                        )
                    });
                }
                other => return Err(ParseError::UnknownKey(other.to_string())),
            }
        }
        Ok(d)
    }

    pub fn matches(&self, chan: &ChanNode, now: Timestamp) -> bool {
        if let Some(name) = &self.name {
            if !glob_match(name, &chan.name) {
                return false;
            }
        }
        if let Some(topic) = &self.topic {
            let text = chan.topic.as_ref().map(|t| t.text.as_str()).unwrap_or("");
            if !glob_match(topic, text) {
                return false;
            }
        }
        if !self.user_count.matches(chan.members.len() as i64) {
            return false;
        }
        if let Some(sort) = self.created {
            let ok = match sort {
                ChannelSort::CreatedAgo(secs) => now.saturating_sub(chan.created) <= secs,
                ChannelSort::CreatedAbsolute(ts) => chan.created == ts,
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_count_relational_bound() {
        let mut chan = ChanNode::new("#test", 0);
        chan.members.insert(crate::netstate::ModeNode::new("#test", "a", 0));
        chan.members.insert(crate::netstate::ModeNode::new("#test", "b", 0));
        let d = ChannelDiscriminator::parse("users >=2").unwrap();
        assert!(d.matches(&chan, 0));
        let d2 = ChannelDiscriminator::parse("users >2").unwrap();
        assert!(!d2.matches(&chan, 0));
    }

    #[test]
    fn absolute_vs_ago_created_forms() {
        let chan = ChanNode::new("#test", 1_000);
        let absolute = ChannelDiscriminator::parse("created 1000").unwrap();
        assert!(absolute.matches(&chan, 1_000));
        let ago = ChannelDiscriminator::parse("created 1h").unwrap();
        assert!(ago.matches(&chan, 1_500));
        assert!(!ago.matches(&chan, 10_000));
    }

    #[test]
    fn name_glob() {
        let chan = ChanNode::new("#evil-chan", 0);
        let d = ChannelDiscriminator::parse("name *evil*").unwrap();
        assert!(d.matches(&chan, 0));
    }
}
