//! User & channel discriminators (spec §4.4): compiled predicates with many
//! optional criteria, used by OperServ's alert engine and the log router's
//! audit search.
//!
//! Grounded on `original_source/opserv.c`'s `opserv_discrim_t` parser and
//! match routine, reshaped into a small recursive-descent key/value parser
//! plus a pure `matches` predicate — the "which entities to iterate"
//! strategy described by spec §4.4's "Evaluation ordering" is left to the
//! caller (OperServ owns the HostInfo table this needs), so this module
//! only exposes the hints (`channel`, `full_ip`) a caller uses to pick its
//! iteration source.

mod channel;
mod user;

pub use channel::{ChannelDiscriminator, ChannelSort};
pub use user::{parse_duration, ChannelMembership, Reaction, UserDiscriminator};

use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown discriminator key: {0}")]
    UnknownKey(String),
    #[error("missing value for key: {0}")]
    MissingValue(String),
    #[error("invalid value '{1}' for key {0}")]
    InvalidValue(String, String),
    #[error("'account' implies 'authed yes' and conflicts with 'authed no'")]
    AccountAuthedConflict,
    #[error("channel {0} does not currently exist")]
    UnknownChannel(String),
}

/// A relational bound: `<`, `<=`, `>`, `>=`, `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    pub fn parse_prefixed(value: &str) -> (Comparison, &str) {
        if let Some(rest) = value.strip_prefix(">=") {
            (Comparison::Ge, rest)
        } else if let Some(rest) = value.strip_prefix("<=") {
            (Comparison::Le, rest)
        } else if let Some(rest) = value.strip_prefix('>') {
            (Comparison::Gt, rest)
        } else if let Some(rest) = value.strip_prefix('<') {
            (Comparison::Lt, rest)
        } else if let Some(rest) = value.strip_prefix('=') {
            (Comparison::Eq, rest)
        } else {
            (Comparison::Eq, value)
        }
    }

    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Eq => lhs == rhs,
        }
    }
}

/// An optional relational bound on an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntBound(pub Option<(Comparison, i64)>);

impl IntBound {
    pub fn matches(self, value: i64) -> bool {
        match self.0 {
            None => true,
            Some((cmp, bound)) => cmp.holds(value, bound),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (cmp, rest) = Comparison::parse_prefixed(raw);
        rest.parse::<i64>().ok().map(|n| IntBound(Some((cmp, n))))
    }
}

/// Tri-state yes/no/unset, used for `authed` and the info-leading-space
/// criterion (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tri {
    #[default]
    Unset,
    Yes,
    No,
}

impl Tri {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "yes" | "1" | "true" => Some(Tri::Yes),
            "no" | "0" | "false" => Some(Tri::No),
            _ => None,
        }
    }

    /// `Unset` always matches; otherwise the tri-state must equal `value`.
    pub fn matches(self, value: bool) -> bool {
        match self {
            Tri::Unset => true,
            Tri::Yes => value,
            Tri::No => !value,
        }
    }
}

/// An IP-prefix criterion: match the first `bits` bits of `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub bits: u8,
}

impl IpPrefix {
    pub fn matches(self, other: IpAddr) -> bool {
        match (self.addr, other) {
            (IpAddr::V4(a), IpAddr::V4(b)) => {
                let bits = self.bits.min(32);
                let mask = if bits == 0 { 0u32 } else { u32::MAX << (32 - bits) };
                (u32::from(a) & mask) == (u32::from(b) & mask)
            }
            (IpAddr::V6(a), IpAddr::V6(b)) => {
                let bits = self.bits.min(128) as u32;
                let a = u128::from(a);
                let b = u128::from(b);
                let mask = if bits == 0 { 0u128 } else { u128::MAX << (128 - bits) };
                (a & mask) == (b & mask)
            }
            _ => false,
        }
    }

    /// Whether `bits` covers the entire address (so evaluation can prefer
    /// iterating a single HostInfo entry rather than the whole network,
    /// per spec §4.4 "Evaluation ordering").
    pub fn is_full(self) -> bool {
        match self.addr {
            IpAddr::V4(_) => self.bits >= 32,
            IpAddr::V6(_) => self.bits >= 128,
        }
    }
}

/// Truncate a hostname to its last `depth` dot-separated labels, for
/// domain-aggregated alert reporting (spec §4.4).
pub fn domain_of(host: &str, depth: u8) -> String {
    let labels: Vec<&str> = host.rsplit('.').take(depth as usize).collect();
    labels.into_iter().rev().collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_bound_relational_parsing() {
        assert!(IntBound::parse(">=5").unwrap().matches(5));
        assert!(!IntBound::parse(">5").unwrap().matches(5));
        assert!(IntBound::parse("<=5").unwrap().matches(5));
        assert!(IntBound::parse("<5").unwrap().matches(4));
        assert!(IntBound::parse("=5").unwrap().matches(5));
        assert!(IntBound::default().matches(12345));
    }

    #[test]
    fn tri_state_unset_matches_everything() {
        assert!(Tri::Unset.matches(true));
        assert!(Tri::Unset.matches(false));
        assert!(Tri::Yes.matches(true));
        assert!(!Tri::Yes.matches(false));
        assert!(Tri::No.matches(false));
        assert!(!Tri::No.matches(true));
    }

    #[test]
    fn ipv4_prefix_matching() {
        let prefix = IpPrefix {
            addr: "203.0.113.0".parse().unwrap(),
            bits: 24,
        };
        assert!(prefix.matches("203.0.113.9".parse().unwrap()));
        assert!(!prefix.matches("203.0.114.9".parse().unwrap()));
        assert!(!prefix.is_full());
        let full = IpPrefix {
            addr: "203.0.113.9".parse().unwrap(),
            bits: 32,
        };
        assert!(full.is_full());
    }

    #[test]
    fn domain_truncation_keeps_last_n_labels() {
        assert_eq!(domain_of("a.b.evil.example.com", 2), "example.com");
        assert_eq!(domain_of("example.com", 5), "example.com");
    }
}
