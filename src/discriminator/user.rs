//! User discriminator: the compiled predicate OperServ alerts and commands
//! like `opserv trace`/`opserv alert` use to describe "which users" (spec
//! §4.4).

use super::{domain_of, IntBound, IpPrefix, ParseError, Tri};
use crate::clock::Timestamp;
use crate::netstate::{ChanNode, Network, UserNode};
use crate::wildcard::glob_match;

/// An alert's reaction on match, inlined into the discriminator text itself
/// (spec §4.5 scenario: `"... duration 2h reaction gline"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Notice,
    Kill,
    Gline,
}

impl Reaction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "notice" => Some(Reaction::Notice),
            "kill" => Some(Reaction::Kill),
            "gline" => Some(Reaction::Gline),
            _ => None,
        }
    }
}

/// A compiled user discriminator. Every field left `None`/`Unset` matches
/// everything (spec §4.4: "an unset field matches all").
#[derive(Debug, Clone, Default)]
pub struct UserDiscriminator {
    pub nick: Option<String>,
    pub ident: Option<String>,
    pub host: Option<String>,
    pub info: Option<String>,
    pub server: Option<String>,
    pub account: Option<String>,
    pub ip: Option<IpPrefix>,
    pub age: IntBound,
    pub nickage: IntBound,
    pub access: IntBound,
    /// Channel the subject must be on, plus required/forbidden member
    /// modes expressed as `+o`/`-o` style characters already parsed out.
    pub channel: Option<ChannelMembership>,
    pub channel_count: IntBound,
    pub min_clones: Option<usize>,
    pub authed: Tri,
    pub info_leading_space: Tri,
    pub match_opers: bool,
    pub domain_depth: Option<u8>,
    pub duration: Option<i64>,
    pub reason: Option<String>,
    pub log_this_match: bool,
    pub limit: Option<usize>,
    pub reaction: Option<Reaction>,
}

#[derive(Debug, Clone)]
pub struct ChannelMembership {
    pub name: String,
    pub require_op: bool,
    pub require_voice: bool,
    pub forbid_op: bool,
    pub forbid_voice: bool,
}

impl UserDiscriminator {
    /// Parse a space-separated `key value` discriminator string. `network`
    /// is consulted only to validate that a `channel` criterion names a
    /// channel that currently exists (spec §4.4).
    pub fn parse(input: &str, network: &Network) -> Result<Self, ParseError> {
        let mut d = UserDiscriminator::default();
        let mut tokens = input.split_whitespace().peekable();
        let mut authed_explicit: Option<bool> = None;

        while let Some(key) = tokens.next() {
            let value = tokens.next().ok_or_else(|| ParseError::MissingValue(key.to_string()))?;
            match key {
                "mask" => {
                    let (nick, rest) = value.split_once('!').ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?;
                    let (user, host) = rest.split_once('@').ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?;
                    d.nick = non_star(nick);
                    d.ident = non_star(user);
                    d.host = non_star(host);
                }
                "nick" => d.nick = non_star(value),
                "ident" | "user" => d.ident = non_star(value),
                "host" => d.host = non_star(value),
                "info" | "gecos" => d.info = non_star(value),
                "server" => d.server = non_star(value),
                "account" => {
                    if authed_explicit == Some(false) {
                        return Err(ParseError::AccountAuthedConflict);
                    }
                    d.account = non_star(value);
                    d.authed = Tri::Yes;
                    authed_explicit = Some(true);
                }
                "ip" => {
                    d.ip = Some(parse_ip_prefix(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?);
                }
                "age" => d.age = IntBound::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?,
                "nickage" => {
                    d.nickage = IntBound::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?
                }
                "access" => {
                    d.access = IntBound::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?
                }
                "channels" => {
                    d.channel_count =
                        IntBound::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?
                }
                "clones" | "min-clones" => {
                    d.min_clones = Some(value.parse().map_err(|_| ParseError::InvalidValue(key.into(), value.into()))?)
                }
                "authed" => {
                    let want = Tri::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?;
                    if authed_explicit == Some(true) && want == Tri::No {
                        return Err(ParseError::AccountAuthedConflict);
                    }
                    d.authed = want;
                    authed_explicit = Some(matches!(want, Tri::Yes));
                }
                "channel" => {
                    let (flags, name) = split_channel_flags(value);
                    if network.channel(name).is_none() {
                        return Err(ParseError::UnknownChannel(name.to_string()));
                    }
                    d.channel = Some(ChannelMembership {
                        name: name.to_string(),
                        require_op: flags.contains('+') && flags.contains('o'),
                        require_voice: flags.contains('+') && flags.contains('v'),
                        forbid_op: flags.contains('-') && flags.contains('o'),
                        forbid_voice: flags.contains('-') && flags.contains('v'),
                    });
                }
                "info-leading-space" => {
                    d.info_leading_space =
                        Tri::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?
                }
                "match-opers" => d.match_opers = value == "yes" || value == "1",
                "domain-depth" => {
                    d.domain_depth = Some(value.parse().map_err(|_| ParseError::InvalidValue(key.into(), value.into()))?)
                }
                "duration" => d.duration = Some(parse_duration(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?),
                "reason" => d.reason = Some(value.to_string()),
                "log" => d.log_this_match = value == "yes" || value == "1",
                "limit" => d.limit = Some(value.parse().map_err(|_| ParseError::InvalidValue(key.into(), value.into()))?),
                "reaction" => {
                    d.reaction = Some(Reaction::parse(value).ok_or_else(|| ParseError::InvalidValue(key.into(), value.into()))?)
                }
                other => return Err(ParseError::UnknownKey(other.to_string())),
            }
        }
        Ok(d)
    }

    /// Whether `user` matches every criterion. `now` drives `age`/`nickage`;
    /// `network` resolves the channel-membership criterion.
    pub fn matches(&self, user: &UserNode, network: &Network, now: Timestamp, opserv_level: i64, clone_count: usize) -> bool {
        if let Some(nick) = &self.nick {
            if !glob_match(nick, &user.nick) {
                return false;
            }
        }
        if let Some(ident) = &self.ident {
            if !glob_match(ident, &user.ident) {
                return false;
            }
        }
        if let Some(host) = &self.host {
            if !glob_match(host, &user.hostname) {
                return false;
            }
        }
        if let Some(info) = &self.info {
            if !glob_match(info, &user.info) {
                return false;
            }
        }
        if let Some(server) = &self.server {
            if !glob_match(server, &user.uplink) {
                return false;
            }
        }
        if let Some(account) = &self.account {
            match &user.handle {
                Some(h) if glob_match(account, h) => {}
                _ => return false,
            }
        }
        if !self.authed.matches(user.handle.is_some()) {
            return false;
        }
        if let Some(ip) = self.ip {
            match user.ip {
                Some(addr) if ip.matches(addr) => {}
                _ => return false,
            }
        }
        if !self.age.matches(now.saturating_sub(user.timestamp)) {
            return false;
        }
        if !self.nickage.matches(now.saturating_sub(user.timestamp)) {
            return false;
        }
        if !self.access.matches(opserv_level) {
            return false;
        }
        if !self.channel_count.matches(user.channels.len() as i64) {
            return false;
        }
        if let Some(min) = self.min_clones {
            if clone_count < min {
                return false;
            }
        }
        if !self.info_leading_space.matches(user.info.starts_with(' ')) {
            return false;
        }
        if !self.match_opers && user.modes.oper {
            return false;
        }
        if let Some(membership) = &self.channel {
            if !channel_membership_matches(membership, user, network) {
                return false;
            }
        }
        true
    }

    /// Hint for the caller's iteration strategy (spec §4.4 "Evaluation
    /// ordering"): prefer the named channel's member list.
    pub fn channel_hint(&self) -> Option<&str> {
        self.channel.as_ref().map(|c| c.name.as_str())
    }

    /// Hint for the caller: the IP is fully specified, so a HostInfo lookup
    /// beats scanning every client.
    pub fn full_ip_hint(&self) -> Option<IpPrefix> {
        self.ip.filter(|ip| ip.is_full())
    }

    pub fn aggregate_domain(&self, host: &str) -> Option<String> {
        self.domain_depth.map(|depth| domain_of(host, depth))
    }
}

fn channel_membership_matches(m: &ChannelMembership, user: &UserNode, network: &Network) -> bool {
    let chan_key = ChanNode::key(&m.name);
    if !user.channels.contains(&chan_key) {
        return false;
    }
    let Some(chan) = network.channel(&m.name) else {
        return false;
    };
    let Some(node) = chan.members.get(&UserNode::key(&user.nick)) else {
        return false;
    };
    if m.require_op && !node.op {
        return false;
    }
    if m.require_voice && !node.voice {
        return false;
    }
    if m.forbid_op && node.op {
        return false;
    }
    if m.forbid_voice && node.voice {
        return false;
    }
    true
}

fn non_star(value: &str) -> Option<String> {
    if value == "*" {
        None
    } else {
        Some(value.to_string())
    }
}

fn split_channel_flags(value: &str) -> (&str, &str) {
    let flags_len = value.chars().take_while(|c| *c == '+' || *c == '-' || *c == '@').count();
    value.split_at(flags_len)
}

fn parse_ip_prefix(value: &str) -> Option<IpPrefix> {
    if let Some((addr, bits)) = value.split_once('/') {
        Some(IpPrefix {
            addr: addr.parse().ok()?,
            bits: bits.parse().ok()?,
        })
    } else {
        let addr = value.parse().ok()?;
        let bits = match addr {
            std::net::IpAddr::V4(_) => 32,
            std::net::IpAddr::V6(_) => 128,
        };
        Some(IpPrefix { addr, bits })
    }
}

/// Parse a duration like `2h`, `90m`, `1d`, or a bare count of seconds.
pub fn parse_duration(value: &str) -> Option<i64> {
    if let Ok(secs) = value.parse::<i64>() {
        return Some(secs);
    }
    let (num, unit) = value.split_at(value.len() - 1);
    let n: i64 = num.parse().ok()?;
    let mult = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return None,
    };
    Some(n * mult)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netstate::Network;

    fn net() -> Network {
        Network::new("services.example.net", 1_000)
    }

    #[test]
    fn mask_form_decomposes_into_three_globs() {
        let n = net();
        let d = UserDiscriminator::parse("mask *!*@evil.example", &n).unwrap();
        assert_eq!(d.nick, None);
        assert_eq!(d.ident, None);
        assert_eq!(d.host.as_deref(), Some("evil.example"));
    }

    #[test]
    fn account_implies_authed_yes() {
        let n = net();
        let d = UserDiscriminator::parse("account alice", &n).unwrap();
        assert_eq!(d.authed, Tri::Yes);
    }

    #[test]
    fn account_conflicts_with_explicit_authed_no() {
        let n = net();
        assert!(UserDiscriminator::parse("account alice authed no", &n).is_err());
        assert!(UserDiscriminator::parse("authed no account alice", &n).is_err());
    }

    #[test]
    fn channel_criterion_requires_existing_channel() {
        let n = net();
        assert_eq!(
            UserDiscriminator::parse("channel #nope", &n),
            Err(ParseError::UnknownChannel("#nope".to_string()))
        );
    }

    #[test]
    fn alert_scenario_gline_unauthed_from_subnet() {
        let mut n = net();
        n.new_user("bob", "x", "evil.example", "services.example.net", 1_000).unwrap();
        n.user_mut("bob").unwrap().ip = Some("203.0.113.9".parse().unwrap());

        let d = UserDiscriminator::parse("mask *!*@evil.example ip 203.0.113.0/24 authed no duration 2h", &n).unwrap();
        assert_eq!(d.duration, Some(7_200));
        let bob = n.user("bob").unwrap();
        assert!(d.matches(bob, &n, 1_000, 0, 1));

        n.user_mut("bob").unwrap().handle = Some("bob_account".to_string());
        let bob = n.user("bob").unwrap();
        assert!(!d.matches(bob, &n, 1_000, 0, 1), "authenticated connection must not match authed=no");
    }

    #[test]
    fn opers_excluded_unless_match_opers_set() {
        let mut n = net();
        n.new_user("op", "x", "host", "services.example.net", 1_000).unwrap();
        n.user_mut("op").unwrap().modes.oper = true;
        let d = UserDiscriminator::parse("nick *", &n).unwrap();
        assert!(!d.matches(n.user("op").unwrap(), &n, 1_000, 0, 1));
        let d2 = UserDiscriminator::parse("nick * match-opers yes", &n).unwrap();
        assert!(d2.matches(n.user("op").unwrap(), &n, 1_000, 0, 1));
    }

    #[test]
    fn reaction_is_parsed_inline_with_the_rest_of_the_discriminator() {
        let n = net();
        let d = UserDiscriminator::parse("mask *!*@evil.example ip 203.0.113.0/24 authed no duration 2h reaction gline", &n).unwrap();
        assert_eq!(d.reaction, Some(Reaction::Gline));
        assert_eq!(d.duration, Some(7_200));
    }

    #[test]
    fn duration_suffix_parsing() {
        assert_eq!(parse_duration("2h"), Some(7_200));
        assert_eq!(parse_duration("90m"), Some(5_400));
        assert_eq!(parse_duration("1d"), Some(86_400));
        assert_eq!(parse_duration("30"), Some(30));
        assert_eq!(parse_duration("bogus"), None);
    }
}
