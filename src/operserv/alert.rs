//! `UserAlert` (spec §3.3, §4.5 "Alerts"): named discriminator + reaction,
//! indexed three ways so the caller can cheaply find "which alerts apply to
//! this new user / nick change / join" without scanning every alert.

pub use crate::discriminator::Reaction;
use crate::discriminator::UserDiscriminator;

#[derive(Debug, Clone)]
pub struct UserAlert {
    pub name: String,
    pub owner: String,
    pub text: String,
    pub discriminator: UserDiscriminator,
    pub reaction: Reaction,
}

/// All registered alerts, plus the two narrower indices spec §3.3 calls out:
/// "alerts with a nickname mask" and "alerts with a channel or min-channels
/// criterion". Registration order is preserved for reproducible iteration.
#[derive(Debug, Default)]
pub struct AlertTable {
    order: Vec<String>,
    all: std::collections::HashMap<String, UserAlert>,
}

impl AlertTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, alert: UserAlert) {
        let name = alert.name.clone();
        if !self.all.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.all.insert(name, alert);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.all.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&UserAlert> {
        self.all.get(name)
    }

    /// Every alert, in registration order (checked on every new-user, spec
    /// §4.5).
    pub fn all(&self) -> impl Iterator<Item = &UserAlert> {
        self.order.iter().map(move |n| self.all.get(n).expect("order/all desync"))
    }

    /// Alerts with a nickname glob set: checked on nick change.
    pub fn nick_masked(&self) -> impl Iterator<Item = &UserAlert> {
        self.all().filter(|a| a.discriminator.nick.is_some())
    }

    /// Alerts with a channel or min-clones criterion: checked on join.
    pub fn channel_scoped(&self) -> impl Iterator<Item = &UserAlert> {
        self.all().filter(|a| a.discriminator.channel_hint().is_some() || a.discriminator.min_clones.is_some())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netstate::Network;

    fn alert(name: &str, discrim: &str, reaction: Reaction, net: &Network) -> UserAlert {
        UserAlert {
            name: name.to_string(),
            owner: "oper".to_string(),
            text: discrim.to_string(),
            discriminator: UserDiscriminator::parse(discrim, net).unwrap(),
            reaction,
        }
    }

    #[test]
    fn indices_route_by_criterion_shape() {
        let net = Network::new("services.example.net", 0);
        let mut table = AlertTable::new();
        table.register(alert("Z", "mask *!*@evil.example", Reaction::Gline, &net));
        table.register(alert("NickWatch", "nick bad*", Reaction::Notice, &net));
        table.register(alert("Plain", "ident x", Reaction::Notice, &net));

        assert_eq!(table.all().count(), 3);
        assert_eq!(table.nick_masked().count(), 2, "Z's mask form and NickWatch both set a nick glob");
        assert_eq!(table.channel_scoped().count(), 0);
    }

    #[test]
    fn registration_order_is_preserved() {
        let net = Network::new("services.example.net", 0);
        let mut table = AlertTable::new();
        table.register(alert("first", "ident a", Reaction::Notice, &net));
        table.register(alert("second", "ident b", Reaction::Notice, &net));
        let names: Vec<&str> = table.all().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn unregister_removes_from_every_index() {
        let net = Network::new("services.example.net", 0);
        let mut table = AlertTable::new();
        table.register(alert("Z", "nick bad*", Reaction::Gline, &net));
        assert!(table.unregister("Z"));
        assert_eq!(table.all().count(), 0);
        assert_eq!(table.nick_masked().count(), 0);
    }
}
