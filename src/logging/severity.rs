//! Log severities (spec §4.3), least to greatest.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Replay = 0,
    Debug = 1,
    Command = 2,
    Info = 3,
    Override = 4,
    Staff = 5,
    Warning = 6,
    Error = 7,
    Fatal = 8,
}

pub const ALL_SEVERITIES: [Severity; 9] = [
    Severity::Replay,
    Severity::Debug,
    Severity::Command,
    Severity::Info,
    Severity::Override,
    Severity::Staff,
    Severity::Warning,
    Severity::Error,
    Severity::Fatal,
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0} is an invalid severity level")]
pub struct InvalidSeverity(pub String);

impl Severity {
    pub fn name(self) -> &'static str {
        match self {
            Severity::Replay => "replay",
            Severity::Debug => "debug",
            Severity::Command => "command",
            Severity::Info => "info",
            Severity::Override => "override",
            Severity::Staff => "staff",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    pub fn parse(name: &str) -> Result<Self, InvalidSeverity> {
        ALL_SEVERITIES
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| InvalidSeverity(name.to_string()))
    }

    pub fn is_auditable(self) -> bool {
        matches!(self, Severity::Command | Severity::Override | Severity::Staff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_spec() {
        assert!(Severity::Replay < Severity::Debug);
        assert!(Severity::Debug < Severity::Command);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn parses_by_name_case_insensitively() {
        assert_eq!(Severity::parse("Warning"), Ok(Severity::Warning));
        assert_eq!(Severity::parse("FATAL"), Ok(Severity::Fatal));
        assert!(Severity::parse("bogus").is_err());
    }

    #[test]
    fn auditable_set_matches_log_audit_contract() {
        assert!(Severity::Command.is_auditable());
        assert!(Severity::Override.is_auditable());
        assert!(Severity::Staff.is_auditable());
        assert!(!Severity::Info.is_auditable());
        assert!(!Severity::Replay.is_auditable());
    }
}
