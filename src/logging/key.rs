//! Log key parsing: `LOGSET.SEVSET` (spec §4.3).
//!
//! `LOGSET` is a comma list of log-type names (or the literal `*`, which
//! names the default bucket — not a wildcard expansion over every other
//! type). `SEVSET` is a comma list whose members are each an exact severity
//! name, the literal `*` (every severity except `replay`), or a relational
//! form (`<sev`, `<=sev`, `>sev`, `>=sev`).

use super::severity::{ALL_SEVERITIES, Severity};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("log key '{0}' is missing a '.'-separated severity set")]
    MissingSeveritySet(String),
    #[error("{0} is an invalid severity level")]
    InvalidSeverity(String),
}

/// A parsed `LOGSET.SEVSET` key, ready to expand into a Cartesian product.
#[derive(Debug, Clone)]
pub struct LogKey {
    pub types: Vec<String>,
    pub severities: BTreeSet<Severity>,
}

impl LogKey {
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let Some(dot) = key.find('.') else {
            return Err(KeyError::MissingSeveritySet(key.to_string()));
        };
        let (logset, sevset) = key.split_at(dot);
        let sevset = &sevset[1..];

        let types = logset.split(',').map(|s| s.trim().to_string()).collect();
        let severities = parse_sevset(sevset)?;
        Ok(LogKey { types, severities })
    }

    /// Expand into the literal (type, severity) slots this key assigns.
    pub fn expand(&self) -> Vec<(String, Severity)> {
        let mut out = Vec::new();
        for t in &self.types {
            for &sev in &self.severities {
                out.push((t.clone(), sev));
            }
        }
        out
    }
}

fn parse_sevset(sevset: &str) -> Result<BTreeSet<Severity>, KeyError> {
    let mut out = BTreeSet::new();
    for token in sevset.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if token == "*" {
            out.extend(ALL_SEVERITIES.iter().copied().filter(|&s| s != Severity::Replay));
            continue;
        }
        if let Some(rest) = token.strip_prefix(">=") {
            let bound = Severity::parse(rest).map_err(|e| KeyError::InvalidSeverity(e.0))?;
            out.extend(ALL_SEVERITIES.iter().copied().filter(|&s| s >= bound));
        } else if let Some(rest) = token.strip_prefix("<=") {
            let bound = Severity::parse(rest).map_err(|e| KeyError::InvalidSeverity(e.0))?;
            out.extend(ALL_SEVERITIES.iter().copied().filter(|&s| s <= bound));
        } else if let Some(rest) = token.strip_prefix('>') {
            let bound = Severity::parse(rest).map_err(|e| KeyError::InvalidSeverity(e.0))?;
            out.extend(ALL_SEVERITIES.iter().copied().filter(|&s| s > bound));
        } else if let Some(rest) = token.strip_prefix('<') {
            let bound = Severity::parse(rest).map_err(|e| KeyError::InvalidSeverity(e.0))?;
            out.extend(ALL_SEVERITIES.iter().copied().filter(|&s| s < bound));
        } else {
            out.insert(Severity::parse(token).map_err(|e| KeyError::InvalidSeverity(e.0))?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_logset_and_sevset() {
        let k = LogKey::parse("opserv,helpserv.warning").unwrap();
        assert_eq!(k.types, vec!["opserv", "helpserv"]);
        assert_eq!(k.severities, BTreeSet::from([Severity::Warning]));
    }

    #[test]
    fn star_severity_excludes_replay() {
        let k = LogKey::parse("main.*").unwrap();
        assert!(!k.severities.contains(&Severity::Replay));
        assert!(k.severities.contains(&Severity::Fatal));
    }

    #[test]
    fn star_logset_names_the_default_bucket_literally() {
        let k = LogKey::parse("*.warning").unwrap();
        assert_eq!(k.types, vec!["*"]);
    }

    #[test]
    fn range_forms_are_inclusive_or_exclusive_correctly() {
        let k = LogKey::parse("main.>=warning").unwrap();
        assert!(k.severities.contains(&Severity::Warning));
        assert!(k.severities.contains(&Severity::Fatal));
        assert!(!k.severities.contains(&Severity::Info));

        let k = LogKey::parse("main.<warning").unwrap();
        assert!(!k.severities.contains(&Severity::Warning));
        assert!(k.severities.contains(&Severity::Info));

        let k = LogKey::parse("main.<=warning").unwrap();
        assert!(k.severities.contains(&Severity::Warning));
        assert!(!k.severities.contains(&Severity::Error));

        let k = LogKey::parse("main.>error").unwrap();
        assert!(k.severities.contains(&Severity::Fatal));
        assert!(!k.severities.contains(&Severity::Error));
    }

    #[test]
    fn comma_list_of_exact_severities() {
        let k = LogKey::parse("main.warning,error,fatal").unwrap();
        assert_eq!(
            k.severities,
            BTreeSet::from([Severity::Warning, Severity::Error, Severity::Fatal])
        );
    }

    #[test]
    fn cartesian_expansion_covers_every_pair() {
        let k = LogKey::parse("opserv,helpserv.warning,error").unwrap();
        let pairs = k.expand();
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn missing_dot_is_an_error() {
        assert!(LogKey::parse("opserv").is_err());
    }

    #[test]
    fn unknown_severity_is_an_error() {
        assert!(LogKey::parse("main.bogus").is_err());
    }
}
