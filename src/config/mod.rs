//! The config service: wraps RecDB with path lookup, a reload-hook registry,
//! and atomic swap-on-success semantics (spec §4.2).

use crate::recdb::{self, DbError, Record};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to read config file: {0}")]
    Read(#[from] DbError),
}

type ReloadHook = Box<dyn FnMut(&Record)>;

/// Live configuration, backed by a RecDB tree.
///
/// Hooks run in registration order (spec §4.2) and must be idempotent,
/// tolerating missing keys by falling back to documented defaults — the
/// config service itself never validates that a hook's keys exist.
pub struct Config {
    path: Option<PathBuf>,
    tree: Record,
    hooks: Vec<ReloadHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            tree: Record::empty_object(),
            hooks: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reload hook. If a tree is already loaded, the hook fires
    /// immediately so newly-registered modules see current config without
    /// waiting for the next reload (spec §4.2).
    pub fn register_reload(&mut self, mut hook: impl FnMut(&Record) + 'static) {
        if self.path.is_some() {
            hook(&self.tree);
        }
        self.hooks.push(Box::new(hook));
    }

    /// Parse `path` and, on success, atomically swap it in and fire every
    /// reload hook in registration order. On failure the active tree is left
    /// untouched and no hook observes the failed parse (spec §8 invariant 5).
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<(), ReloadError> {
        let path = path.as_ref();
        let new_tree = recdb::read_file(path)?;
        self.tree = new_tree;
        self.path = Some(path.to_path_buf());
        for hook in &mut self.hooks {
            hook(&self.tree);
        }
        Ok(())
    }

    pub fn tree(&self) -> &Record {
        &self.tree
    }

    pub fn get_str<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        self.tree.get_str(path).unwrap_or(default)
    }

    pub fn get_str_opt(&self, path: &str) -> Option<&str> {
        self.tree.get_str(path)
    }

    pub fn get_int(&self, path: &str, default: i64) -> i64 {
        self.tree
            .get_str(path)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        match self.tree.get_str(path) {
            Some("1") | Some("true") | Some("yes") | Some("on") => true,
            Some("0") | Some("false") | Some("no") | Some("off") => false,
            _ => default,
        }
    }

    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        self.tree
            .get_string_list(path)
            .map(|l| l.to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[test]
    fn hooks_fire_in_registration_order_on_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ircservices.conf");
        std::fs::write(&path, r#" "services" { "opserv" { "level" "400"; }; }; "#).unwrap();

        let mut config = Config::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let order = order.clone();
            config.register_reload(move |_| order.borrow_mut().push(1));
        }
        {
            let order = order.clone();
            config.register_reload(move |_| order.borrow_mut().push(2));
        }
        config.read(&path).unwrap();
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn late_hook_fires_immediately_if_tree_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ircservices.conf");
        std::fs::write(&path, r#" "a" "1"; "#).unwrap();
        let mut config = Config::new();
        config.read(&path).unwrap();

        let fired = Rc::new(RefCell::new(false));
        let fired2 = fired.clone();
        config.register_reload(move |_| *fired2.borrow_mut() = true);
        assert!(*fired.borrow());
    }

    #[test]
    fn failed_reload_keeps_old_tree_and_skips_hooks() {
        let dir = tempdir().unwrap();
        let good_path = dir.path().join("good.conf");
        std::fs::write(&good_path, r#" "a" "1"; "#).unwrap();
        let bad_path = dir.path().join("bad.conf");
        std::fs::write(&bad_path, "not valid {").unwrap();

        let mut config = Config::new();
        config.read(&good_path).unwrap();
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        config.register_reload(move |_| *calls2.borrow_mut() += 1);
        assert_eq!(*calls.borrow(), 1);

        let result = config.read(&bad_path);
        assert!(result.is_err());
        assert_eq!(config.get_str("a", "missing"), "1");
        assert_eq!(*calls.borrow(), 1, "hook must not observe a failed reload");
    }

    #[test]
    fn typed_accessors_fall_back_to_defaults() {
        let config = Config::new();
        assert_eq!(config.get_str("missing", "fallback"), "fallback");
        assert_eq!(config.get_int("missing", 42), 42);
        assert!(config.get_bool("missing", true));
        assert!(config.get_string_list("missing").is_empty());
    }
}
