//! Glob-style mask matching (`*` and `?`), case-insensitive.
//!
//! Grounded on `wildcard_match` in the teacher's `src/security/extban.rs`:
//! translate the glob into an anchored `Regex` and match against that,
//! rather than hand-rolling a backtracking matcher. Unlike the teacher's
//! version (which only escapes `.`), every other regex metacharacter is
//! escaped too, since ban masks and discriminator hostmasks routinely
//! contain `[`, `]`, `{`, `}` and similar IRC-legal nick characters.

use regex::Regex;

pub fn glob_match(pattern: &str, text: &str) -> bool {
    match compile(pattern) {
        Ok(re) => re.is_match(text),
        Err(_) => pattern.eq_ignore_ascii_case(text),
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("(?i)^{escaped}$"))
}
