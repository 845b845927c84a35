//! RecDB: the nested record tree format shared by config and persistence
//! (spec §3.1, §4.1, component A).

mod parser;
mod record;
mod writer;

pub use parser::{ParseError, parse};
pub use record::{OrderedObject, Record};
pub use writer::write;

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Read a RecDB document from disk.
pub fn read_file(path: impl AsRef<Path>) -> Result<Record, DbError> {
    let text = fs::read_to_string(path)?;
    Ok(parse(&text)?)
}

/// Write `record` to `path` atomically: write to a `.new` sibling, then
/// rename over the destination (spec §6.1). On failure the original file is
/// left untouched.
pub fn write_file_atomic(path: impl AsRef<Path>, record: &Record) -> Result<(), DbError> {
    let path = path.as_ref();
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.new", ext.to_string_lossy()),
        None => "new".to_string(),
    });
    fs::write(&tmp_path, writer::write(record))?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// `database_get_data(path, expected_type)` from spec §3.1: returns the
/// inner value only if the leaf at `path` is the expected kind.
pub enum Expected {
    QString,
    StringList,
    Object,
}

pub fn database_get_data<'a>(root: &'a Record, path: &str, expected: Expected) -> Option<&'a Record> {
    let node = root.get_path(path)?;
    let matches = matches!(
        (node, &expected),
        (Record::QString(_), Expected::QString)
            | (Record::StringList(_), Expected::StringList)
            | (Record::Object(_), Expected::Object)
    );
    matches.then_some(node)
}
