//! saxdb: the top-level persistence registry tying every subsystem's own
//! `to_record`/`load_record` pair under one RecDB document (spec §6.1).
//!
//! Mirrors `config::Config`'s reload-hook registration pattern, but for
//! writers/readers instead of a single tree: each subsystem contributes a
//! named subtree rather than swapping the whole document, so one module's
//! persistence format never has to know about another's.
//!
//! Grounded on `original_source/saxdb.c` (the combined reader/writer
//! driving every module's own `*_saxdb_read`/`*_saxdb_write`).

use crate::recdb::{self, DbError, Record};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaxdbError {
    #[error(transparent)]
    Db(#[from] DbError),
}

type Writer<'a> = Box<dyn FnMut() -> Record + 'a>;
type Reader<'a> = Box<dyn FnMut(&Record) + 'a>;

/// Drives the combined state file. Subsystems register once; `write_all`/
/// `read_all` fan out to every registered module in registration order
/// (spec §6.1: "module order in the file is registration order, not
/// load-bearing for correctness").
///
/// Writers and readers are tracked in separate lists rather than paired
/// per module, so a caller assembling a read-only or write-only registry
/// for one real (non-`RefCell`) struct only ever takes the one borrow mode
/// it needs — see `Services::persist_to`/`restore_from`, which build two
/// short-lived registries rather than one combined one, to satisfy the
/// borrow checker when a subsystem's writer needs `&self` and its reader
/// needs `&mut self` on the same field.
#[derive(Default)]
pub struct Saxdb<'a> {
    writers: Vec<(String, Writer<'a>)>,
    readers: Vec<(String, Reader<'a>)>,
}

impl<'a> Saxdb<'a> {
    pub fn new() -> Self {
        Self { writers: Vec::new(), readers: Vec::new() }
    }

    /// Register both halves of a subsystem at once. Convenient when the
    /// subsystem is reached through shared interior mutability (e.g.
    /// `RefCell`), so both closures can safely alias it.
    pub fn register(
        &mut self,
        name: &str,
        writer: impl FnMut() -> Record + 'a,
        reader: impl FnMut(&Record) + 'a,
    ) {
        self.register_writer(name, writer);
        self.register_reader(name, reader);
    }

    pub fn register_writer(&mut self, name: &str, writer: impl FnMut() -> Record + 'a) {
        self.writers.push((name.to_string(), Box::new(writer)));
    }

    pub fn register_reader(&mut self, name: &str, reader: impl FnMut(&Record) + 'a) {
        self.readers.push((name.to_string(), Box::new(reader)));
    }

    /// Build the combined document by invoking every registered writer.
    pub fn to_record(&mut self) -> Record {
        let mut root = Record::empty_object();
        for (name, writer) in &mut self.writers {
            root.set_path(name, writer());
        }
        root
    }

    /// Apply `root` to every registered subsystem whose name is present.
    /// Spec §6.1 invariant: a subsystem absent from the document (e.g. a
    /// freshly added module, or one that persisted nothing last run) is
    /// simply never called, left at whatever state its own constructor set.
    pub fn load_record(&mut self, root: &Record) {
        for (name, reader) in &mut self.readers {
            if let Some(subtree) = root.get_path(name) {
                reader(subtree);
            }
        }
    }

    /// Build the combined document and write it atomically (spec §6.1: a
    /// `.new`-then-rename swap so a crash mid-write never corrupts the live
    /// file).
    pub fn write_all(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), SaxdbError> {
        let record = self.to_record();
        recdb::write_file_atomic(path, &record)?;
        Ok(())
    }

    /// Read the document from disk and apply it to every registered
    /// subsystem.
    pub fn read_all(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), SaxdbError> {
        let record = recdb::read_file(path)?;
        self.load_record(&record);
        Ok(())
    }
}
