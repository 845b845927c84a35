//! Log destinations (spec §4.3, §9 "manual polymorphism").
//!
//! The source models destinations with a vtable of
//! open/close/reopen/audit/replay/module functions; here that collapses to
//! one `Destination` trait with a single `handle_event` entry point plus
//! `reopen`, matching the design note's "sealed set of destination variants"
//! while staying open to new kinds being registered at startup.

use super::audit::AuditEntry;
use super::severity::Severity;
use std::cell::RefCell;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

/// What's being routed to a destination.
#[derive(Debug, Clone)]
pub enum LogEvent<'a> {
    /// A retained, searchable audit entry (command/override/staff only).
    Audit(&'a AuditEntry),
    /// A raw protocol line, replayed for debugging. Never routed to `irc`.
    Replay { is_write: bool, line: &'a str },
    /// A one-off formatted line with no retention.
    Module { message: &'a str },
}

pub trait Destination: fmt::Debug {
    /// Route one event at the given severity.
    fn handle_event(&self, log_type: &str, severity: Severity, event: &LogEvent<'_>);

    /// Close and reopen (e.g. for SIGHUP-driven log rotation). No-op for
    /// destinations without an underlying file descriptor.
    fn reopen(&self) {}
}

/// `irc:TARGET` — send formatted messages to a channel or user.
///
/// Actual delivery is delegated to an `IrcSink` collaborator (out of scope:
/// spec §1 treats the wire protocol as an external collaborator); this
/// destination only formats and routes.
pub trait IrcSink {
    fn send_line(&self, target: &str, line: &str);
}

pub struct IrcDestination {
    pub target: String,
    pub sink: Rc<dyn IrcSink>,
}

impl fmt::Debug for IrcDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcDestination").field("target", &self.target).finish()
    }
}

impl Destination for IrcDestination {
    fn handle_event(&self, log_type: &str, severity: Severity, event: &LogEvent<'_>) {
        match event {
            LogEvent::Replay { .. } => {} // replay events are never routed to irc
            LogEvent::Audit(entry) => {
                self.sink.send_line(&self.target, &entry.default_description);
            }
            LogEvent::Module { message } => {
                self.sink
                    .send_line(&self.target, &format!("[{log_type}/{}] {message}", severity.name()));
            }
        }
    }
}

/// `std:out|err` — write to a standard descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Out,
    Err,
}

#[derive(Debug)]
pub struct StdDestination {
    pub stream: StdStream,
}

impl Destination for StdDestination {
    fn handle_event(&self, log_type: &str, severity: Severity, event: &LogEvent<'_>) {
        let line = format_event(log_type, severity, event);
        match self.stream {
            StdStream::Out => println!("{line}"),
            StdStream::Err => eprintln!("{line}"),
        }
    }
    // reopen is a no-op for standard descriptors (spec §4.3).
}

/// `file:PATH` — append line-oriented entries, flushing on every write so
/// audit ordering survives a process crash (spec §5 "Log file I/O").
pub struct FileDestination {
    path: PathBuf,
    file: RefCell<File>,
}

impl FileDestination {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: RefCell::new(file),
        })
    }
}

impl fmt::Debug for FileDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDestination").field("path", &self.path).finish()
    }
}

impl Destination for FileDestination {
    fn handle_event(&self, log_type: &str, severity: Severity, event: &LogEvent<'_>) {
        let line = format_event(log_type, severity, event);
        let mut file = self.file.borrow_mut();
        let _ = writeln!(file, "{line}");
        let _ = file.flush();
    }

    fn reopen(&self) {
        if let Ok(new_file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            *self.file.borrow_mut() = new_file;
        }
    }
}

fn format_event(log_type: &str, severity: Severity, event: &LogEvent<'_>) -> String {
    match event {
        LogEvent::Audit(entry) => format!(
            "[{}] {}.{} {}",
            entry.formatted_time(),
            log_type,
            severity.name(),
            entry.default_description
        ),
        LogEvent::Replay { is_write, line } => {
            let dir = if *is_write { "->" } else { "<-" };
            format!("{log_type}.{} {dir} {line}", severity.name())
        }
        LogEvent::Module { message } => format!("{log_type}.{} {message}", severity.name()),
    }
}
