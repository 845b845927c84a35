//! Unified error hierarchy for ircsvc-core (SPEC_FULL.md §A "Ambient stack").
//!
//! Each module owns its own `thiserror`-derived error enum for the failures
//! it can produce; this type only composes them so callers threading work
//! across subsystems (e.g. `Services::restore_from`, a command handler that
//! touches recdb, netstate, and operserv in one go) can use `?` without
//! hand-rolling a conversion at every boundary. Nothing here is shown to an
//! end user directly (spec §7 "no raw internal identifiers are shown") —
//! callers still render a message-id from their own match on the variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("recdb: {0}")]
    Recdb(#[from] crate::recdb::DbError),

    #[error("config: {0}")]
    Config(#[from] crate::config::ReloadError),

    #[error("saxdb: {0}")]
    Saxdb(#[from] crate::saxdb::SaxdbError),

    #[error("network state: {0}")]
    State(#[from] crate::netstate::StateError),

    #[error("helpserv: {0}")]
    Request(#[from] crate::helpserv::RequestError),

    #[error("discriminator: {0}")]
    Discriminator(#[from] crate::discriminator::ParseError),

    #[error("log key: {0}")]
    LogKey(#[from] crate::logging::KeyError),

    #[error("mail queue: {0}")]
    Mail(#[from] crate::mailq::MailError),
}
