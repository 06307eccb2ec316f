//! Crate-wide error kinds, split by subsystem the way `src/utils/core/error.rs`
//! and `src/utils/core/error_types.rs` split `CoreError`/`EngineError`.
//!
//! Recoverable failures use these `thiserror` enums; bugs (broken invariants)
//! go through [`crate::fatal`] instead and never produce a `Result`.

use crate::util::uid::Uid;
use std::panic::Location;
use thiserror::Error;

/// Errors raised by the service locator (component B).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service {uid} requested but no factory registered (at {location})")]
    UnresolvedDependency { uid: Uid, location: &'static Location<'static> },

    #[error("circular dependency while starting {uid}: {chain}")]
    CircularDependency { uid: Uid, chain: String },

    #[error("service {uid} already has a registered factory")]
    AlreadyRegistered { uid: Uid },

    #[error("factory for service {uid} panicked: {message}")]
    FactoryPanicked { uid: Uid, message: String },
}

/// Errors raised by the gfx/render subsystem (components L-O).
#[derive(Debug, Error)]
pub enum GfxError {
    #[error("required GPU capability missing: {0}")]
    CapabilityMissing(String),

    #[error("external library call failed: {0}")]
    ExternalLibFailure(String),

    #[error("data too large: {what} ({actual} exceeds limit {limit})")]
    DataTooLarge { what: &'static str, actual: usize, limit: usize },
}

/// Errors raised by `os::file` and `svc::async_file_io` (component F).
#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Os(#[from] std::io::Error),

    #[error("advisory lock unavailable for {path}")]
    LockUnavailable { path: String },

    #[error("I/O worker swallowed a non-I/O failure: {0}")]
    Unknown(String),
}

/// Errors raised by task execution (component D). Mirrors §7's distinction
/// between a recoverable task failure (caller awaits a `Result`) and a bug
/// (panics propagate through `std::panic`, not through this type).
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Errors raised by message send/request (component E).
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("recipient {0} is not registered")]
    RecipientAbsent(Uid),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("request was dropped before completion")]
    Dropped,
}

/// Errors raised by `config::main_config` while loading or saving the
/// on-disk TOML config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Logs at error level and aborts the process. Use only for broken invariants
/// that the original C++ engine treats as fatal bugs (double free of a live
/// slab, refcount overflow, version monotonicity violation).
#[track_caller]
pub fn fatal(message: impl std::fmt::Display) -> ! {
    let location = Location::caller();
    log::error!("[fatal @ {location}] {message}");
    std::process::abort();
}
