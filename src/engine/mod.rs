// src/engine/mod.rs

//! Orchestration engine for rebuildd.
//!
//! This module ties together:
//! - the [`Orchestrator`], which owns the registry and runs the
//!   registration and reconciliation workflows
//! - the main runtime event loop that reacts to:
//!   - observers connecting
//!   - registration requests
//!   - rebuild timer ticks
//!   - shutdown signals
//!
//! The workflows live in [`orchestrator`]; the async event loop in
//! [`runtime`]; the rebuild timer in [`ticker`].

use crate::registry::ProgramRecord;
use crate::transport::Reply;

/// Result of one registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The location does not exist or has no basename; nothing changed.
    NotFound,
    /// The revision query failed; nothing changed.
    RevisionUnavailable,
    /// `(name, revision)` already has a record; nothing changed.
    AlreadyRegistered(ProgramRecord),
    /// Another revision of the program is building; carries that record.
    Busy(ProgramRecord),
    Completed(ProgramRecord),
    Failed(ProgramRecord),
}

/// Result of reconciling one program location during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A build of this program is in flight.
    Skipped,
    /// The observed revision already has a record.
    UpToDate,
    /// A new revision was built; carries the terminal record.
    Built(ProgramRecord),
    /// The source vanished or left version control; carries removed records.
    Pruned(Vec<ProgramRecord>),
}

/// Events flowing into the runtime from the transport and the timer.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// An observer attached; it receives the current registry on `reply`.
    Connected { reply: Reply },
    /// An observer asked to track the program at `location`.
    RegisterRequested { location: String, reply: Reply },
    /// Time for a reconciliation sweep.
    Tick,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod orchestrator;
pub mod runtime;
pub mod ticker;

pub use orchestrator::Orchestrator;
pub use runtime::Runtime;
pub use ticker::spawn_ticker;
