//! # Seed Directory
//!
//! The authoritative side of the overlay: a static set of seed processes
//! that agree, by simple majority vote, on which peers exist. Nothing here
//! persists — a restarted seed comes back empty and relearns the world
//! from fresh registrations.
//!
//! ## Architecture
//!
//! ```text
//! ledger.rs   — monotonic vote bookkeeping (subject → set of voters)
//! engine.rs   — the directory state machine: vote, tally, apply, atomically
//! service.rs  — the seed process: accept loop, dispatch, vote fan-out
//! ```
//!
//! The split mirrors the rest of the codebase: engines are sans-I/O and
//! fully unit-testable; the service wires an engine to sockets and owns
//! every await point.

pub mod engine;
pub mod ledger;
pub mod service;

pub use engine::{DirectoryEngine, VoteOutcome};
pub use ledger::VoteLedger;
pub use service::SeedNode;
