//! # Peer Overlay
//!
//! The participant side: peers register with a seed majority, pull the
//! directory, wire themselves into a power-law-biased neighbor graph, and
//! keep the graph honest by pinging, accusing, and reporting.
//!
//! ## Architecture
//!
//! ```text
//! selection.rs — rank-weighted power-law sampling over discovery order
//! gossip.rs    — seen-fingerprint cache and message payload formatting
//! failure.rs   — per-suspect strike/accuser state machine
//! peer.rs      — the peer process: bootstrap, listener, ping + gossip loops
//! ```
//!
//! Same rule as the directory side: the engines in `selection`, `gossip`,
//! and `failure` never touch a socket, and `peer.rs` never holds a lock
//! across an await.

pub mod failure;
pub mod gossip;
pub mod peer;
pub mod selection;

pub use failure::{FailureDetector, SuspectPhase};
pub use gossip::SeenMessages;
pub use peer::PeerNode;
