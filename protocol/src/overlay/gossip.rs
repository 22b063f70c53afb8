//! # Gossip De-duplication
//!
//! Epidemic dissemination only terminates because every peer remembers
//! what it has already relayed. Each message is identified by the BLAKE3
//! digest of its text — stable across processes, so two peers always agree
//! on whether a payload is "the same message". The in-process hash the
//! overlay could have used instead is free, but it is also randomized per
//! process, which quietly breaks any cross-peer reasoning about identity.
//!
//! The cache grows monotonically. At ten messages per peer per lifetime
//! the workload cannot make it interesting; a bounded variant can be
//! dropped in here without touching any caller.

use dashmap::DashMap;

/// A gossip message's identity: the BLAKE3 digest of its payload text.
pub type Fingerprint = [u8; 32];

/// Computes the fingerprint of a payload.
pub fn fingerprint(text: &str) -> Fingerprint {
    *blake3::hash(text.as_bytes()).as_bytes()
}

/// Formats a self-originated payload: `<unix-ts>:<host>:<counter>`.
///
/// The counter makes the payload unique per originator; the host makes it
/// unique across originators even when clocks collide.
pub fn origin_payload(unix_secs: u64, host: &str, counter: u64) -> String {
    format!("{unix_secs}:{host}:{counter}")
}

/// The set of fingerprints this peer has observed. Shared by the listener
/// and the originator loop; all operations are single-key and atomic.
#[derive(Debug, Default)]
pub struct SeenMessages {
    seen: DashMap<Fingerprint, ()>,
}

impl SeenMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a payload. Returns `true` when it was fresh — i.e. the
    /// caller is the first to see it and should log and re-broadcast.
    pub fn observe(&self, text: &str) -> bool {
        self.seen.insert(fingerprint(text), ()).is_none()
    }

    /// Number of distinct messages observed.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
