//! # Protocol Configuration & Constants
//!
//! Every magic number in WEFT lives here. The overlay's whole character —
//! how fast it notices a dead peer, how skewed the neighbor graph gets,
//! how chatty the gossip phase is — falls out of a dozen constants, so
//! they are kept in one place where they can glare at each other.
//!
//! Change `ESCALATION_THRESHOLD` or the quorum arithmetic and you have a
//! different protocol, not a tuned one. The timeouts are merely operational
//! and safe to adjust.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Deadline for establishing an outbound connection. Seeds and peers treat
/// a slow connect exactly like a refused one: the frame was not delivered.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for writing a frame or reading a reply on a regular exchange.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline on the ping path. Tighter than the regular exchange timeout —
/// a ping that takes longer than this is evidence, not latency.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Maximum size of one inbound frame. A frame is a single JSON object; the
/// receiver accumulates at most this many bytes before giving up on ever
/// seeing one.
pub const MAX_FRAME_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Peer bootstrap
// ---------------------------------------------------------------------------

/// Pause between starting the listener and registering with the seeds, so
/// the listener is accepting before anyone learns our address.
pub const REGISTER_DELAY: Duration = Duration::from_secs(1);

/// Pause between registration and pulling the peer list, giving the seed
/// vote fan-out a moment to settle.
pub const FETCH_DELAY: Duration = Duration::from_secs(2);

/// Maximum number of neighbors a peer tries to acquire at bootstrap.
pub const MAX_NEIGHBOR_TARGETS: usize = 3;

/// Exponent for rank-based power-law neighbor selection. Rank `i` (0-based
/// discovery order) gets weight `(i + 1)^-ALPHA`.
pub const POWER_LAW_ALPHA: f64 = 2.0;

// ---------------------------------------------------------------------------
// Gossip
// ---------------------------------------------------------------------------

/// Number of self-originated messages each peer emits after bootstrap.
pub const GOSSIP_MESSAGE_BUDGET: u64 = 10;

/// Cadence between self-originated messages.
pub const GOSSIP_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Failure detection
// ---------------------------------------------------------------------------

/// Cadence of the neighbor ping loop.
pub const PING_INTERVAL: Duration = Duration::from_secs(3);

/// Consecutive ping failures at which a peer stops muttering to itself and
/// accuses the neighbor in public.
pub const ESCALATION_THRESHOLD: u32 = 2;

// ---------------------------------------------------------------------------
// Quorum arithmetic
// ---------------------------------------------------------------------------

/// Simple majority: `floor(n / 2) + 1`.
///
/// Used for the seed quorum Q over the configured seed list. With n = 0
/// this returns 1, which can never be met — an empty seed list cannot
/// reach consensus on anything, which is the correct degenerate behavior.
pub const fn majority(n: usize) -> usize {
    n / 2 + 1
}

/// Neighbor quorum QN: majority of the current neighbor set, or 1 when the
/// set is empty (a lonely accuser is its own quorum).
pub const fn neighbor_quorum(neighbors: usize) -> usize {
    if neighbors == 0 {
        1
    } else {
        majority(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_is_floor_half_plus_one() {
        assert_eq!(majority(1), 1);
        assert_eq!(majority(2), 2);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(4), 3);
        assert_eq!(majority(5), 3);
    }

    #[test]
    fn neighbor_quorum_of_empty_set_is_one() {
        assert_eq!(neighbor_quorum(0), 1);
        assert_eq!(neighbor_quorum(1), 1);
        assert_eq!(neighbor_quorum(3), 2);
        assert_eq!(neighbor_quorum(4), 3);
    }

    #[test]
    fn timing_constants_sanity() {
        // The ping deadline must fit inside the ping cadence, or cycles
        // start overlapping their own evidence.
        assert!(PING_TIMEOUT <= PING_INTERVAL);
        // Two strikes at one ping per interval should resolve well inside
        // the ~12 s detection window the protocol promises.
        assert!(PING_INTERVAL.as_secs() * (ESCALATION_THRESHOLD as u64 + 1) <= 12);
    }

    #[test]
    fn frame_cap_fits_a_realistic_peer_list() {
        // A [host, port] pair costs ~20 bytes of JSON; the frame cap must
        // comfortably hold a directory snapshot of a small deployment.
        assert!(MAX_FRAME_BYTES >= 100 * 20);
    }
}
