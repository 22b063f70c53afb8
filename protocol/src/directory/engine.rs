//! # Directory Engine
//!
//! The seed's state machine: the live peer set plus the two vote ledgers,
//! mutated only through methods that insert a vote, re-check the tally,
//! and apply the transition as one step. The caller wraps the engine in a
//! single mutex; because insert-tally-apply is one `&mut self` call, two
//! racing votes can never double-apply a transition or both miss it.
//!
//! The engine does no I/O and knows nothing about sockets — it reports
//! whether a transition applied *now*, and the service decides what to
//! fan out and log.

use std::collections::HashSet;

use crate::directory::ledger::VoteLedger;
use crate::endpoint::Endpoint;

/// The result of merging one vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Tally for the subject after the merge (before any clear-on-apply).
    pub votes: usize,
    /// The quorum the tally is measured against.
    pub quorum: usize,
    /// Whether this particular vote crossed the threshold and changed the
    /// directory. At most one merge per transition ever reports `true`.
    pub applied: bool,
}

/// Quorum-replicated peer directory state for a single seed.
#[derive(Debug)]
pub struct DirectoryEngine {
    me: Endpoint,
    quorum: usize,
    peers: HashSet<Endpoint>,
    register_votes: VoteLedger,
    dead_votes: VoteLedger,
}

impl DirectoryEngine {
    /// Creates an empty directory with the given seed quorum.
    pub fn new(me: Endpoint, quorum: usize) -> Self {
        Self {
            me,
            quorum,
            peers: HashSet::new(),
            register_votes: VoteLedger::new(),
            dead_votes: VoteLedger::new(),
        }
    }

    /// Handles an inbound `register` by voting for the peer ourselves.
    pub fn propose_register(&mut self, peer: Endpoint) -> VoteOutcome {
        let voter = self.me.clone();
        self.merge_register_vote(peer, voter)
    }

    /// Merges a registration vote (our own or a peer seed's) and applies
    /// the admission if the tally reaches quorum and the peer is absent.
    pub fn merge_register_vote(&mut self, peer: Endpoint, voter: Endpoint) -> VoteOutcome {
        let votes = self.register_votes.record(&peer, voter);
        let applied = votes >= self.quorum && !self.peers.contains(&peer);

        if applied {
            // Fresh admission: any stale tallies for this endpoint are
            // history now. The next transition starts from zero.
            self.register_votes.clear(&peer);
            self.dead_votes.clear(&peer);
            self.peers.insert(peer);
        }

        VoteOutcome {
            votes,
            quorum: self.quorum,
            applied,
        }
    }

    /// Handles an inbound `dead_node` report by voting for the eviction
    /// ourselves.
    pub fn propose_dead(&mut self, peer: Endpoint) -> VoteOutcome {
        let voter = self.me.clone();
        self.merge_dead_vote(peer, voter)
    }

    /// Merges a death vote and applies the eviction if the tally reaches
    /// quorum and the peer is still present.
    pub fn merge_dead_vote(&mut self, peer: Endpoint, voter: Endpoint) -> VoteOutcome {
        let votes = self.dead_votes.record(&peer, voter);
        let applied = votes >= self.quorum && self.peers.contains(&peer);

        if applied {
            self.register_votes.clear(&peer);
            self.dead_votes.clear(&peer);
            self.peers.remove(&peer);
        }

        VoteOutcome {
            votes,
            quorum: self.quorum,
            applied,
        }
    }

    /// A snapshot of the live peer set, for `get_peers`.
    pub fn snapshot(&self) -> Vec<Endpoint> {
        self.peers.iter().cloned().collect()
    }

    /// Whether the directory currently lists an endpoint.
    pub fn contains(&self, peer: &Endpoint) -> bool {
        self.peers.contains(peer)
    }

    /// This seed's identity — the voter it signs fan-out votes with.
    pub fn me(&self) -> &Endpoint {
        &self.me
    }
}
