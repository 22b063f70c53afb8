//! Monotonic vote bookkeeping for one transition kind.
//!
//! A ledger maps a subject endpoint to the set of seeds that have voted
//! for its transition. Merges are set unions, so duplicate votes are free
//! and vote order is irrelevant.

use std::collections::{HashMap, HashSet};

use crate::endpoint::Endpoint;

/// Subject → distinct voters. One ledger per transition kind (register,
/// dead); a seed owns both.
#[derive(Debug, Default)]
pub struct VoteLedger {
    votes: HashMap<Endpoint, HashSet<Endpoint>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one vote and returns the subject's tally after the merge.
    /// Idempotent: a repeated (subject, voter) pair changes nothing.
    pub fn record(&mut self, subject: &Endpoint, voter: Endpoint) -> usize {
        let voters = self.votes.entry(subject.clone()).or_default();
        voters.insert(voter);
        voters.len()
    }

    /// Current tally for a subject.
    pub fn tally(&self, subject: &Endpoint) -> usize {
        self.votes.get(subject).map_or(0, HashSet::len)
    }

    /// Drops a subject's voters. Called when a transition applies, so the
    /// opposing transition later needs a fresh quorum.
    pub fn clear(&mut self, subject: &Endpoint) {
        self.votes.remove(subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    #[test]
    fn tally_counts_distinct_voters() {
        let mut ledger = VoteLedger::new();
        assert_eq!(ledger.record(&ep(7001), ep(6001)), 1);
        assert_eq!(ledger.record(&ep(7001), ep(6002)), 2);
        assert_eq!(ledger.tally(&ep(7001)), 2);
        assert_eq!(ledger.tally(&ep(7002)), 0);
    }

    #[test]
    fn duplicate_votes_are_idempotent() {
        let mut ledger = VoteLedger::new();
        ledger.record(&ep(7001), ep(6001));
        ledger.record(&ep(7001), ep(6001));
        ledger.record(&ep(7001), ep(6001));
        assert_eq!(ledger.tally(&ep(7001)), 1);
    }

    #[test]
    fn subjects_are_independent() {
        let mut ledger = VoteLedger::new();
        ledger.record(&ep(7001), ep(6001));
        ledger.record(&ep(7002), ep(6001));
        ledger.clear(&ep(7001));
        assert_eq!(ledger.tally(&ep(7001)), 0);
        assert_eq!(ledger.tally(&ep(7002)), 1);
    }
}
