//! # Failure Detection State Machine
//!
//! Each peer privately tracks every neighbor it pings. Evidence
//! accumulates in two forms: *strikes* (this peer's own consecutive ping
//! failures) and *accusers* (neighbors whose suspicion votes have
//! arrived, this peer included once it escalates). The two are
//! independent on purpose — votes for a suspect are accepted and stored
//! before this peer has any strikes of its own, so a late escalation can
//! find a quorum already waiting.
//!
//! ```text
//! Healthy ──ping failure──> Suspected(k) ──k == threshold──> Accusing
//!    ^                           │                               │
//!    └──────successful ping──────┘            accusers >= QN ────┤
//!                                                                v
//!                                                            Reported
//! ```
//!
//! `Reported` is terminal: one observer files one report per suspect per
//! process lifetime, no matter how many more ping cycles fail. The seeds
//! would shrug off repeats anyway — their dead-vote ledger is a set — but
//! there is no reason to shout the same funeral announcement every 3 s.

use std::collections::{HashMap, HashSet};

use crate::config::ESCALATION_THRESHOLD;
use crate::endpoint::Endpoint;

/// Where a suspect stands in this observer's eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuspectPhase {
    /// No outstanding evidence.
    #[default]
    Healthy,
    /// One or more consecutive ping failures, below the threshold.
    Suspected,
    /// This observer has escalated and voted; accusers may accumulate.
    Accusing,
    /// The local quorum agreed and the seeds have been told. Terminal.
    Reported,
}

#[derive(Debug, Default)]
struct SuspectRecord {
    strikes: u32,
    accusers: HashSet<Endpoint>,
    phase: SuspectPhase,
}

/// Per-observer failure detector: strike counting, accuser bookkeeping,
/// and the phase machine above. No I/O, no clock — the ping loop feeds it
/// outcomes and acts on what it returns.
#[derive(Debug)]
pub struct FailureDetector {
    me: Endpoint,
    records: HashMap<Endpoint, SuspectRecord>,
}

impl FailureDetector {
    pub fn new(me: Endpoint) -> Self {
        Self {
            me,
            records: HashMap::new(),
        }
    }

    /// A ping came back: the strike count resets, and a merely-suspected
    /// neighbor is healthy again. An `Accusing` or `Reported` record does
    /// not recover — the vote is already out in the world.
    pub fn ping_succeeded(&mut self, neighbor: &Endpoint) {
        if let Some(record) = self.records.get_mut(neighbor) {
            record.strikes = 0;
            if record.phase == SuspectPhase::Suspected {
                record.phase = SuspectPhase::Healthy;
            }
        }
    }

    /// A ping failed. Returns `true` exactly when this failure crosses the
    /// escalation threshold: the caller must then broadcast its suspicion
    /// vote. The observer's own vote is recorded here, atomically with the
    /// phase change.
    pub fn ping_failed(&mut self, neighbor: &Endpoint) -> bool {
        let record = self.records.entry(neighbor.clone()).or_default();
        record.strikes += 1;

        match record.phase {
            SuspectPhase::Healthy | SuspectPhase::Suspected => {
                if record.strikes >= ESCALATION_THRESHOLD {
                    record.phase = SuspectPhase::Accusing;
                    record.accusers.insert(self.me.clone());
                    true
                } else {
                    record.phase = SuspectPhase::Suspected;
                    false
                }
            }
            // Already accused (or buried). Strikes keep counting, but the
            // megaphone stays down.
            SuspectPhase::Accusing | SuspectPhase::Reported => false,
        }
    }

    /// Merges a suspicion vote from a neighbor. Votes are kept regardless
    /// of this observer's own phase. Returns the accuser count.
    pub fn record_accuser(&mut self, suspect: &Endpoint, voter: Endpoint) -> usize {
        let record = self.records.entry(suspect.clone()).or_default();
        record.accusers.insert(voter);
        record.accusers.len()
    }

    /// Checks the local quorum. Returns `true` exactly once per suspect:
    /// when this observer has escalated (its own vote is among the
    /// accusers) *and* the distinct accusers reach `quorum`. Flips the
    /// record to `Reported`.
    pub fn should_report(&mut self, suspect: &Endpoint, quorum: usize) -> bool {
        let Some(record) = self.records.get_mut(suspect) else {
            return false;
        };
        if record.phase != SuspectPhase::Accusing {
            return false;
        }
        if record.accusers.len() < quorum {
            return false;
        }
        record.phase = SuspectPhase::Reported;
        true
    }

    /// Current phase for a suspect.
    pub fn phase(&self, suspect: &Endpoint) -> SuspectPhase {
        self.records.get(suspect).map_or_else(Default::default, |r| r.phase)
    }

    /// Distinct accusers currently on record for a suspect.
    pub fn accuser_count(&self, suspect: &Endpoint) -> usize {
        self.records.get(suspect).map_or(0, |r| r.accusers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    fn detector() -> FailureDetector {
        FailureDetector::new(ep(7001))
    }

    #[test]
    fn escalates_exactly_at_the_second_consecutive_failure() {
        let mut d = detector();
        let n = ep(7004);

        assert!(!d.ping_failed(&n));
        assert_eq!(d.phase(&n), SuspectPhase::Suspected);

        assert!(d.ping_failed(&n));
        assert_eq!(d.phase(&n), SuspectPhase::Accusing);
        // Escalation files the observer's own vote.
        assert_eq!(d.accuser_count(&n), 1);

        // A third failure does not re-escalate.
        assert!(!d.ping_failed(&n));
    }

    #[test]
    fn a_successful_ping_clears_a_suspicion() {
        let mut d = detector();
        let n = ep(7004);

        d.ping_failed(&n);
        d.ping_succeeded(&n);
        assert_eq!(d.phase(&n), SuspectPhase::Healthy);

        // The slate is clean: escalation needs two fresh failures again.
        assert!(!d.ping_failed(&n));
        assert!(d.ping_failed(&n));
    }

    #[test]
    fn no_report_without_a_quorum() {
        let mut d = detector();
        let n = ep(7004);
        d.ping_failed(&n);
        d.ping_failed(&n);

        // Self is the only accuser; quorum of 3 is out of reach.
        assert!(!d.should_report(&n, 3));
        assert_eq!(d.phase(&n), SuspectPhase::Accusing);
    }

    #[test]
    fn no_report_without_own_escalation() {
        let mut d = detector();
        let n = ep(7004);

        // The whole neighborhood votes, but this observer's pings have
        // never failed, so it stays out of the reporting business.
        d.record_accuser(&n, ep(7002));
        d.record_accuser(&n, ep(7003));
        assert!(!d.should_report(&n, 2));
    }

    #[test]
    fn late_escalation_finds_the_waiting_quorum() {
        let mut d = detector();
        let n = ep(7004);

        d.record_accuser(&n, ep(7002));
        d.record_accuser(&n, ep(7003));

        d.ping_failed(&n);
        assert!(d.ping_failed(&n));
        // Self joins two waiting accusers: quorum of 3, immediately.
        assert_eq!(d.accuser_count(&n), 3);
        assert!(d.should_report(&n, 3));
    }

    #[test]
    fn reports_exactly_once() {
        let mut d = detector();
        let n = ep(7004);
        d.ping_failed(&n);
        d.ping_failed(&n);

        assert!(d.should_report(&n, 1));
        assert_eq!(d.phase(&n), SuspectPhase::Reported);

        // Further failures and votes must not produce a second report.
        d.ping_failed(&n);
        d.record_accuser(&n, ep(7002));
        assert!(!d.should_report(&n, 1));
    }

    #[test]
    fn duplicate_accusers_count_once() {
        let mut d = detector();
        let n = ep(7004);
        assert_eq!(d.record_accuser(&n, ep(7002)), 1);
        assert_eq!(d.record_accuser(&n, ep(7002)), 1);
        assert_eq!(d.record_accuser(&n, ep(7003)), 2);
    }

    #[test]
    fn suspects_are_tracked_independently() {
        let mut d = detector();
        d.ping_failed(&ep(7004));
        d.ping_failed(&ep(7004));
        d.ping_failed(&ep(7005));

        assert_eq!(d.phase(&ep(7004)), SuspectPhase::Accusing);
        assert_eq!(d.phase(&ep(7005)), SuspectPhase::Suspected);
    }
}
