//! # Topology Simulation
//!
//! Grows a synthetic overlay offline — one peer at a time, each new
//! arrival wiring to a single existing peer chosen by degree-weighted
//! power-law sampling — and prints the resulting degree distribution as a
//! text histogram. Useful for eyeballing how skewed the neighbor graph
//! gets at a given population without launching a single socket.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use weft_protocol::config::POWER_LAW_ALPHA;

use crate::cli::SimulateArgs;

/// A growing overlay: `degrees[i]` is the degree of the i-th peer to join.
#[derive(Debug, Default)]
pub struct GrowthSim {
    degrees: Vec<usize>,
}

impl GrowthSim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one peer. Every arrival after the first attaches to exactly
    /// one existing peer, picked with weight `(degree + 1)^-α`.
    pub fn add_peer<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let id = self.degrees.len();
        self.degrees.push(0);
        if id == 0 {
            return;
        }

        let weights: Vec<f64> = self.degrees[..id]
            .iter()
            .map(|d| ((d + 1) as f64).powf(-POWER_LAW_ALPHA))
            .collect();
        let Ok(dist) = WeightedIndex::new(&weights) else {
            return;
        };

        let chosen = dist.sample(rng);
        self.degrees[chosen] += 1;
        self.degrees[id] += 1;
    }

    /// Grows the overlay to `n` peers.
    pub fn grow<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) {
        for _ in 0..n {
            self.add_peer(rng);
        }
    }

    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    /// Degree → number of peers with that degree.
    pub fn histogram(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &d in &self.degrees {
            *counts.entry(d).or_insert(0) += 1;
        }
        counts
    }
}

/// Renders the histogram with one bar per degree, scaled to fit a
/// terminal.
fn render_histogram(histogram: &BTreeMap<usize, usize>) -> String {
    const BAR_WIDTH: usize = 60;
    let max = histogram.values().copied().max().unwrap_or(1);

    let mut out = String::new();
    out.push_str("degree | peers\n");
    out.push_str("-------+------\n");
    for (degree, count) in histogram {
        let bar_len = (count * BAR_WIDTH).div_ceil(max);
        out.push_str(&format!(
            "{degree:>6} | {} {count}\n",
            "#".repeat(bar_len)
        ));
    }
    out
}

/// Entry point for `weft-node simulate`.
pub fn run(args: SimulateArgs) {
    let mut rng = match args.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut sim = GrowthSim::new();
    sim.grow(args.peers, &mut rng);

    println!(
        "overlay of {} peers, alpha = {POWER_LAW_ALPHA}",
        args.peers
    );
    println!("{}", render_histogram(&sim.histogram()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_join_after_the_first_adds_one_edge() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut sim = GrowthSim::new();
        sim.grow(200, &mut rng);

        // 199 edges, each contributing to two degrees.
        let total: usize = sim.degrees().iter().sum();
        assert_eq!(total, 2 * 199);
    }

    #[test]
    fn histogram_accounts_for_every_peer() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut sim = GrowthSim::new();
        sim.grow(500, &mut rng);

        let counted: usize = sim.histogram().values().sum();
        assert_eq!(counted, 500);
    }

    #[test]
    fn same_seed_same_overlay() {
        let mut a = GrowthSim::new();
        let mut b = GrowthSim::new();
        a.grow(300, &mut StdRng::seed_from_u64(11));
        b.grow(300, &mut StdRng::seed_from_u64(11));
        assert_eq!(a.degrees(), b.degrees());
    }

    #[test]
    fn render_mentions_every_degree() {
        let mut sim = GrowthSim::new();
        sim.grow(50, &mut StdRng::seed_from_u64(2));
        let rendered = render_histogram(&sim.histogram());
        for degree in sim.histogram().keys() {
            assert!(rendered.contains(&format!("{degree:>6} |")));
        }
    }
}
