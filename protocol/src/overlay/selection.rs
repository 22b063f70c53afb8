//! # Power-Law Neighbor Selection
//!
//! Candidates are ranked by *discovery order* — the order the peer list
//! came back from the seeds — and rank `i` gets weight `(i + 1)^-α`.
//! Sampling is with replacement, so a low rank can be drawn more than
//! once; the caller deduplicates into its neighbor set.
//!
//! The ranking basis is deterministic at one node and deliberately
//! uncoordinated across nodes: every peer sees a differently-ordered list,
//! and the aggregate degree distribution comes out heavy-tailed. Sorting
//! candidates by identity before weighting would make every node pile onto
//! the same endpoint and must never be done here.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::endpoint::Endpoint;

/// Unnormalized rank weights `(i + 1)^-alpha` for `n` candidates.
pub fn rank_weights(n: usize, alpha: f64) -> Vec<f64> {
    (0..n).map(|i| ((i + 1) as f64).powf(-alpha)).collect()
}

/// Samples `min(k_max, candidates.len())` endpoints with replacement,
/// biased toward the front of the list. Returns the raw draws — possibly
/// with repeats, which cost the caller nothing beyond a duplicate
/// handshake attempt.
pub fn sample_neighbors<R: Rng + ?Sized>(
    candidates: &[Endpoint],
    k_max: usize,
    alpha: f64,
    rng: &mut R,
) -> Vec<Endpoint> {
    if candidates.is_empty() || k_max == 0 {
        return Vec::new();
    }

    let weights = rank_weights(candidates.len(), alpha);
    let Ok(dist) = WeightedIndex::new(&weights) else {
        // Unreachable for positive alpha over a non-empty list, but an
        // empty selection beats a panic on a networking path.
        return Vec::new();
    };

    let k = k_max.min(candidates.len());
    (0..k)
        .map(|_| candidates[dist.sample(rng)].clone())
        .collect()
}
