//! Victim selection for fault cycles.
//!
//! Selection is uniform over the candidate snapshot. The randomness only
//! spreads faults across nodes and is not suitable for anything secret.
//! Tests inject [`SeededSelector`] for determinism.

use drill_types::Node;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Picks the node a fault cycle will hit.
pub trait VictimSelector: Send + Sync {
    /// Pick one node uniformly from `candidates`, or `None` if empty.
    fn pick<'a>(&mut self, candidates: &'a [Node]) -> Option<&'a Node>;
}

/// Selector reseeded from the wall clock on every pick.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClockSelector;

impl WallClockSelector {
    /// Create a new wall-clock selector.
    pub fn new() -> Self {
        Self
    }
}

impl VictimSelector for WallClockSelector {
    fn pick<'a>(&mut self, candidates: &'a [Node]) -> Option<&'a Node> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        pick_with(&mut StdRng::seed_from_u64(seed), candidates)
    }
}

/// Deterministic selector driven by a fixed seed.
#[derive(Debug, Clone)]
pub struct SeededSelector {
    rng: StdRng,
}

impl SeededSelector {
    /// Create a selector that yields the same sequence for the same seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl VictimSelector for SeededSelector {
    fn pick<'a>(&mut self, candidates: &'a [Node]) -> Option<&'a Node> {
        pick_with(&mut self.rng, candidates)
    }
}

fn pick_with<'a, R: Rng>(rng: &mut R, candidates: &'a [Node]) -> Option<&'a Node> {
    if candidates.is_empty() {
        return None;
    }
    candidates.get(rng.gen_range(0..candidates.len()))
}
