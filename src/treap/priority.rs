//! Node priority sources
//!
//! Priorities decide rotations. Production trees draw them at random; tests
//! inject fixed sequences to pin down exact tree shapes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces the priority of each newly allocated node
pub trait PriorityGenerator: Send + Sync {
    fn next_priority(&mut self) -> u32;
}

/// Uniformly random priorities in `[0, i32::MAX)`
pub struct RandomPriority {
    rng: StdRng,
}

impl RandomPriority {
    /// Seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible sequence for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPriority {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityGenerator for RandomPriority {
    fn next_priority(&mut self) -> u32 {
        self.rng.random_range(0..i32::MAX as u32)
    }
}

/// Cycles through a fixed list of priorities
#[derive(Debug, Clone)]
pub struct SequencePriority {
    values: Vec<u32>,
    next: usize,
}

impl SequencePriority {
    /// An empty list yields priority 0 for every node
    pub fn new(values: impl Into<Vec<u32>>) -> Self {
        Self {
            values: values.into(),
            next: 0,
        }
    }
}

impl PriorityGenerator for SequencePriority {
    fn next_priority(&mut self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
