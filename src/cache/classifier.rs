//! Value size classification
//!
//! Decides which cache tier a value belongs to. Has no effect on how
//! values are persisted.

use serde::Serialize;

/// Cache tier of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Big,
}

/// Pure predicate routing values between the cache tiers
pub trait ValueClassifier<V>: Send + Sync {
    fn is_small(&self, value: &V) -> bool;

    fn classify(&self, value: &V) -> SizeClass {
        if self.is_small(value) {
            SizeClass::Small
        } else {
            SizeClass::Big
        }
    }
}

/// Small means a bincode encoding of at most `threshold` bytes
#[derive(Debug, Clone, Copy)]
pub struct SizeClassifier {
    threshold: usize,
}

impl SizeClassifier {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }
}

impl<V: Serialize> ValueClassifier<V> for SizeClassifier {
    fn is_small(&self, value: &V) -> bool {
        match bincode::serialized_size(value) {
            Ok(size) => size <= self.threshold as u64,
            Err(_) => false,
        }
    }
}
