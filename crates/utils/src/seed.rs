//! Deterministic seeding for per-procedure random streams.
//!
//! A single base seed drives the whole run. Each procedure gets its own `StdRng` derived from
//! `keccak256(seed || name)`, so the trials drawn for one procedure never depend on how many
//! blocks earlier procedures consumed.

use rand::{SeedableRng, rngs::StdRng};
use sha3::{Digest, Keccak256};

/// Base seed for an obfuscation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed(u64);

impl Seed {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Uses the configured seed, or draws one from the thread-local entropy source.
    pub fn from_config(value: Option<u64>) -> Self {
        Self(value.unwrap_or_else(rand::random))
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns a freshly reset generator for the named procedure.
    pub fn rng_for(&self, procedure: &str) -> StdRng {
        let mut hasher = Keccak256::new();
        hasher.update(self.0.to_le_bytes());
        hasher.update(procedure.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        StdRng::from_seed(digest)
    }
}
