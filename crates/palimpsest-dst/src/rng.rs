//! Seeded RNG for reproducible simulation runs
//!
//! TigerStyle: ChaCha20 for reproducibility. Every run logs its seed;
//! replay any failure with `SIM_SEED=<seed>`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Mutex;

/// Environment variable holding a replay seed
pub const SIM_SEED_ENV: &str = "SIM_SEED";

/// Deterministic random number generator.
///
/// Given the same seed, produces the same sequence. Forks derive
/// independent streams from an explicit salt so the derivation itself is
/// reproducible.
#[derive(Debug)]
pub struct SimRng {
    seed: u64,
    rng: Mutex<ChaCha20Rng>,
}

impl SimRng {
    /// Create an RNG from an explicit seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Resolve a seed from `SIM_SEED`, falling back to a random one
    pub fn seed_from_env() -> u64 {
        std::env::var(SIM_SEED_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(rand::random)
    }

    /// Create an RNG from `SIM_SEED` or a random seed, logging the seed
    /// for replay
    pub fn from_env_or_random() -> Self {
        let seed = Self::seed_from_env();
        tracing::info!(seed, "simulation seed (set {SIM_SEED_ENV}={seed} to replay)");
        Self::new(seed)
    }

    /// The seed this RNG was created from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next random u64
    pub fn next_u64(&self) -> u64 {
        self.rng.lock().expect("rng lock poisoned").gen()
    }

    /// Next random f64 in [0, 1)
    pub fn next_f64(&self) -> f64 {
        self.rng.lock().expect("rng lock poisoned").gen()
    }

    /// True with the given probability
    pub fn chance(&self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );
        self.next_f64() < probability
    }

    /// Derive an independent stream. The same (seed, salt) pair always
    /// produces the same fork, regardless of how much of the parent
    /// stream was consumed.
    pub fn fork(&self, salt: u64) -> Self {
        let fork_seed = self
            .seed
            .wrapping_add(salt)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self::new(fork_seed)
    }
}
