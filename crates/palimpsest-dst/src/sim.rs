//! Simulation harness wiring
//!
//! Builds a memory store whose collaborators are all deterministic under
//! one seed: the mock embedder, the simulated summary model, and the
//! fault injector driving its failures.

use crate::fault::{FaultConfig, FaultInjector};
use crate::rng::SimRng;
use crate::summary::SimSummaryModel;
use palimpsest_memory::{MemoryConfig, MemoryResult, MemoryStore, MockEmbedder};
use std::sync::Arc;

/// RNG stream salt for the fault injector
const FAULT_STREAM_SALT: u64 = 1;

/// Configuration of one simulated world
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed; all derived streams fork from it
    pub seed: u64,
    /// Engine configuration under test
    pub memory: MemoryConfig,
}

impl SimConfig {
    /// Create a configuration with an explicit seed
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            memory: MemoryConfig::default(),
        }
    }

    /// Seed from `SIM_SEED` or randomly, logging for replay
    pub fn from_env_or_random() -> Self {
        let seed = SimRng::seed_from_env();
        tracing::info!(seed, "simulation seed (set SIM_SEED={seed} to replay)");
        Self::new(seed)
    }

    /// Replace the engine configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }
}

/// A fully wired simulated world
pub struct SimWorld {
    /// The store under test
    pub store: MemoryStore,
    /// Shared fault injector feeding the summary model
    pub faults: Arc<FaultInjector>,
    /// The master seed, for failure reports
    pub seed: u64,
}

impl SimWorld {
    /// Build a world with no faults configured
    pub fn build(config: SimConfig) -> MemoryResult<Self> {
        Self::build_with_faults(config, Vec::new())
    }

    /// Build a world whose summary model fails per the given rules
    pub fn build_with_faults(
        config: SimConfig,
        fault_rules: Vec<FaultConfig>,
    ) -> MemoryResult<Self> {
        crate::init_logging();
        tracing::info!(seed = config.seed, "building simulated world");
        let rng = SimRng::new(config.seed);

        let mut injector = FaultInjector::new(rng.fork(FAULT_STREAM_SALT));
        for rule in fault_rules {
            injector = injector.with_fault(rule);
        }
        let faults = Arc::new(injector);

        let store = MemoryStore::new(
            Arc::new(MockEmbedder::default()),
            Arc::new(SimSummaryModel::new(Arc::clone(&faults))),
            config.memory,
        )?;

        Ok(Self {
            store,
            faults,
            seed: config.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palimpsest_memory::{SceneId, Tier};

    #[tokio::test]
    async fn test_world_builds_and_accepts_writes() {
        let mut world = SimWorld::build(SimConfig::new(42)).unwrap();
        let outcome = world
            .store
            .add_piece(
                "a line",
                Tier::Event,
                Some("conversation"),
                Some(SceneId::from_raw(1)),
            )
            .await
            .unwrap();
        assert!(outcome.new_chunk.is_some());
        assert_eq!(world.seed, 42);
    }
}
