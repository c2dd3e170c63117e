//! Deterministic simulation testing for the palimpsest memory engine
//!
//! TigerStyle: Every run is reproducible from one seed. The harness wires
//! a memory store to deterministic collaborators — the mock embedder, a
//! simulated summary model, and a fault injector for its failures — so
//! the engine's merge, ranking, and migration behavior can be exercised
//! end to end without any external service.
//!
//! Scenario tests live in `tests/`; replay any failure with
//! `SIM_SEED=<seed>`.

pub mod fault;
pub mod rng;
pub mod sim;
pub mod summary;

pub use fault::{FaultConfig, FaultInjector, FaultType};
pub use rng::{SimRng, SIM_SEED_ENV};
pub use sim::{SimConfig, SimWorld};
pub use summary::SimSummaryModel;

/// Install an env-filtered subscriber so seed and fault logs are visible
/// under `RUST_LOG`. Idempotent; every world build calls it.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
