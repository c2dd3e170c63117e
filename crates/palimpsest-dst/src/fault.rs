//! Fault injection for the external summary model
//!
//! TigerStyle: Explicit fault types, probabilistic injection, bounded
//! triggers. The memory engine's only fallible collaborators are the
//! embedder and the summary model; the summarize path is the one with a
//! retry contract worth exercising, so that is the fault surface here.

use crate::rng::SimRng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Faults the simulated summary model can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// The model returns an error
    SummarizeFail,
    /// The model times out
    SummarizeTimeout,
}

impl FaultType {
    /// Human-readable fault name
    pub fn name(&self) -> &'static str {
        match self {
            FaultType::SummarizeFail => "summarize_fail",
            FaultType::SummarizeTimeout => "summarize_timeout",
        }
    }
}

/// Configuration for one fault rule
#[derive(Debug, Clone, Copy)]
pub struct FaultConfig {
    /// The fault to inject
    pub fault_type: FaultType,
    /// Probability of injection per call (0.0 - 1.0)
    pub probability: f64,
    /// Only trigger after this many calls have passed
    pub after_calls: u64,
    /// Maximum number of triggers; `None` is unlimited
    pub max_triggers: Option<u64>,
}

impl FaultConfig {
    /// Create a rule with the given probability
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1]"
        );
        Self {
            fault_type,
            probability,
            after_calls: 0,
            max_triggers: None,
        }
    }

    /// Wait this many calls before the rule becomes active
    pub fn after(mut self, calls: u64) -> Self {
        self.after_calls = calls;
        self
    }

    /// Cap the number of triggers
    pub fn max_triggers(mut self, max: u64) -> Self {
        self.max_triggers = Some(max);
        self
    }
}

struct FaultSlot {
    config: FaultConfig,
    triggered: AtomicU64,
}

/// Probabilistic fault injector, deterministic under a fixed seed
pub struct FaultInjector {
    slots: Vec<FaultSlot>,
    rng: SimRng,
    calls: AtomicU64,
}

impl FaultInjector {
    /// Create an injector with no rules (never faults)
    pub fn new(rng: SimRng) -> Self {
        Self {
            slots: Vec::new(),
            rng,
            calls: AtomicU64::new(0),
        }
    }

    /// Add a fault rule
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.slots.push(FaultSlot {
            config,
            triggered: AtomicU64::new(0),
        });
        self
    }

    /// Decide whether the current call faults. Counts the call either way.
    pub fn should_inject(&self) -> Option<FaultType> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        for slot in &self.slots {
            if call < slot.config.after_calls {
                continue;
            }
            if let Some(max) = slot.config.max_triggers {
                if slot.triggered.load(Ordering::SeqCst) >= max {
                    continue;
                }
            }
            if self.rng.chance(slot.config.probability) {
                slot.triggered.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(fault = slot.config.fault_type.name(), call, "injecting fault");
                return Some(slot.config.fault_type);
            }
        }
        None
    }

    /// Total calls observed
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Times a given fault type has triggered
    pub fn trigger_count(&self, fault_type: FaultType) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.config.fault_type == fault_type)
            .map(|slot| slot.triggered.load(Ordering::SeqCst))
            .sum()
    }
}
