//! Simulated summary model
//!
//! TigerStyle: Deterministic responses, fault injection, no network. The
//! digest keeps the source's vocabulary, so summaries remain retrievable
//! by the same queries that would have found the raw dialogue.

use crate::fault::{FaultInjector, FaultType};
use async_trait::async_trait;
use palimpsest_memory::{tokenize, MemoryError, MemoryResult, SummaryModel};
use std::sync::Arc;

/// Distinct source tokens carried into a generated summary
const SUMMARY_TOKENS_MAX: usize = 12;

/// Deterministic stand-in for the external summarization service.
///
/// Canned responses match by substring; everything else gets a token
/// digest of the input. Faults come from the injector, so retry behavior
/// is reproducible under a fixed seed.
pub struct SimSummaryModel {
    faults: Arc<FaultInjector>,
    canned: Vec<(String, String)>,
}

impl SimSummaryModel {
    /// Create a model with no canned responses
    pub fn new(faults: Arc<FaultInjector>) -> Self {
        Self {
            faults,
            canned: Vec::new(),
        }
    }

    /// Add a canned response for inputs containing the pattern
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.canned.push((pattern.into(), response.into()));
        self
    }

    fn digest(text: &str) -> String {
        let mut seen = Vec::new();
        for token in tokenize(text) {
            if !seen.contains(&token) {
                seen.push(token);
            }
            if seen.len() >= SUMMARY_TOKENS_MAX {
                break;
            }
        }
        format!("Scene summary: {}.", seen.join(" "))
    }
}

#[async_trait]
impl SummaryModel for SimSummaryModel {
    async fn summarize(&self, text: &str) -> MemoryResult<String> {
        if let Some(fault) = self.faults.should_inject() {
            let reason = match fault {
                FaultType::SummarizeFail => "summary model error: internal error",
                FaultType::SummarizeTimeout => "summary model request timed out",
            };
            return Err(MemoryError::SummarizeFailed {
                reason: reason.to_string(),
            });
        }

        for (pattern, response) in &self.canned {
            if text.contains(pattern) {
                return Ok(response.clone());
            }
        }

        Ok(Self::digest(text))
    }
}
