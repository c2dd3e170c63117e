//! Summary model boundary
//!
//! The engine never generates text itself: scene summarization goes
//! through this collaborator contract. Failures are recoverable by design
//! — a failed batch stays in the Event tier and is retried on the next
//! summarize call for that scene.

use crate::error::MemoryResult;
use async_trait::async_trait;

/// External `summarize(text) -> text` collaborator
#[async_trait]
pub trait SummaryModel: Send + Sync {
    /// Condense the given text. Best-effort; may fail.
    async fn summarize(&self, text: &str) -> MemoryResult<String>;
}

/// Outcome of a `summarize_scene` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummarizeReport {
    /// Batches the scene's live chunks were grouped into
    pub batches_total: usize,
    /// Batches successfully summarized and migrated
    pub batches_summarized: usize,
    /// Batches whose summary call failed; left un-migrated for retry
    pub batches_failed: usize,
    /// Summary pieces written into the Summary tier
    pub summary_pieces: usize,
    /// Chunks moved from Event into Archive
    pub chunks_archived: usize,
}

impl SummarizeReport {
    /// Whether every batch was summarized and migrated
    pub fn is_complete(&self) -> bool {
        self.batches_failed == 0
    }
}
