//! Error types for the memory engine
//!
//! TigerStyle: Explicit error variants with context, using thiserror.
//!
//! Two conditions are deliberately *not* errors: a full chunk (the normal
//! signal that a new chunk must be created) and a missing chunk on lookup
//! (callers routinely probe for existence and get an `Option`).

use thiserror::Error;

/// Result type alias for memory operations
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;

/// Memory engine errors
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A tier name that does not map to any tier. Contract violation by the
    /// caller; fails fast instead of being silently dropped.
    #[error("unknown tier name: {name}")]
    UnknownTier { name: String },

    /// Configuration rejected at load time.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The embedding provider failed.
    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    /// The external summary model failed. Recoverable: the affected batch
    /// stays in the Event tier and is retried on the next summarize call.
    #[error("summarization failed: {reason}")]
    SummarizeFailed { reason: String },

    /// A chunk id that was expected to exist in a tier's chunk map.
    #[error("chunk not found in {tier} tier: {chunk_id}")]
    ChunkNotFound { tier: &'static str, chunk_id: u64 },

    /// A chunk present in the chunk map but missing from an index, or vice
    /// versa. Only reachable through an implementation bug; the operation
    /// that detects it aborts rather than return inconsistent results.
    #[error("index desync in {tier} tier for chunk {chunk_id}: {detail}")]
    IndexDesync {
        tier: &'static str,
        chunk_id: u64,
        detail: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tier_display() {
        let err = MemoryError::UnknownTier {
            name: "scratch".to_string(),
        };
        assert!(err.to_string().contains("scratch"));
    }

    #[test]
    fn test_index_desync_display() {
        let err = MemoryError::IndexDesync {
            tier: "event",
            chunk_id: 42,
            detail: "missing from vector index",
        };
        let msg = err.to_string();
        assert!(msg.contains("event"));
        assert!(msg.contains("42"));
        assert!(msg.contains("vector index"));
    }
}
