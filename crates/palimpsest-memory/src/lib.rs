//! Layered memory for long-running narrative agents
//!
//! TigerStyle: Four tiers with explicit boundaries, one identity per chunk.
//!
//! # Memory Tiers
//!
//! 1. **Global** - Setting-wide facts: character profiles, scene setup,
//!    objectives. Written through the atomic path; never decays with
//!    scene distance.
//! 2. **Event** - Raw in-scene happenings: dialogue, actions, thoughts.
//!    Pieces merge into capacity-bounded chunks with short-range overlap
//!    across chunk boundaries.
//! 3. **Summary** - Condensed records of completed scenes, produced by an
//!    external summary model.
//! 4. **Archive** - Demoted originals, kept for long-term recall at a
//!    weight near zero.
//!
//! # Data Flow
//!
//! Writes route a piece to its tier, where it merges into the most recent
//! matching chunk or opens a new one (both indexes updated before the call
//! returns). Retrieval queries each requested tier independently, blending
//! BM25, vector similarity, accumulated importance, and recency decay. At
//! scene end, the summarizer condenses the scene's Event chunks into the
//! Summary tier and migrates the originals to Archive, preserving their
//! ids.
//!
//! # Design Principles
//!
//! - Chunk ids are global across tiers: migration never changes identity
//! - No staleness window: every piece append re-embeds its chunk
//! - Collaborators (embedder, summary model) are injected, never global
//! - Single-threaded, synchronous per call; callers serialize per session

mod chunk;
mod config;
mod embedder;
mod error;
mod lexical;
mod store;
mod summarizer;
mod tier;
mod tokenizer;
mod types;
mod vector;

pub use chunk::{Chunk, ChunkLimits, CHUNK_PIECES_MAX_DEFAULT, CHUNK_TEXT_LEN_MAX_DEFAULT};
pub use config::{
    MemoryConfig, RetrievalConfig, WeightTable, ARCHIVED_TAG_WEIGHT_FALLBACK,
    CHUNK_OVERLAP_PIECES_DEFAULT, RETRIEVE_TOP_K_DEFAULT, SCORE_EPSILON,
    SUMMARY_BATCH_SIZE_DEFAULT, VECTOR_CANDIDATE_FACTOR,
};
pub use embedder::{Embedder, MockEmbedder, EMBEDDING_DIM_DEFAULT};
#[cfg(feature = "local-embeddings")]
pub use embedder::LocalEmbedder;
pub use error::{MemoryError, MemoryResult};
pub use lexical::{LexicalIndex, BM25_B, BM25_K1};
pub use store::{AddOutcome, MemoryStore, ScoredChunk};
pub use summarizer::{SummarizeReport, SummaryModel};
pub use tier::TierStore;
pub use tokenizer::tokenize;
pub use types::{
    now, ChunkId, IdAllocator, MemoryStats, Metadata, Piece, PieceId, SceneId, Tier, TierStats,
    Timestamp, ARCHIVED_TAG_PREFIX, LIVE_CONTENT_TAGS, TAG_CONVERSATION,
};
pub use vector::{l2_distance, VectorIndex};
