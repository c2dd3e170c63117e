//! Common types for the memory engine
//!
//! TigerStyle: Explicit types with clear semantics. Ids are monotonic
//! integers handed out by the store-level allocator, never generated
//! locally — a chunk keeps one identity for its whole life, including
//! migration between tiers.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp type for memory operations (UTC to avoid timezone ambiguity)
pub type Timestamp = DateTime<Utc>;

/// Returns the current timestamp
pub fn now() -> Timestamp {
    Utc::now()
}

/// Tag carried by raw dialogue pieces
pub const TAG_CONVERSATION: &str = "conversation";

/// Tags whose Event-tier chunks are "live" content, eligible for
/// summarization and archival
pub const LIVE_CONTENT_TAGS: [&str; 3] = ["conversation", "action", "thought"];

/// Prefix applied to a chunk's tag when it migrates into the Archive tier
pub const ARCHIVED_TAG_PREFIX: &str = "archived_";

/// A retrieval priority class with its own chunk population and indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Setting-wide facts: character profiles, scene setup, objectives
    Global,
    /// Raw in-scene events: dialogue, actions, thoughts
    Event,
    /// Condensed summaries of completed scenes
    Summary,
    /// Demoted originals, kept for long-term recall at low weight
    Archive,
}

impl Tier {
    /// All tiers, in routing order
    pub const ALL: [Tier; 4] = [Tier::Global, Tier::Event, Tier::Summary, Tier::Archive];

    /// The tier's canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Global => "global",
            Tier::Event => "event",
            Tier::Summary => "summary",
            Tier::Archive => "archive",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Tier::Global),
            "event" => Ok(Tier::Event),
            "summary" => Ok(Tier::Summary),
            "archive" => Ok(Tier::Archive),
            other => Err(MemoryError::UnknownTier {
                name: other.to_string(),
            }),
        }
    }
}

/// Unique identifier of a piece, monotonic per store
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PieceId(u64);

impl PieceId {
    /// Wrap a raw id value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a chunk, monotonic and global across all tiers.
///
/// Chunk ids are assigned by the store, not by tier stores: a chunk that
/// migrates from Event to Archive keeps the same id, and id order is write
/// order across the whole store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkId(u64);

impl ChunkId {
    /// Wrap a raw id value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scene ordinal. Scene distance is the absolute difference of ordinals.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SceneId(u64);

impl SceneId {
    /// Wrap a raw scene ordinal
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw scene ordinal
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Absolute ordinal distance to another scene
    pub fn distance(&self, other: SceneId) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene{}", self.0)
    }
}

/// Allocator for the two store-wide monotonic counters.
///
/// Lives in the memory store and is threaded into tier-store operations so
/// tiers never mint ids themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next_piece: u64,
    next_chunk: u64,
}

impl IdAllocator {
    /// Fresh allocator starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next piece id
    pub fn next_piece_id(&mut self) -> PieceId {
        let id = PieceId(self.next_piece);
        self.next_piece += 1;
        id
    }

    /// Allocate the next chunk id (global across tiers)
    pub fn next_chunk_id(&mut self) -> ChunkId {
        let id = ChunkId(self.next_chunk);
        self.next_chunk += 1;
        id
    }

    /// Drop both counters back to zero
    pub fn reset(&mut self) {
        self.next_piece = 0;
        self.next_chunk = 0;
    }
}

/// Free-form metadata attached to pieces and chunks
pub type Metadata = HashMap<String, serde_json::Value>;

/// Atomic, immutable unit of ingested text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    /// Unique id, monotonic per store
    pub id: PieceId,
    /// The ingested text
    pub text: String,
    /// Tier this piece was routed to
    pub tier: Tier,
    /// Sub-classification within the tier; defaults to the tier name
    pub tag: String,
    /// Free-form metadata
    pub metadata: Metadata,
    /// Scene association; absent for tier-global facts
    pub scene: Option<SceneId>,
    /// Insertion index within the owning tier, assigned on write
    pub seq: u64,
    /// Creation time (informational only)
    pub created_at: Timestamp,
}

impl Piece {
    /// Create a new piece. The tag defaults to the tier name when unset;
    /// `seq` is assigned later, when the tier store takes the piece in.
    pub fn new(
        id: PieceId,
        text: impl Into<String>,
        tier: Tier,
        tag: Option<&str>,
        metadata: Metadata,
        scene: Option<SceneId>,
    ) -> Self {
        let tag = tag
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| tier.as_str().to_string());

        Self {
            id,
            text: text.into(),
            tier,
            tag,
            metadata,
            scene,
            seq: 0,
            created_at: now(),
        }
    }

    /// Whether this piece can share a chunk with the given signature.
    /// Scene equality is strict: scene-less and scene-scoped never mix.
    pub fn matches_signature(&self, tier: Tier, tag: &str, scene: Option<SceneId>) -> bool {
        self.tier == tier && self.tag == tag && self.scene == scene
    }
}

/// Per-tier usage counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TierStats {
    /// Number of chunks currently owned by the tier
    pub chunk_count: usize,
    /// Total pieces across those chunks
    pub piece_count: usize,
    /// Sum of chunk importance scores
    pub importance_total: f32,
}

/// Store-wide usage counters, for inspection and export
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub global: TierStats,
    pub event: TierStats,
    pub summary: TierStats,
    pub archive: TierStats,
}

impl MemoryStats {
    /// Total chunk count across all tiers
    pub fn total_chunks(&self) -> usize {
        self.global.chunk_count
            + self.event.chunk_count
            + self.summary.chunk_count
            + self.archive.chunk_count
    }

    /// Total piece count across all tiers
    pub fn total_pieces(&self) -> usize {
        self.global.piece_count
            + self.event.piece_count
            + self.summary.piece_count
            + self.archive.piece_count
    }
}
