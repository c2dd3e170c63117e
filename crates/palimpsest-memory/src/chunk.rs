//! Chunks: the retrievable unit of memory
//!
//! TigerStyle: Capacity-bounded piece groups with an explicit text
//! invariant — a chunk's text is always its pieces' trimmed texts joined
//! in insertion order, and the cached embedding always belongs to that
//! exact text (every append re-embeds before the write returns).

use crate::types::{ChunkId, Metadata, Piece, SceneId, Tier};
use serde::{Deserialize, Serialize};

/// Default maximum pieces per chunk
pub const CHUNK_PIECES_MAX_DEFAULT: usize = 5;

/// Default maximum concatenated text length per chunk, in bytes
pub const CHUNK_TEXT_LEN_MAX_DEFAULT: usize = 800;

/// Soft capacity limits of a chunk
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkLimits {
    /// Maximum piece count
    pub max_pieces: usize,
    /// Maximum concatenated text length in bytes
    pub max_text_len: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_pieces: CHUNK_PIECES_MAX_DEFAULT,
            max_text_len: CHUNK_TEXT_LEN_MAX_DEFAULT,
        }
    }
}

/// A capacity-bounded, ordered group of pieces scored and returned as one
/// retrieval unit.
///
/// Created by a tier store when no existing chunk can absorb an incoming
/// piece (or directly, through the atomic path). Mutated by piece appends
/// and by migration; removed from its tier exactly once, at migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique id, assigned by the memory store
    pub id: ChunkId,
    /// Owned pieces, in insertion order
    pub pieces: Vec<Piece>,
    /// Concatenated piece text (invariant: join of `pieces` in order)
    pub text: String,
    /// Owning tier; rewritten on migration
    pub tier: Tier,
    /// Tag; gains the `archived_` prefix on migration
    pub tag: String,
    /// Scene association shared by all pieces
    pub scene: Option<SceneId>,
    /// Free-form metadata (taken from the seeding piece)
    pub metadata: Metadata,
    /// Cached embedding of `text`
    pub embedding: Vec<f32>,
    /// Accumulated retrieval reinforcement, monotonically non-decreasing
    /// unless a cumulative cap is configured
    pub importance: f32,
    limits: ChunkLimits,
}

impl Chunk {
    /// Create a chunk from its seeding pieces. The embedding starts empty;
    /// the tier store computes and sets it before indexing.
    pub fn new(
        id: ChunkId,
        pieces: Vec<Piece>,
        tier: Tier,
        tag: impl Into<String>,
        scene: Option<SceneId>,
        metadata: Metadata,
        limits: ChunkLimits,
    ) -> Self {
        assert!(!pieces.is_empty(), "a chunk owns at least one piece");
        let text = join_pieces(&pieces);
        Self {
            id,
            pieces,
            text,
            tier,
            tag: tag.into(),
            scene,
            metadata,
            embedding: Vec::new(),
            importance: 0.0,
            limits,
        }
    }

    /// Number of owned pieces
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// The chunk's capacity limits
    pub fn limits(&self) -> ChunkLimits {
        self.limits
    }

    /// Whether this chunk can absorb a piece with the given signature.
    /// Scene equality is strict: a scene-less chunk never takes a
    /// scene-scoped piece and vice versa.
    pub fn matches_signature(&self, tier: Tier, tag: &str, scene: Option<SceneId>) -> bool {
        self.tier == tier && self.tag == tag && self.scene == scene
    }

    /// Whether appending text of the given length would stay within the
    /// capacity limits.
    pub fn has_capacity_for(&self, text_len: usize) -> bool {
        self.pieces.len() < self.limits.max_pieces
            && self.text.len() + text_len + 1 <= self.limits.max_text_len
    }

    /// Append a piece if capacity allows. Returns false when the chunk is
    /// full — the normal signal for the caller to open a new chunk, never
    /// an error. On success the text invariant is re-derived; the caller
    /// must re-embed before the chunk is visible to retrieval again.
    pub fn try_append(&mut self, piece: Piece) -> bool {
        if !self.has_capacity_for(piece.text.trim().len()) {
            return false;
        }
        self.pieces.push(piece);
        self.text = join_pieces(&self.pieces);
        true
    }

    /// Replace the cached embedding
    pub fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = embedding;
    }

    /// Render the chunk for prompt assembly. A `character` metadata entry
    /// attributes the memory to that character.
    pub fn render(&self) -> String {
        let scene = self
            .scene
            .map(|s| s.to_string())
            .unwrap_or_else(|| "global".to_string());

        match self.metadata.get("character").and_then(|v| v.as_str()) {
            Some(character) => format!(
                "{}'s {} memory in {}:\n{}",
                character, self.tag, scene, self.text
            ),
            None => format!("{} memory in {}:\n{}", self.tag, scene, self.text),
        }
    }
}

/// Join piece texts in insertion order, one line per piece
fn join_pieces(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}
