//! Per-tier sub-store
//!
//! TigerStyle: Arena-by-id ownership. Each tier owns its chunks in a map,
//! keeps an append-only piece log (the overlap source), and maintains a
//! lexical and a vector index over the current chunk set. The three must
//! always agree — a chunk visible in the map but absent from an index is a
//! fatal invariant violation, not a recoverable state.
//!
//! Chunk ids come from the store-level allocator, never from here: a chunk
//! migrating between tiers keeps one identity.

use crate::chunk::Chunk;
use crate::config::{MemoryConfig, RetrievalConfig, SCORE_EPSILON, VECTOR_CANDIDATE_FACTOR};
use crate::embedder::Embedder;
use crate::error::{MemoryError, MemoryResult};
use crate::lexical::LexicalIndex;
use crate::tokenizer::tokenize;
use crate::types::{
    ChunkId, IdAllocator, Metadata, Piece, SceneId, Tier, TierStats, TAG_CONVERSATION,
};
use crate::vector::VectorIndex;
use std::collections::HashMap;
use tracing::{debug, info};

/// Epsilon added to nearest-neighbor distances before inversion
const SIMILARITY_EPSILON: f32 = 1e-9;

/// One tier's chunk population and indexes
#[derive(Debug)]
pub struct TierStore {
    tier: Tier,
    /// Owned chunks by id
    chunks: HashMap<ChunkId, Chunk>,
    /// Every piece ever routed to this tier, in write order. Used only to
    /// seed overlap context for new chunks; migration does not prune it.
    piece_log: Vec<Piece>,
    lexical: LexicalIndex,
    vector: VectorIndex,
    /// Ordered conversation chunk ids per scene (Event tier only); drives
    /// intra-scene dialogue recency. Migrated ids stay in the log so turn
    /// counting keeps moving forward.
    conversation_log: HashMap<SceneId, Vec<ChunkId>>,
    /// Next per-tier piece sequence index
    next_seq: u64,
}

impl TierStore {
    /// Create an empty store for one tier
    pub fn new(tier: Tier, dimension: usize) -> Self {
        Self {
            tier,
            chunks: HashMap::new(),
            piece_log: Vec::new(),
            lexical: LexicalIndex::new(),
            vector: VectorIndex::new(dimension),
            conversation_log: HashMap::new(),
            next_seq: 0,
        }
    }

    /// The tier this store owns
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Number of chunks currently owned
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Look up a chunk by id
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    /// Iterate over all owned chunks (unordered)
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Usage counters for this tier
    pub fn stats(&self) -> TierStats {
        TierStats {
            chunk_count: self.chunks.len(),
            piece_count: self.chunks.values().map(Chunk::piece_count).sum(),
            importance_total: self.chunks.values().map(|c| c.importance).sum(),
        }
    }

    /// Route a piece into this tier: merge into the most recent matching
    /// chunk when it has room, otherwise open a new chunk seeded with
    /// trailing matching context from the piece log.
    ///
    /// Returns the id of the newly created chunk, or `None` when the piece
    /// merged into an existing one.
    pub async fn add_piece(
        &mut self,
        piece: Piece,
        ids: &mut IdAllocator,
        embedder: &dyn Embedder,
        config: &MemoryConfig,
    ) -> MemoryResult<Option<ChunkId>> {
        debug_assert_eq!(piece.tier, self.tier, "piece routed to wrong tier");
        let piece = self.log_piece(piece);

        // Most recently created chunk with a matching signature. Chunk ids
        // are monotonic in creation order, so max id = most recent.
        let target = self
            .chunks
            .values()
            .filter(|c| c.matches_signature(piece.tier, &piece.tag, piece.scene))
            .map(|c| c.id)
            .max();

        if let Some(chunk_id) = target {
            let mut merged_text = None;
            if let Some(chunk) = self.chunks.get_mut(&chunk_id) {
                if chunk.try_append(piece.clone()) {
                    merged_text = Some(chunk.text.clone());
                }
            }

            if let Some(text) = merged_text {
                // Re-embed and update both indexes in place before the
                // write returns: no staleness window.
                let embedding = embedder.embed(&text).await?;
                if let Some(chunk) = self.chunks.get_mut(&chunk_id) {
                    chunk.set_embedding(embedding.clone());
                }
                self.vector.insert(chunk_id, embedding);

                let tokens = self.document_tokens(&text);
                if !self.lexical.replace(chunk_id, tokens) {
                    return Err(MemoryError::IndexDesync {
                        tier: self.tier.as_str(),
                        chunk_id: chunk_id.raw(),
                        detail: "chunk in map but missing from lexical index",
                    });
                }
                self.lexical.rebuild();

                debug!(tier = %self.tier, chunk = %chunk_id, piece = %piece.id, "merged piece into chunk");
                return Ok(None);
            }
            // Full chunk: the normal signal to open a new one.
        }

        // Seed the new chunk with up to `overlap` immediately preceding
        // pieces of the same signature, walking backward and stopping at
        // the first non-matching piece. Keeps a dialogue line next to the
        // line it answers even across a chunk boundary.
        let overlap = config.overlap();
        let mut seed: Vec<Piece> = Vec::new();
        for prev in self.piece_log[..self.piece_log.len() - 1].iter().rev() {
            if seed.len() >= overlap
                || !prev.matches_signature(piece.tier, &piece.tag, piece.scene)
            {
                break;
            }
            seed.push(prev.clone());
        }
        seed.reverse();

        let tag = piece.tag.clone();
        let scene = piece.scene;
        let metadata = piece.metadata.clone();
        seed.push(piece);

        let chunk_id = self
            .create_chunk(seed, tag, scene, metadata, ids, embedder, config)
            .await?;
        Ok(Some(chunk_id))
    }

    /// Atomic write path: always a fresh single-piece chunk, no merge, no
    /// overlap. For discrete facts that must not concatenate with
    /// neighbors.
    pub async fn add_atomic(
        &mut self,
        piece: Piece,
        ids: &mut IdAllocator,
        embedder: &dyn Embedder,
        config: &MemoryConfig,
    ) -> MemoryResult<ChunkId> {
        debug_assert_eq!(piece.tier, self.tier, "piece routed to wrong tier");
        let piece = self.log_piece(piece);

        let tag = piece.tag.clone();
        let scene = piece.scene;
        let metadata = piece.metadata.clone();
        self.create_chunk(vec![piece], tag, scene, metadata, ids, embedder, config)
            .await
    }

    /// Take ownership of a chunk migrated from another tier. The chunk is
    /// inserted as-is — id and piece list preserved, no merge/overlap.
    /// The lexical document is staged; callers rebuild once per migration
    /// batch via [`TierStore::rebuild_lexical`].
    pub fn insert_migrated(&mut self, chunk: Chunk) -> MemoryResult<()> {
        assert_eq!(
            chunk.tier, self.tier,
            "migrated chunk must be rewritten to the receiving tier first"
        );

        let chunk_id = chunk.id;
        if self.chunks.contains_key(&chunk_id) {
            return Err(MemoryError::IndexDesync {
                tier: self.tier.as_str(),
                chunk_id: chunk_id.raw(),
                detail: "migrated chunk id already present in receiving tier",
            });
        }

        let tokens = self.document_tokens(&chunk.text);
        self.lexical.insert(chunk_id, tokens);
        self.vector.insert(chunk_id, chunk.embedding.clone());
        self.chunks.insert(chunk_id, chunk);

        debug!(tier = %self.tier, chunk = %chunk_id, "accepted migrated chunk");
        Ok(())
    }

    /// Remove a chunk from this tier: map entry, vector entry, and lexical
    /// document. The lexical statistics stay staged; callers rebuild once
    /// per migration batch.
    pub fn remove_chunk(&mut self, chunk_id: ChunkId) -> MemoryResult<Chunk> {
        let chunk = self
            .chunks
            .remove(&chunk_id)
            .ok_or(MemoryError::ChunkNotFound {
                tier: self.tier.as_str(),
                chunk_id: chunk_id.raw(),
            })?;

        if !self.vector.remove(chunk_id) {
            return Err(MemoryError::IndexDesync {
                tier: self.tier.as_str(),
                chunk_id: chunk_id.raw(),
                detail: "chunk in map but missing from vector index",
            });
        }
        if !self.lexical.remove(chunk_id) {
            return Err(MemoryError::IndexDesync {
                tier: self.tier.as_str(),
                chunk_id: chunk_id.raw(),
                detail: "chunk in map but missing from lexical index",
            });
        }

        info!(tier = %self.tier, chunk = %chunk_id, "removed chunk");
        Ok(chunk)
    }

    /// Recompute lexical corpus statistics after staged mutations
    pub fn rebuild_lexical(&mut self) {
        self.lexical.rebuild();
    }

    /// Score every chunk in this tier against the query and return the
    /// ranked top-k as `(final_score, chunk_id)` pairs, best first.
    ///
    /// Importance reinforcement is the caller's second step, via
    /// [`TierStore::reinforce`], so retrieval itself stays read-only.
    pub async fn retrieve(
        &self,
        query: &str,
        current_scene: Option<SceneId>,
        embedder: &dyn Embedder,
        config: &MemoryConfig,
    ) -> MemoryResult<Vec<(f32, ChunkId)>> {
        self.verify_consistency()?;
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let retrieval = &config.retrieval;
        let bm25_scores = self.lexical.scores(&tokenize(query));

        // Candidates are fetched generously so chunks with weak lexical
        // affinity but strong semantic affinity are not starved.
        let query_embedding = embedder.embed(query).await?;
        let candidates = retrieval.top_k * VECTOR_CANDIDATE_FACTOR;
        let mut similarity: HashMap<ChunkId, f32> = HashMap::new();
        for (chunk_id, distance) in self.vector.search(&query_embedding, candidates) {
            similarity.insert(chunk_id, 1.0 / (distance + SIMILARITY_EPSILON));
        }

        let mut ranked: Vec<(f32, ChunkId)> = Vec::new();
        for (chunk_id, chunk) in &self.chunks {
            let bm25 = bm25_scores.get(chunk_id).copied().unwrap_or(0.0);
            let sim = similarity.get(chunk_id).copied().unwrap_or(0.0);
            let base = retrieval.bm25_weight * bm25
                + retrieval.vector_weight * sim
                + retrieval.importance_weight * chunk.importance;
            if base <= SCORE_EPSILON {
                continue;
            }

            let mut score = base
                * config.weights.tier_weight(self.tier)
                * config.weights.tag_weight(&chunk.tag);

            // Inter-scene recency. Global facts are setting, not events;
            // they do not decay with scene distance.
            if self.tier != Tier::Global {
                if let (Some(current), Some(scene)) = (current_scene, chunk.scene) {
                    if scene != current {
                        let distance = current.distance(scene) as f32;
                        score *= 1.0 / (1.0 + retrieval.scene_decay * distance);
                    }
                }
            }

            // Intra-scene dialogue recency: same-scene conversation decays
            // with turns elapsed, floored so it never vanishes entirely.
            if self.tier == Tier::Event && chunk.tag == TAG_CONVERSATION {
                if let (Some(current), Some(scene)) = (current_scene, chunk.scene) {
                    if scene == current {
                        let turns_ago = self.turns_ago(current, *chunk_id);
                        if turns_ago > 0 {
                            let decay = 1.0 / (1.0 + retrieval.turn_decay * turns_ago as f32);
                            score *= decay.max(retrieval.turn_decay_floor);
                        }
                    }
                }
            }

            ranked.push((score, *chunk_id));
        }

        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        ranked.truncate(retrieval.top_k);

        debug!(tier = %self.tier, results = ranked.len(), "tier retrieval complete");
        Ok(ranked)
    }

    /// Reinforce the importance of chunks that survived truncation. Makes
    /// frequently retrieved chunks progressively easier to retrieve again;
    /// unbounded unless a cumulative cap is configured.
    pub fn reinforce(&mut self, ranked: &[(f32, ChunkId)], retrieval: &RetrievalConfig) {
        for (score, chunk_id) in ranked {
            if let Some(chunk) = self.chunks.get_mut(chunk_id) {
                let increment =
                    score.min(retrieval.importance_increment_cap) * retrieval.importance_gain;
                chunk.importance += increment;
                if let Some(cap) = retrieval.importance_total_cap {
                    chunk.importance = chunk.importance.min(cap);
                }
            }
        }
    }

    /// Conversation chunks appended to the scene's log since this chunk.
    /// Unknown chunks and scenes count as zero turns ago.
    pub fn turns_ago(&self, scene: SceneId, chunk_id: ChunkId) -> usize {
        match self.conversation_log.get(&scene) {
            Some(log) => match log.iter().position(|id| *id == chunk_id) {
                Some(index) => log.len() - 1 - index,
                None => 0,
            },
            None => 0,
        }
    }

    /// Check that the chunk map and both indexes agree. A mismatch can
    /// only come from an implementation bug; the caller aborts.
    pub fn verify_consistency(&self) -> MemoryResult<()> {
        for chunk_id in self.chunks.keys() {
            if !self.vector.contains(*chunk_id) {
                return Err(MemoryError::IndexDesync {
                    tier: self.tier.as_str(),
                    chunk_id: chunk_id.raw(),
                    detail: "chunk in map but missing from vector index",
                });
            }
            if !self.lexical.contains(*chunk_id) {
                return Err(MemoryError::IndexDesync {
                    tier: self.tier.as_str(),
                    chunk_id: chunk_id.raw(),
                    detail: "chunk in map but missing from lexical index",
                });
            }
        }
        for chunk_id in self.vector.ids() {
            if !self.chunks.contains_key(&chunk_id) {
                return Err(MemoryError::IndexDesync {
                    tier: self.tier.as_str(),
                    chunk_id: chunk_id.raw(),
                    detail: "vector index entry without chunk",
                });
            }
        }
        for chunk_id in self.lexical.ids() {
            if !self.chunks.contains_key(&chunk_id) {
                return Err(MemoryError::IndexDesync {
                    tier: self.tier.as_str(),
                    chunk_id: chunk_id.raw(),
                    detail: "lexical index entry without chunk",
                });
            }
        }
        Ok(())
    }

    /// Assign the tier-local sequence index and record the piece in the
    /// overlap log.
    fn log_piece(&mut self, mut piece: Piece) -> Piece {
        piece.seq = self.next_seq;
        self.next_seq += 1;
        self.piece_log.push(piece.clone());
        piece
    }

    /// Lexical document terms: the text prefixed with the tier name, so
    /// the tier itself is a searchable term.
    fn document_tokens(&self, text: &str) -> Vec<String> {
        tokenize(&format!("{}:{}", self.tier, text))
    }

    async fn create_chunk(
        &mut self,
        pieces: Vec<Piece>,
        tag: String,
        scene: Option<SceneId>,
        metadata: Metadata,
        ids: &mut IdAllocator,
        embedder: &dyn Embedder,
        config: &MemoryConfig,
    ) -> MemoryResult<ChunkId> {
        let chunk_id = ids.next_chunk_id();
        let mut chunk = Chunk::new(
            chunk_id,
            pieces,
            self.tier,
            tag,
            scene,
            metadata,
            config.chunk_limits(),
        );

        let embedding = embedder.embed(&chunk.text).await?;
        chunk.set_embedding(embedding.clone());

        let tokens = self.document_tokens(&chunk.text);
        self.lexical.insert(chunk_id, tokens);
        self.lexical.rebuild();
        self.vector.insert(chunk_id, embedding);

        if self.tier == Tier::Event && chunk.tag == TAG_CONVERSATION {
            if let Some(scene) = chunk.scene {
                self.conversation_log.entry(scene).or_default().push(chunk_id);
            }
        }

        info!(
            tier = %self.tier,
            chunk = %chunk_id,
            pieces = chunk.piece_count(),
            tag = %chunk.tag,
            "created chunk"
        );
        self.chunks.insert(chunk_id, chunk);
        Ok(chunk_id)
    }
}
