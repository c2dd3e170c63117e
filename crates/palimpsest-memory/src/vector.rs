//! Flat nearest-neighbor index over chunk embeddings
//!
//! Exact L2 search with an id map. Tier populations stay small after
//! archival, so a linear scan is the whole index; insert under an existing
//! id replaces the stored vector in place.

use crate::types::ChunkId;
use std::collections::HashMap;

/// Euclidean (L2) distance between two vectors of equal length
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Nearest-neighbor structure over chunk embeddings
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    /// Entries in insertion order
    entries: Vec<(ChunkId, Vec<f32>)>,
    /// Chunk id -> position in `entries`
    positions: HashMap<ChunkId, usize>,
}

impl VectorIndex {
    /// Create an empty index for vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be positive");
        Self {
            dimension,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// The fixed embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no vectors
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a chunk has a vector in the index
    pub fn contains(&self, id: ChunkId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Ids of all indexed vectors, in insertion order
    pub fn ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Insert a vector under the given id, replacing any existing vector
    /// for that id (remove-then-reinsert semantics under one identity).
    pub fn insert(&mut self, id: ChunkId, embedding: Vec<f32>) {
        assert_eq!(
            embedding.len(),
            self.dimension,
            "embedding dimension {} does not match index dimension {}",
            embedding.len(),
            self.dimension
        );

        match self.positions.get(&id) {
            Some(&pos) => self.entries[pos].1 = embedding,
            None => {
                self.positions.insert(id, self.entries.len());
                self.entries.push((id, embedding));
            }
        }
    }

    /// Remove the vector stored under the given id. Returns false when the
    /// id was never indexed.
    pub fn remove(&mut self, id: ChunkId) -> bool {
        match self.positions.remove(&id) {
            Some(pos) => {
                self.entries.remove(pos);
                for (i, (entry_id, _)) in self.entries.iter().enumerate().skip(pos) {
                    self.positions.insert(*entry_id, i);
                }
                true
            }
            None => false,
        }
    }

    /// The `k` nearest neighbors of the query, ascending by L2 distance.
    /// Ties break on chunk id for determinism.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(ChunkId, f32)> {
        assert_eq!(
            query.len(),
            self.dimension,
            "query dimension {} does not match index dimension {}",
            query.len(),
            self.dimension
        );

        let mut neighbors: Vec<(ChunkId, f32)> = self
            .entries
            .iter()
            .map(|(id, embedding)| (*id, l2_distance(query, embedding)))
            .collect();

        neighbors.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        neighbors.truncate(k);
        neighbors
    }
}
