//! BM25 lexical index over chunk documents
//!
//! TigerStyle: Explicit rebuild. Mutations stage the document list and mark
//! the corpus statistics dirty; `rebuild` recomputes them wholesale. Tiers
//! stay small after archival, so rebuilding on every mutation is the
//! intended policy — write paths call `rebuild` immediately, migration
//! batches defer it until the whole batch has moved.

use crate::types::ChunkId;
use std::collections::HashMap;

/// BM25 term-frequency saturation parameter
pub const BM25_K1: f32 = 1.5;

/// BM25 document-length normalization parameter
pub const BM25_B: f32 = 0.75;

/// Lexical index: one tokenized document per chunk
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    /// Documents in insertion order
    docs: Vec<(ChunkId, Vec<String>)>,
    /// Chunk id -> position in `docs`
    positions: HashMap<ChunkId, usize>,
    /// Number of documents containing each term (derived)
    doc_freq: HashMap<String, usize>,
    /// Average document length in tokens (derived)
    avg_doc_len: f32,
    /// Derived statistics out of date
    dirty: bool,
}

impl LexicalIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index holds no documents
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Whether a chunk has a document in the index
    pub fn contains(&self, id: ChunkId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Ids of all indexed documents, in insertion order
    pub fn ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.docs.iter().map(|(id, _)| *id)
    }

    /// Stage a new document. The id must not already be indexed.
    pub fn insert(&mut self, id: ChunkId, tokens: Vec<String>) {
        assert!(
            !self.positions.contains_key(&id),
            "chunk {} already indexed",
            id
        );
        self.positions.insert(id, self.docs.len());
        self.docs.push((id, tokens));
        self.dirty = true;
    }

    /// Stage a replacement for an existing document. Returns false when the
    /// id was never indexed.
    pub fn replace(&mut self, id: ChunkId, tokens: Vec<String>) -> bool {
        match self.positions.get(&id) {
            Some(&pos) => {
                self.docs[pos].1 = tokens;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Stage removal of a document. Returns false when the id was never
    /// indexed.
    pub fn remove(&mut self, id: ChunkId) -> bool {
        match self.positions.remove(&id) {
            Some(pos) => {
                self.docs.remove(pos);
                for (i, (doc_id, _)) in self.docs.iter().enumerate().skip(pos) {
                    self.positions.insert(*doc_id, i);
                }
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Recompute document frequencies and average length from the staged
    /// document list.
    pub fn rebuild(&mut self) {
        self.doc_freq.clear();
        let mut total_len = 0usize;

        for (_, tokens) in &self.docs {
            total_len += tokens.len();
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *self.doc_freq.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        self.avg_doc_len = if self.docs.is_empty() {
            0.0
        } else {
            total_len as f32 / self.docs.len() as f32
        };
        self.dirty = false;
    }

    /// BM25 Okapi score of every indexed document against the query.
    ///
    /// Documents that share no term with the query score 0 and are omitted.
    pub fn scores(&self, query: &[String]) -> HashMap<ChunkId, f32> {
        debug_assert!(!self.dirty, "lexical index queried without rebuild");

        let mut out = HashMap::new();
        if query.is_empty() || self.docs.is_empty() {
            return out;
        }

        let n_docs = self.docs.len() as f32;
        let mut unique_query: Vec<&str> = query.iter().map(String::as_str).collect();
        unique_query.sort_unstable();
        unique_query.dedup();

        for (id, tokens) in &self.docs {
            let doc_len = tokens.len() as f32;
            let mut tf: HashMap<&str, f32> = HashMap::new();
            for token in tokens {
                *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
            }

            let mut score = 0.0f32;
            for term in &unique_query {
                let freq = match tf.get(term) {
                    Some(&f) => f,
                    None => continue,
                };
                let df = *self.doc_freq.get(*term).unwrap_or(&1) as f32;
                let idf = ((n_docs - df + 0.5) / (df + 0.5)).ln().max(0.0) + 1.0;
                let denom =
                    freq + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / self.avg_doc_len.max(1e-6));
                score += idf * freq * (BM25_K1 + 1.0) / denom.max(1e-6);
            }

            if score > 0.0 {
                out.insert(*id, score);
            }
        }

        out
    }
}
