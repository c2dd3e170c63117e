//! Embedding provider boundary
//!
//! TigerStyle: Trait-based embedder with explicit dimension constraints.
//! The engine treats embedding as an external collaborator: deterministic
//! for a given text, fixed dimension per deployment. The deterministic
//! mock maps tokens into dimension buckets, so texts sharing vocabulary
//! genuinely land near each other — close enough semantics for tests
//! without a model download.

use crate::error::MemoryResult;
use crate::tokenizer::tokenize;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default dimension of the mock embedder
pub const EMBEDDING_DIM_DEFAULT: usize = 256;

/// Maps text to a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of produced vectors, fixed per deployment
    fn dimension(&self) -> usize;

    /// Model name or identifier
    fn model_name(&self) -> &str;

    /// Embed a single text. Must be deterministic for a given text.
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;
}

/// Deterministic bag-of-words embedder for tests and offline runs.
///
/// Each token hashes to a dimension bucket; the bucket counts are
/// L2-normalized. Not a semantic model — but overlapping vocabulary
/// produces nearby vectors, which is what the engine's ranking needs
/// exercised.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    /// Create a mock embedder with the given dimension
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "embedding dimension must be positive");
        Self { dimension }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM_DEFAULT)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-bag-of-words"
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dimension;
            embedding[bucket] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        Ok(embedding)
    }
}

/// Local embedding via fastembed ONNX models.
///
/// Requires the `local-embeddings` feature; the default build carries only
/// the trait and the mock.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    model_name: String,
    dimension: usize,
}

#[cfg(feature = "local-embeddings")]
impl std::fmt::Debug for LocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedder")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    /// Initialize a local model. Models are downloaded and cached on first
    /// use.
    pub fn new(model_name: &str) -> MemoryResult<Self> {
        use crate::error::MemoryError;
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let (model_enum, dimension) = match model_name {
            "BAAI/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "BAAI/bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            "BAAI/bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, 1024),
            other => {
                return Err(MemoryError::EmbeddingFailed {
                    reason: format!("unsupported embedding model: {other}"),
                })
            }
        };

        let model = TextEmbedding::try_new(InitOptions::new(model_enum)).map_err(|e| {
            MemoryError::EmbeddingFailed {
                reason: format!("failed to initialize {model_name}: {e}"),
            }
        })?;

        tracing::info!(model = model_name, dimension, "initialized local embedder");

        Ok(Self {
            model: std::sync::Mutex::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        use crate::error::MemoryError;

        let mut model = self.model.lock().map_err(|e| MemoryError::EmbeddingFailed {
            reason: format!("embedder lock poisoned: {e}"),
        })?;

        let mut embeddings =
            model
                .embed(vec![text], None)
                .map_err(|e| MemoryError::EmbeddingFailed {
                    reason: format!("embedding failed: {e}"),
                })?;

        embeddings
            .pop()
            .ok_or_else(|| MemoryError::EmbeddingFailed {
                reason: "model returned no embedding".to_string(),
            })
    }
}
