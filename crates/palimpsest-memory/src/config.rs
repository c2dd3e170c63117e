//! Engine configuration and ranking weight tables
//!
//! TigerStyle: Everything validated once at construction, not trusted per
//! call. Weight tables are data, not code — tag weights are an open string
//! map so deployments can re-weight their own tag vocabulary.

use crate::chunk::{ChunkLimits, CHUNK_PIECES_MAX_DEFAULT, CHUNK_TEXT_LEN_MAX_DEFAULT};
use crate::error::{MemoryError, MemoryResult};
use crate::types::{Tier, ARCHIVED_TAG_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default overlap carried into a freshly opened chunk
pub const CHUNK_OVERLAP_PIECES_DEFAULT: usize = 1;

/// Default number of Event chunks summarized per batch
pub const SUMMARY_BATCH_SIZE_DEFAULT: usize = 5;

/// Default result count per tier
pub const RETRIEVE_TOP_K_DEFAULT: usize = 5;

/// Vector candidates are fetched this many times over `top_k` so chunks
/// with weak lexical but strong semantic affinity are not starved
pub const VECTOR_CANDIDATE_FACTOR: usize = 5;

/// Scores at or below this are dropped before weighting
pub const SCORE_EPSILON: f32 = 1e-6;

/// Tag weight applied to unlisted `archived_*` tags
pub const ARCHIVED_TAG_WEIGHT_FALLBACK: f32 = 0.1;

/// Ranking parameters for the retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned per tier
    pub top_k: usize,
    /// Weight of the BM25 lexical score
    pub bm25_weight: f32,
    /// Weight of the vector similarity score
    pub vector_weight: f32,
    /// Weight of accumulated chunk importance
    pub importance_weight: f32,
    /// Inter-scene recency: `1 / (1 + scene_decay * scene_distance)`
    pub scene_decay: f32,
    /// Intra-scene dialogue recency: `1 / (1 + turn_decay * turns_ago)`
    pub turn_decay: f32,
    /// Floor for the intra-scene factor; old same-scene dialogue decays
    /// but never to zero
    pub turn_decay_floor: f32,
    /// Importance gained per retrieval: `min(score, increment_cap) * gain`
    pub importance_gain: f32,
    /// Cap on the per-retrieval increment
    pub importance_increment_cap: f32,
    /// Optional cap on cumulative importance. `None` leaves the
    /// reinforcement loop unbounded: repeated identical queries keep
    /// inflating the same chunks.
    pub importance_total_cap: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: RETRIEVE_TOP_K_DEFAULT,
            bm25_weight: 0.3,
            vector_weight: 0.5,
            importance_weight: 0.2,
            scene_decay: 0.25,
            turn_decay: 0.005,
            turn_decay_floor: 0.2,
            importance_gain: 0.05,
            importance_increment_cap: 10.0,
            importance_total_cap: None,
        }
    }
}

impl RetrievalConfig {
    fn validate(&self) -> MemoryResult<()> {
        if self.top_k == 0 {
            return Err(MemoryError::InvalidConfig {
                reason: "top_k must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("bm25_weight", self.bm25_weight),
            ("vector_weight", self.vector_weight),
            ("importance_weight", self.importance_weight),
            ("scene_decay", self.scene_decay),
            ("turn_decay", self.turn_decay),
            ("importance_gain", self.importance_gain),
            ("importance_increment_cap", self.importance_increment_cap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MemoryError::InvalidConfig {
                    reason: format!("{name} must be finite and non-negative, got {value}"),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.turn_decay_floor) {
            return Err(MemoryError::InvalidConfig {
                reason: format!(
                    "turn_decay_floor must be within [0, 1], got {}",
                    self.turn_decay_floor
                ),
            });
        }
        if let Some(cap) = self.importance_total_cap {
            if !cap.is_finite() || cap < 0.0 {
                return Err(MemoryError::InvalidConfig {
                    reason: format!("importance_total_cap must be finite and non-negative, got {cap}"),
                });
            }
        }
        Ok(())
    }
}

/// Static tier/tag priority tables applied on top of the base score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightTable {
    tier_weights: HashMap<Tier, f32>,
    tag_weights: HashMap<String, f32>,
}

impl Default for WeightTable {
    fn default() -> Self {
        let tag_weights = [
            // global tier
            ("profile", 1.5),
            ("scene_init", 1.3),
            ("scene_objective", 1.4),
            // event tier
            ("conversation", 1.0),
            ("action", 1.0),
            ("thought", 1.0),
            // summary tier
            ("summary_conversation", 1.2),
            ("summary_scene_init", 1.1),
            ("summary_scene_objective", 1.3),
            // archive tier
            ("archived_conversation", 0.2),
            ("archived_scene_init", 0.1),
            ("archived_scene_objective", 0.1),
        ]
        .into_iter()
        .map(|(tag, weight)| (tag.to_string(), weight))
        .collect();

        Self {
            tier_weights: Tier::ALL.into_iter().map(|t| (t, 1.0)).collect(),
            tag_weights,
        }
    }
}

impl WeightTable {
    /// Weight of a tier; unlisted tiers weigh 1.0
    pub fn tier_weight(&self, tier: Tier) -> f32 {
        self.tier_weights.get(&tier).copied().unwrap_or(1.0)
    }

    /// Weight of a tag. Unlisted tags weigh 1.0, except archived tags,
    /// which fall back near zero so demoted memories stay demoted even
    /// when their tag was never listed.
    pub fn tag_weight(&self, tag: &str) -> f32 {
        match self.tag_weights.get(tag) {
            Some(weight) => *weight,
            None if tag.starts_with(ARCHIVED_TAG_PREFIX) => ARCHIVED_TAG_WEIGHT_FALLBACK,
            None => 1.0,
        }
    }

    /// Override a tier weight
    pub fn set_tier_weight(&mut self, tier: Tier, weight: f32) {
        self.tier_weights.insert(tier, weight);
    }

    /// Override a tag weight
    pub fn set_tag_weight(&mut self, tag: impl Into<String>, weight: f32) {
        self.tag_weights.insert(tag.into(), weight);
    }

    fn validate(&self) -> MemoryResult<()> {
        for (tier, weight) in &self.tier_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(MemoryError::InvalidConfig {
                    reason: format!("tier weight for {tier} must be finite and non-negative"),
                });
            }
        }
        for (tag, weight) in &self.tag_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(MemoryError::InvalidConfig {
                    reason: format!("tag weight for '{tag}' must be finite and non-negative"),
                });
            }
        }
        Ok(())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum pieces per chunk
    pub max_pieces: usize,
    /// Pieces of preceding context carried into a freshly opened chunk;
    /// clamped to `max_pieces - 1`
    pub overlap_pieces: usize,
    /// Maximum concatenated chunk text length in bytes
    pub max_text_len: usize,
    /// Event chunks summarized per summary batch
    pub summary_batch_size: usize,
    /// Ranking parameters
    pub retrieval: RetrievalConfig,
    /// Tier/tag priority tables
    pub weights: WeightTable,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_pieces: CHUNK_PIECES_MAX_DEFAULT,
            overlap_pieces: CHUNK_OVERLAP_PIECES_DEFAULT,
            max_text_len: CHUNK_TEXT_LEN_MAX_DEFAULT,
            summary_batch_size: SUMMARY_BATCH_SIZE_DEFAULT,
            retrieval: RetrievalConfig::default(),
            weights: WeightTable::default(),
        }
    }
}

impl MemoryConfig {
    /// Validate the whole configuration. Run once at store construction.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.max_pieces == 0 {
            return Err(MemoryError::InvalidConfig {
                reason: "max_pieces must be at least 1".to_string(),
            });
        }
        if self.max_text_len == 0 {
            return Err(MemoryError::InvalidConfig {
                reason: "max_text_len must be at least 1".to_string(),
            });
        }
        if self.summary_batch_size == 0 {
            return Err(MemoryError::InvalidConfig {
                reason: "summary_batch_size must be at least 1".to_string(),
            });
        }
        self.retrieval.validate()?;
        self.weights.validate()
    }

    /// Effective overlap after clamping to `max_pieces - 1`
    pub fn overlap(&self) -> usize {
        self.overlap_pieces.min(self.max_pieces.saturating_sub(1))
    }

    /// Capacity limits handed to new chunks
    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_pieces: self.max_pieces,
            max_text_len: self.max_text_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MemoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overlap_clamped() {
        let config = MemoryConfig {
            max_pieces: 3,
            overlap_pieces: 10,
            ..MemoryConfig::default()
        };
        assert_eq!(config.overlap(), 2);

        let single = MemoryConfig {
            max_pieces: 1,
            overlap_pieces: 2,
            ..MemoryConfig::default()
        };
        assert_eq!(single.overlap(), 0);
    }

    #[test]
    fn test_zero_max_pieces_rejected() {
        let config = MemoryConfig {
            max_pieces: 0,
            ..MemoryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MemoryError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = MemoryConfig::default();
        config.retrieval.bm25_weight = -0.5;
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.weights.set_tag_weight("profile", f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_turn_decay_floor_range() {
        let mut config = MemoryConfig::default();
        config.retrieval.turn_decay_floor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tag_weight_lookup() {
        let weights = WeightTable::default();
        assert!((weights.tag_weight("profile") - 1.5).abs() < 1e-6);
        // Unknown live tags are neutral.
        assert!((weights.tag_weight("rumor") - 1.0).abs() < 1e-6);
        // Unknown archived tags stay demoted.
        assert!((weights.tag_weight("archived_rumor") - ARCHIVED_TAG_WEIGHT_FALLBACK).abs() < 1e-6);
        // Listed archived tags use their listed weight.
        assert!((weights.tag_weight("archived_conversation") - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_total_importance_cap_validation() {
        let mut config = MemoryConfig::default();
        config.retrieval.importance_total_cap = Some(-1.0);
        assert!(config.validate().is_err());

        config.retrieval.importance_total_cap = Some(50.0);
        assert!(config.validate().is_ok());
    }
}
