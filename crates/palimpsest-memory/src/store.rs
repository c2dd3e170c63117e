//! The memory store: tier routing, id allocation, retrieval, migration
//!
//! TigerStyle: One aggregator owns the four tier stores and the two
//! monotonic counters. Collaborators (embedder, summary model) are
//! injected at construction and live exactly as long as the store — no
//! process-wide singletons. Single-threaded, synchronous-per-call: every
//! write and every retrieval runs to completion, index rebuilds included,
//! before returning.

use crate::chunk::Chunk;
use crate::config::MemoryConfig;
use crate::embedder::Embedder;
use crate::error::{MemoryError, MemoryResult};
use crate::summarizer::{SummarizeReport, SummaryModel};
use crate::tier::TierStore;
use crate::types::{
    ChunkId, IdAllocator, MemoryStats, Metadata, Piece, PieceId, SceneId, Tier,
    ARCHIVED_TAG_PREFIX, LIVE_CONTENT_TAGS, TAG_CONVERSATION,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a piece write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Id assigned to the ingested piece
    pub piece_id: PieceId,
    /// Id of the chunk the write created, when it did not merge
    pub new_chunk: Option<ChunkId>,
}

/// One ranked retrieval result
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Final score after weighting and recency adjustment
    pub score: f32,
    /// Snapshot of the chunk at retrieval time
    pub chunk: Chunk,
}

/// Layered memory store for a single agent session
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    summary_model: Arc<dyn SummaryModel>,
    config: MemoryConfig,
    ids: IdAllocator,
    global: TierStore,
    event: TierStore,
    summary: TierStore,
    archive: TierStore,
}

impl MemoryStore {
    /// Create a store with injected collaborators. The configuration is
    /// validated here, once, and trusted afterwards.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        summary_model: Arc<dyn SummaryModel>,
        config: MemoryConfig,
    ) -> MemoryResult<Self> {
        config.validate()?;
        let dimension = embedder.dimension();

        info!(
            embedder = embedder.model_name(),
            dimension, "initializing memory store"
        );

        Ok(Self {
            global: TierStore::new(Tier::Global, dimension),
            event: TierStore::new(Tier::Event, dimension),
            summary: TierStore::new(Tier::Summary, dimension),
            archive: TierStore::new(Tier::Archive, dimension),
            ids: IdAllocator::new(),
            embedder,
            summary_model,
            config,
        })
    }

    /// Create a store with the default configuration
    pub fn with_defaults(
        embedder: Arc<dyn Embedder>,
        summary_model: Arc<dyn SummaryModel>,
    ) -> MemoryResult<Self> {
        Self::new(embedder, summary_model, MemoryConfig::default())
    }

    /// The active configuration
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Write a piece, routing it to its tier's merge/overlap policy
    pub async fn add_piece(
        &mut self,
        text: &str,
        tier: Tier,
        tag: Option<&str>,
        scene: Option<SceneId>,
    ) -> MemoryResult<AddOutcome> {
        self.add_piece_with_metadata(text, tier, tag, Metadata::new(), scene)
            .await
    }

    /// Write a piece carrying free-form metadata
    pub async fn add_piece_with_metadata(
        &mut self,
        text: &str,
        tier: Tier,
        tag: Option<&str>,
        metadata: Metadata,
        scene: Option<SceneId>,
    ) -> MemoryResult<AddOutcome> {
        let piece_id = self.ids.next_piece_id();
        let piece = Piece::new(piece_id, text, tier, tag, metadata, scene);

        let tier_store = match tier {
            Tier::Global => &mut self.global,
            Tier::Event => &mut self.event,
            Tier::Summary => &mut self.summary,
            Tier::Archive => &mut self.archive,
        };
        let new_chunk = tier_store
            .add_piece(piece, &mut self.ids, self.embedder.as_ref(), &self.config)
            .await?;

        debug!(piece = %piece_id, %tier, ?new_chunk, "piece written");
        Ok(AddOutcome {
            piece_id,
            new_chunk,
        })
    }

    /// Atomic chunk write: a fresh single-piece chunk, bypassing merge and
    /// overlap. For standalone facts like profile statements or scene
    /// objectives.
    pub async fn add_chunk(
        &mut self,
        text: &str,
        tier: Tier,
        tag: Option<&str>,
        scene: Option<SceneId>,
    ) -> MemoryResult<ChunkId> {
        self.add_chunk_with_metadata(text, tier, tag, Metadata::new(), scene)
            .await
    }

    /// Atomic chunk write carrying free-form metadata
    pub async fn add_chunk_with_metadata(
        &mut self,
        text: &str,
        tier: Tier,
        tag: Option<&str>,
        metadata: Metadata,
        scene: Option<SceneId>,
    ) -> MemoryResult<ChunkId> {
        let piece_id = self.ids.next_piece_id();
        let piece = Piece::new(piece_id, text, tier, tag, metadata, scene);

        let tier_store = match tier {
            Tier::Global => &mut self.global,
            Tier::Event => &mut self.event,
            Tier::Summary => &mut self.summary,
            Tier::Archive => &mut self.archive,
        };
        tier_store
            .add_atomic(piece, &mut self.ids, self.embedder.as_ref(), &self.config)
            .await
    }

    /// Query the requested tiers independently. Each tier returns its own
    /// ranked top-k — results are never merged into one cross-tier
    /// ranking. Every chunk that survives truncation gets its importance
    /// reinforced, which biases future retrieval toward it.
    pub async fn retrieve(
        &mut self,
        query: &str,
        tiers: &[Tier],
        current_scene: Option<SceneId>,
    ) -> MemoryResult<HashMap<Tier, Vec<ScoredChunk>>> {
        debug!(query, ?tiers, ?current_scene, "retrieving");

        let embedder = Arc::clone(&self.embedder);
        let retrieval = self.config.retrieval.clone();
        let mut results: HashMap<Tier, Vec<ScoredChunk>> = HashMap::new();

        for &tier in tiers {
            let ranked = self
                .tier_store(tier)
                .retrieve(query, current_scene, embedder.as_ref(), &self.config)
                .await?;

            self.tier_store_mut(tier).reinforce(&ranked, &retrieval);

            let tier_store = self.tier_store(tier);
            let mut scored = Vec::with_capacity(ranked.len());
            for (score, chunk_id) in ranked {
                let chunk =
                    tier_store
                        .chunk(chunk_id)
                        .ok_or(MemoryError::ChunkNotFound {
                            tier: tier.as_str(),
                            chunk_id: chunk_id.raw(),
                        })?;
                scored.push(ScoredChunk {
                    score,
                    chunk: chunk.clone(),
                });
            }
            results.insert(tier, scored);
        }

        Ok(results)
    }

    /// Summarize a completed scene and demote its raw chunks.
    ///
    /// Live Event chunks of the scene are batched in id order (write
    /// order), each batch condensed through the summary model into a
    /// Summary-tier piece, and every summarized chunk migrated into the
    /// Archive tier under an `archived_` tag — id and piece list
    /// unchanged. A failed batch stays in the Event tier and is retried
    /// on the next call; completed batches are not rolled back.
    pub async fn summarize_scene(
        &mut self,
        scene: SceneId,
        summary_tag: &str,
    ) -> MemoryResult<SummarizeReport> {
        let mut live: Vec<ChunkId> = self
            .event
            .chunks()
            .filter(|c| c.scene == Some(scene) && LIVE_CONTENT_TAGS.contains(&c.tag.as_str()))
            .map(|c| c.id)
            .collect();
        live.sort_unstable();

        let mut report = SummarizeReport::default();
        if live.is_empty() {
            info!(%scene, "no live event chunks; nothing to summarize");
            return Ok(report);
        }

        // Snapshot batch texts before any mutation.
        let mut batches: Vec<(Vec<ChunkId>, String)> = Vec::new();
        for batch_ids in live.chunks(self.config.summary_batch_size) {
            let mut texts = Vec::with_capacity(batch_ids.len());
            for chunk_id in batch_ids {
                let chunk = self
                    .event
                    .chunk(*chunk_id)
                    .ok_or(MemoryError::ChunkNotFound {
                        tier: Tier::Event.as_str(),
                        chunk_id: chunk_id.raw(),
                    })?;
                texts.push(chunk.text.clone());
            }
            batches.push((batch_ids.to_vec(), texts.join("\n")));
        }
        report.batches_total = batches.len();

        let summary_model = Arc::clone(&self.summary_model);
        let mut to_migrate: Vec<ChunkId> = Vec::new();

        for (batch_ids, batch_text) in batches {
            match summary_model.summarize(&batch_text).await {
                Ok(summary_text) => {
                    let mut metadata = Metadata::new();
                    metadata.insert(
                        "source_scene_id".to_string(),
                        serde_json::json!(scene.raw()),
                    );
                    metadata.insert(
                        "source_chunk_ids".to_string(),
                        serde_json::json!(batch_ids.iter().map(|id| id.raw()).collect::<Vec<_>>()),
                    );
                    self.add_piece_with_metadata(
                        &summary_text,
                        Tier::Summary,
                        Some(summary_tag),
                        metadata,
                        Some(scene),
                    )
                    .await?;

                    report.batches_summarized += 1;
                    report.summary_pieces += 1;
                    to_migrate.extend(batch_ids);
                }
                Err(error) => {
                    warn!(
                        %scene,
                        chunks = batch_ids.len(),
                        %error,
                        "summary batch failed; chunks stay in event tier for retry"
                    );
                    report.batches_failed += 1;
                }
            }
        }

        // Migrate summarized chunks: erase from the Event arena, rewrite
        // tier/tag, re-embed, insert into the Archive arena as-is.
        for chunk_id in to_migrate {
            // Embed before the move so an embedder failure leaves the
            // chunk where it was.
            let text = self
                .event
                .chunk(chunk_id)
                .ok_or(MemoryError::ChunkNotFound {
                    tier: Tier::Event.as_str(),
                    chunk_id: chunk_id.raw(),
                })?
                .text
                .clone();
            let embedding = self.embedder.embed(&text).await?;

            let mut chunk = self.event.remove_chunk(chunk_id)?;
            chunk.tier = Tier::Archive;
            chunk.tag = format!("{ARCHIVED_TAG_PREFIX}{}", chunk.tag);
            chunk.set_embedding(embedding);
            self.archive.insert_migrated(chunk)?;
            report.chunks_archived += 1;
        }

        // One lexical rebuild per affected store, after the whole batch.
        self.event.rebuild_lexical();
        self.archive.rebuild_lexical();

        info!(
            %scene,
            summaries = report.summary_pieces,
            archived = report.chunks_archived,
            failed_batches = report.batches_failed,
            "scene summarization complete"
        );
        Ok(report)
    }

    /// Bulk-load per-scene dialogue records into a fresh store. The
    /// current scene's dialogue stays live in the Event tier; every other
    /// scene is ingested and immediately summarized and archived.
    pub async fn load_scene_records(
        &mut self,
        records: &BTreeMap<SceneId, Vec<String>>,
        current_scene: SceneId,
        summary_tag: &str,
    ) -> MemoryResult<()> {
        info!(
            scenes = records.len(),
            %current_scene,
            "loading dialogue records"
        );

        for (scene, lines) in records {
            for line in lines {
                self.add_piece(line, Tier::Event, Some(TAG_CONVERSATION), Some(*scene))
                    .await?;
            }
            if *scene != current_scene {
                self.summarize_scene(*scene, summary_tag).await?;
            }
        }
        Ok(())
    }

    /// Look up a chunk anywhere in the store. Ids are unique across
    /// tiers, so at most one tier answers. A miss is a routine probe
    /// result, not an error.
    pub fn get_chunk(&self, chunk_id: ChunkId) -> Option<&Chunk> {
        self.tier_stores()
            .into_iter()
            .find_map(|tier_store| tier_store.chunk(chunk_id))
    }

    /// All chunks across all tiers, ordered by id (write order)
    pub fn all_chunks(&self) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self
            .tier_stores()
            .into_iter()
            .flat_map(|tier_store| tier_store.chunks())
            .collect();
        chunks.sort_by_key(|c| c.id);
        chunks
    }

    /// Usage counters per tier
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            global: self.global.stats(),
            event: self.event.stats(),
            summary: self.summary.stats(),
            archive: self.archive.stats(),
        }
    }

    /// Drop all tiers and counters. The store ends up indistinguishable
    /// from a freshly constructed one; collaborators and configuration
    /// are retained.
    pub fn reset(&mut self) {
        info!("resetting memory store");
        let dimension = self.embedder.dimension();
        self.ids.reset();
        self.global = TierStore::new(Tier::Global, dimension);
        self.event = TierStore::new(Tier::Event, dimension);
        self.summary = TierStore::new(Tier::Summary, dimension);
        self.archive = TierStore::new(Tier::Archive, dimension);
    }

    fn tier_store(&self, tier: Tier) -> &TierStore {
        match tier {
            Tier::Global => &self.global,
            Tier::Event => &self.event,
            Tier::Summary => &self.summary,
            Tier::Archive => &self.archive,
        }
    }

    fn tier_store_mut(&mut self, tier: Tier) -> &mut TierStore {
        match tier {
            Tier::Global => &mut self.global,
            Tier::Event => &mut self.event,
            Tier::Summary => &mut self.summary,
            Tier::Archive => &mut self.archive,
        }
    }

    fn tier_stores(&self) -> [&TierStore; 4] {
        [&self.global, &self.event, &self.summary, &self.archive]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::MockEmbedder;
    use async_trait::async_trait;

    struct EchoSummary;

    #[async_trait]
    impl SummaryModel for EchoSummary {
        async fn summarize(&self, text: &str) -> MemoryResult<String> {
            let first = text.lines().next().unwrap_or_default();
            Ok(format!("Summary: {first}"))
        }
    }

    struct FailingSummary;

    #[async_trait]
    impl SummaryModel for FailingSummary {
        async fn summarize(&self, _text: &str) -> MemoryResult<String> {
            Err(MemoryError::SummarizeFailed {
                reason: "model unavailable".to_string(),
            })
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::with_defaults(Arc::new(MockEmbedder::default()), Arc::new(EchoSummary))
            .unwrap()
    }

    fn scene(raw: u64) -> Option<SceneId> {
        Some(SceneId::from_raw(raw))
    }

    #[tokio::test]
    async fn test_write_routes_and_merges() {
        let mut store = store();

        let first = store
            .add_piece("Hero: Hello!", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
        assert!(first.new_chunk.is_some());

        let second = store
            .add_piece(
                "Wizard: Greetings.",
                Tier::Event,
                Some("conversation"),
                scene(1),
            )
            .await
            .unwrap();
        assert!(second.new_chunk.is_none(), "second piece merges");
        assert!(second.piece_id > first.piece_id);

        let chunk = store.get_chunk(first.new_chunk.unwrap()).unwrap();
        assert_eq!(chunk.text, "Hero: Hello!\nWizard: Greetings.");
    }

    #[tokio::test]
    async fn test_chunk_ids_global_across_tiers() {
        let mut store = store();

        let profile = store
            .add_chunk("Elara is wise.", Tier::Global, Some("profile"), None)
            .await
            .unwrap();
        let event = store
            .add_piece("Hello.", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap()
            .new_chunk
            .unwrap();
        let summary = store
            .add_chunk(
                "The intro.",
                Tier::Summary,
                Some("summary_conversation"),
                scene(1),
            )
            .await
            .unwrap();

        assert_eq!(profile, ChunkId::from_raw(0));
        assert_eq!(event, ChunkId::from_raw(1));
        assert_eq!(summary, ChunkId::from_raw(2));
    }

    #[tokio::test]
    async fn test_get_chunk_probes_all_tiers() {
        let mut store = store();
        let id = store
            .add_chunk("A fact.", Tier::Global, Some("profile"), None)
            .await
            .unwrap();

        assert!(store.get_chunk(id).is_some());
        assert!(store.get_chunk(ChunkId::from_raw(999)).is_none());
    }

    #[tokio::test]
    async fn test_retrieve_reinforces_importance() {
        let mut store = store();
        let chunk_id = store
            .add_piece(
                "The dragon guards the scroll.",
                Tier::Event,
                Some("conversation"),
                scene(1),
            )
            .await
            .unwrap()
            .new_chunk
            .unwrap();

        assert_eq!(store.get_chunk(chunk_id).unwrap().importance, 0.0);

        let results = store
            .retrieve("dragon scroll", &[Tier::Event], scene(1))
            .await
            .unwrap();
        let event_results = &results[&Tier::Event];
        assert_eq!(event_results.len(), 1);
        assert!(event_results[0].score > 0.0);

        let after_one = store.get_chunk(chunk_id).unwrap().importance;
        assert!(after_one > 0.0, "retrieved chunk gains importance");

        store
            .retrieve("dragon scroll", &[Tier::Event], scene(1))
            .await
            .unwrap();
        let after_two = store.get_chunk(chunk_id).unwrap().importance;
        assert!(after_two > after_one, "reinforcement accumulates");
    }

    #[tokio::test]
    async fn test_retrieve_tiers_stay_independent() {
        let mut store = store();
        store
            .add_chunk(
                "The wizard Elara is wise.",
                Tier::Global,
                Some("profile"),
                None,
            )
            .await
            .unwrap();
        store
            .add_piece(
                "Elara: welcome to my tower.",
                Tier::Event,
                Some("conversation"),
                scene(1),
            )
            .await
            .unwrap();

        let results = store
            .retrieve("Elara wizard", &[Tier::Global, Tier::Event], scene(1))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[&Tier::Global]
            .iter()
            .all(|r| r.chunk.tier == Tier::Global));
        assert!(results[&Tier::Event]
            .iter()
            .all(|r| r.chunk.tier == Tier::Event));
    }

    #[tokio::test]
    async fn test_summarize_scene_migrates_chunks() {
        let mut store = store();

        let mut original_ids = Vec::new();
        for line in [
            "Hero: the storm is close.",
            "Wizard: bar the gates.",
            "Hero: what about the villagers?",
        ] {
            let id = store
                .add_chunk(line, Tier::Event, Some("conversation"), scene(1))
                .await
                .unwrap();
            original_ids.push(id);
        }

        let report = store
            .summarize_scene(SceneId::from_raw(1), "summary_conversation")
            .await
            .unwrap();

        assert_eq!(report.batches_total, 1);
        assert_eq!(report.batches_summarized, 1);
        assert_eq!(report.summary_pieces, 1);
        assert_eq!(report.chunks_archived, 3);
        assert!(report.is_complete());

        let stats = store.stats();
        assert_eq!(stats.event.chunk_count, 0);
        assert_eq!(stats.archive.chunk_count, 3);
        assert_eq!(stats.summary.chunk_count, 1);

        // Identity preserved, tier/tag rewritten.
        for id in original_ids {
            let chunk = store.get_chunk(id).unwrap();
            assert_eq!(chunk.tier, Tier::Archive);
            assert_eq!(chunk.tag, "archived_conversation");
            assert_eq!(chunk.piece_count(), 1);
        }

        // The summary records its provenance.
        let summary_chunk = store
            .all_chunks()
            .into_iter()
            .find(|c| c.tier == Tier::Summary)
            .unwrap();
        assert!(summary_chunk.text.starts_with("Summary:"));
        assert!(summary_chunk.metadata.contains_key("source_chunk_ids"));
    }

    #[tokio::test]
    async fn test_summarize_failure_leaves_chunks_in_event() {
        let mut store = MemoryStore::with_defaults(
            Arc::new(MockEmbedder::default()),
            Arc::new(FailingSummary),
        )
        .unwrap();

        store
            .add_piece("A line.", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();

        let report = store
            .summarize_scene(SceneId::from_raw(1), "summary_conversation")
            .await
            .unwrap();

        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.chunks_archived, 0);
        assert!(!report.is_complete());
        assert_eq!(store.stats().event.chunk_count, 1);
        assert_eq!(store.stats().archive.chunk_count, 0);
        assert_eq!(store.stats().summary.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_summarize_skips_foreign_scenes_and_tags() {
        let mut store = store();
        store
            .add_piece("scene one line", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
        store
            .add_piece("scene two line", Tier::Event, Some("conversation"), scene(2))
            .await
            .unwrap();
        store
            .add_chunk("scene setup", Tier::Event, Some("scene_init"), scene(1))
            .await
            .unwrap();

        let report = store
            .summarize_scene(SceneId::from_raw(1), "summary_conversation")
            .await
            .unwrap();

        assert_eq!(report.chunks_archived, 1);
        // Scene 2 dialogue and the non-live scene_init chunk stay put.
        assert_eq!(store.stats().event.chunk_count, 2);
    }

    #[tokio::test]
    async fn test_reset_restores_fresh_state() {
        let mut store = store();
        store
            .add_piece("something", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
        store
            .add_chunk("a fact", Tier::Global, Some("profile"), None)
            .await
            .unwrap();

        store.reset();

        assert!(store.all_chunks().is_empty());
        assert_eq!(store.stats().total_chunks(), 0);

        // Counters restart from zero, like a fresh store.
        let outcome = store
            .add_piece("after reset", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
        assert_eq!(outcome.piece_id, PieceId::from_raw(0));
        assert_eq!(outcome.new_chunk, Some(ChunkId::from_raw(0)));
    }

    #[tokio::test]
    async fn test_load_scene_records_archives_past_scenes() {
        let mut store = store();

        let mut records = BTreeMap::new();
        records.insert(
            SceneId::from_raw(1),
            vec![
                "Mouri: when is the next train?".to_string(),
                "Kikuo: all trains are cancelled.".to_string(),
            ],
        );
        records.insert(
            SceneId::from_raw(2),
            vec!["Conan: someone wrote this note.".to_string()],
        );

        store
            .load_scene_records(&records, SceneId::from_raw(2), "summary_conversation")
            .await
            .unwrap();

        let stats = store.stats();
        // Scene 1 was summarized and archived; scene 2 stays live.
        assert_eq!(stats.archive.chunk_count, 1);
        assert_eq!(stats.summary.chunk_count, 1);
        assert_eq!(stats.event.chunk_count, 1);

        let live = store
            .all_chunks()
            .into_iter()
            .find(|c| c.tier == Tier::Event)
            .unwrap();
        assert!(live.text.contains("Conan"));
    }

    #[tokio::test]
    async fn test_all_chunks_ordered_by_id() {
        let mut store = store();
        store
            .add_chunk("b", Tier::Summary, None, scene(1))
            .await
            .unwrap();
        store.add_chunk("a", Tier::Global, None, None).await.unwrap();
        store
            .add_piece("c", Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();

        let ids: Vec<ChunkId> = store.all_chunks().iter().map(|c| c.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }
}
