//! DST tests for piece ingestion: merge, capacity, and overlap
//!
//! TigerStyle: Deterministic scenarios over the chunk merge/overlap policy.

use palimpsest_dst::{SimConfig, SimWorld};
use palimpsest_memory::{MemoryConfig, SceneId, Tier};

fn scene(raw: u64) -> Option<SceneId> {
    Some(SceneId::from_raw(raw))
}

fn world_with(max_pieces: usize, overlap_pieces: usize) -> SimWorld {
    let mut memory = MemoryConfig::default();
    memory.max_pieces = max_pieces;
    memory.overlap_pieces = overlap_pieces;
    SimWorld::build(SimConfig::from_env_or_random().with_memory(memory))
        .expect("world must build")
}

// =============================================================================
// Merge correctness
// =============================================================================

#[tokio::test]
async fn test_dst_pieces_below_capacity_form_one_chunk() {
    let mut world = world_with(5, 2);

    let lines = [
        "Hero: Hello, wise wizard!",
        "Wizard: Greetings, young adventurer.",
        "Hero: I seek knowledge of the ancient scroll.",
        "Wizard: The scroll is hidden in the darkest depths.",
        "Hero: Tell me more about these depths.",
    ];

    let mut chunk_id = None;
    for line in lines {
        let outcome = world
            .store
            .add_piece(line, Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
        if let Some(id) = outcome.new_chunk {
            chunk_id = Some(id);
        }
    }

    // Exactly one chunk for the signature, text joined in insertion order.
    assert_eq!(world.store.stats().event.chunk_count, 1);
    let chunk = world.store.get_chunk(chunk_id.unwrap()).unwrap();
    assert_eq!(chunk.piece_count(), 5);
    assert_eq!(chunk.text, lines.join("\n"));
}

#[tokio::test]
async fn test_dst_overflow_seeds_new_chunk_with_overlap() {
    let mut world = world_with(5, 2);

    for line in [
        "Hero: Hello, wise wizard!",
        "Wizard: Greetings, young adventurer.",
        "Hero: I seek knowledge of the ancient scroll.",
        "Wizard: The scroll is hidden in the darkest depths.",
        "Hero: Tell me more about these depths.",
    ] {
        world
            .store
            .add_piece(line, Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
    }

    // The sixth piece overflows: new chunk seeded with the previous two
    // pieces plus the new one.
    let outcome = world
        .store
        .add_piece(
            "Wizard: Beware the guardians of the abyss.",
            Tier::Event,
            Some("conversation"),
            scene(1),
        )
        .await
        .unwrap();

    let new_chunk = world
        .store
        .get_chunk(outcome.new_chunk.expect("overflow must create a chunk"))
        .unwrap();
    assert_eq!(new_chunk.piece_count(), 3);
    assert_eq!(
        new_chunk.text,
        "Wizard: The scroll is hidden in the darkest depths.\n\
         Hero: Tell me more about these depths.\n\
         Wizard: Beware the guardians of the abyss."
    );
    assert_eq!(world.store.stats().event.chunk_count, 2);

    // A seventh piece keeps merging into the overlap chunk.
    let outcome = world
        .store
        .add_piece(
            "Hero: Guardians? What kind of guardians?",
            Tier::Event,
            Some("conversation"),
            scene(1),
        )
        .await
        .unwrap();
    assert!(outcome.new_chunk.is_none());
    assert_eq!(world.store.stats().event.chunk_count, 2);
}

#[tokio::test]
async fn test_dst_overlap_stops_at_interposed_foreign_piece() {
    let mut world = world_with(3, 2);

    // Fill a conversation chunk, then interpose an action piece.
    for line in ["talk one", "talk two", "talk three"] {
        world
            .store
            .add_piece(line, Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
    }
    world
        .store
        .add_piece("he bolts the door", Tier::Event, Some("action"), scene(1))
        .await
        .unwrap();

    // The next dialogue piece overflows its full chunk. The backward walk
    // hits the action piece first and stops: no overlap carried, even
    // though older matching dialogue exists beyond it.
    let outcome = world
        .store
        .add_piece("talk four", Tier::Event, Some("conversation"), scene(1))
        .await
        .unwrap();

    let chunk = world.store.get_chunk(outcome.new_chunk.unwrap()).unwrap();
    assert_eq!(chunk.piece_count(), 1);
    assert_eq!(chunk.text, "talk four");
}

#[tokio::test]
async fn test_dst_overlap_takes_tail_in_original_order() {
    let mut world = world_with(2, 3);

    // Chunk 1 fills with two pieces; the third opens a chunk seeded with
    // min(overlap = 3, max_pieces - 1 = 1) predecessor.
    for line in ["alpha line", "beta line", "gamma line"] {
        world
            .store
            .add_piece(line, Tier::Event, Some("conversation"), scene(1))
            .await
            .unwrap();
    }

    let chunks = world.store.all_chunks();
    let newest = chunks.last().unwrap();
    assert_eq!(newest.text, "beta line\ngamma line");
}

// =============================================================================
// Signature isolation
// =============================================================================

#[tokio::test]
async fn test_dst_scenes_and_tags_never_mix() {
    let mut world = world_with(5, 2);

    world
        .store
        .add_piece("scene one talk", Tier::Event, Some("conversation"), scene(1))
        .await
        .unwrap();
    world
        .store
        .add_piece("scene two talk", Tier::Event, Some("conversation"), scene(2))
        .await
        .unwrap();
    world
        .store
        .add_piece("he runs away", Tier::Event, Some("action"), scene(1))
        .await
        .unwrap();
    world
        .store
        .add_piece("sceneless aside", Tier::Event, Some("conversation"), None)
        .await
        .unwrap();

    // Four distinct signatures, four chunks.
    assert_eq!(world.store.stats().event.chunk_count, 4);
}

#[tokio::test]
async fn test_dst_atomic_chunks_never_concatenate() {
    let mut world = world_with(5, 2);

    let first = world
        .store
        .add_chunk("Elara is wise.", Tier::Global, Some("profile"), None)
        .await
        .unwrap();
    let second = world
        .store
        .add_chunk("Elara fears deep water.", Tier::Global, Some("profile"), None)
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(world.store.stats().global.chunk_count, 2);
    assert_eq!(world.store.get_chunk(second).unwrap().piece_count(), 1);

    // The atomic path does not leak into the merge path either: a later
    // add_piece with the same signature merges into the most recent
    // matching chunk, which is the second atomic chunk.
    let outcome = world
        .store
        .add_piece("Elara grew up coastal.", Tier::Global, Some("profile"), None)
        .await
        .unwrap();
    assert!(outcome.new_chunk.is_none());
    assert!(world
        .store
        .get_chunk(second)
        .unwrap()
        .text
        .contains("coastal"));
}

#[tokio::test]
async fn test_dst_chunk_ids_monotonic_across_tiers() {
    let mut world = world_with(5, 2);

    let a = world
        .store
        .add_chunk("setup", Tier::Global, Some("scene_init"), scene(1))
        .await
        .unwrap();
    let b = world
        .store
        .add_piece("line", Tier::Event, Some("conversation"), scene(1))
        .await
        .unwrap()
        .new_chunk
        .unwrap();
    let c = world
        .store
        .add_chunk("recap", Tier::Summary, Some("summary_conversation"), scene(1))
        .await
        .unwrap();

    assert!(a < b && b < c, "chunk ids are global write order");
}
