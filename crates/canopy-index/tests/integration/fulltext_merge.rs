//! Integration tests for fulltext aggregation into fulltext roots.

use canopy_core::{DimensionCombination, EngineVersion, IdentifierStrategyKind};
use serde_json::json;

use crate::common::{TEXT, TestHarness, config, site_nodes};

fn none() -> DimensionCombination {
    DimensionCombination::empty()
}

#[tokio::test]
async fn test_descendant_text_merges_into_root() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;

    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "a b"}));
}

#[tokio::test]
async fn test_removing_contributor_shrinks_root() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;

    let a = harness.node("a", &none());
    harness.indexer().remove_node(&a, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();
    assert!(report.is_clean());

    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "b"}));
    let live = harness.live_index(&none());
    assert!(harness.engine.find(&live, "a").is_none());
}

#[tokio::test]
async fn test_hidden_contributor_is_withdrawn() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;

    let hidden = harness.node("b", &none()).hidden();
    harness.repository.upsert(hidden.clone());
    harness.indexer().index_node(&hidden, None).await.unwrap();
    harness.indexer().flush().await.unwrap();

    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "a"}));
    let live = harness.live_index(&none());
    assert_eq!(harness.engine.find(&live, "b").unwrap()["__hidden"], true);
}

#[tokio::test]
async fn test_reindexing_root_keeps_aggregated_text() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;

    let site = harness
        .node("site", &none())
        .with_property("title", "Welcome");
    harness.repository.upsert(site.clone());
    harness.indexer().index_node(&site, None).await.unwrap();
    harness.indexer().flush().await.unwrap();

    assert_eq!(
        harness.fulltext(&none(), "site"),
        json!({"h1": "Welcome", "text": "a b"})
    );
    let live = harness.live_index(&none());
    assert_eq!(harness.engine.find(&live, "site").unwrap()["title"], "Welcome");
}

#[tokio::test]
async fn test_indexing_twice_is_idempotent() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;
    let live = harness.live_index(&none());

    let a = harness.node("a", &none());
    harness.indexer().index_node(&a, None).await.unwrap();
    harness.indexer().flush().await.unwrap();
    let once = harness.engine.documents(&live);

    harness.indexer().index_node(&a, None).await.unwrap();
    harness.indexer().flush().await.unwrap();
    let twice = harness.engine.documents(&live);

    assert_eq!(once, twice);
    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "a b"}));
}

#[tokio::test]
async fn test_rename_keeps_identity_document() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;
    let live = harness.live_index(&none());
    let before = harness.engine.documents(&live).len();

    let moved = harness.node("a", &none()).moved_to("/site/renamed");
    harness.repository.upsert(moved.clone());
    harness.indexer().index_node(&moved, None).await.unwrap();
    harness.indexer().flush().await.unwrap();

    assert_eq!(harness.engine.documents(&live).len(), before);
    assert_eq!(harness.engine.find(&live, "a").unwrap()["__path"], "/site/renamed");
    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "a b"}));
}

#[tokio::test]
async fn test_rename_with_path_identifiers_adds_document() {
    let mut config = config();
    config.indexing.identifier_strategy = IdentifierStrategyKind::Path;
    let mut harness = TestHarness::with(EngineVersion::V7, config, site_nodes(&none()), Vec::new());
    harness.rebuild("1").await;
    let live = harness.live_index(&none());
    let before = harness.engine.documents(&live).len();

    let moved = harness.node("a", &none()).moved_to("/site/renamed");
    harness.repository.upsert(moved.clone());
    harness.indexer().index_node(&moved, None).await.unwrap();
    harness.indexer().flush().await.unwrap();

    assert_eq!(harness.engine.documents(&live).len(), before + 1);
}

#[tokio::test]
async fn test_node_without_fulltext_root_is_indexed() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;

    let orphan = canopy_core::ContentNode::new("orphan", "/orphan", "live", TEXT)
        .with_property("text", "<p>alone</p>");
    harness.repository.upsert(orphan.clone());
    harness.indexer().index_node(&orphan, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();

    assert_eq!(report.operations, 1);
    let live = harness.live_index(&none());
    assert!(harness.engine.find(&live, "orphan").is_some());
}
