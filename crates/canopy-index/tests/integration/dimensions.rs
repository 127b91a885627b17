//! Integration tests for dimension fan-out.

use canopy_core::document::DIMENSIONS_HASH_FIELD;
use canopy_core::{ContentNode, EngineVersion};
use serde_json::json;

use crate::common::{TEXT, TestHarness, config, de, en, site_nodes};

fn harness() -> TestHarness {
    let mut nodes = site_nodes(&de());
    nodes.extend(site_nodes(&en()));
    nodes.push(
        ContentNode::new("only-de", "/site/only-de", "live", TEXT)
            .with_property("text", "<p>nur deutsch</p>")
            .with_dimensions(de()),
    );
    TestHarness::with(EngineVersion::V7, config(), nodes, vec![de(), en()])
}

#[tokio::test]
async fn test_rebuild_creates_one_index_per_combination() {
    let mut harness = harness();
    harness.rebuild("1").await;

    let targets = harness.engine.alias_targets("content");
    assert_eq!(targets.len(), 2);
    let de_index = harness.live_index(&de());
    let en_index = harness.live_index(&en());
    assert_ne!(de_index, en_index);

    assert_eq!(harness.engine.documents(&de_index).len(), 5);
    assert_eq!(harness.engine.documents(&en_index).len(), 4);
    assert_eq!(
        harness.engine.find(&de_index, "a").unwrap()[DIMENSIONS_HASH_FIELD],
        json!(de().hash())
    );
}

#[tokio::test]
async fn test_fulltext_is_aggregated_per_combination() {
    let mut harness = harness();
    harness.rebuild("1").await;

    assert_eq!(
        harness.fulltext(&de(), "site"),
        json!({"text": "a b nur deutsch"})
    );
    assert_eq!(harness.fulltext(&en(), "site"), json!({"text": "a b"}));
}

#[tokio::test]
async fn test_index_node_only_where_it_resolves() {
    let mut harness = harness();
    harness.rebuild("1").await;

    let only_de = harness.node("only-de", &de());
    harness.indexer().index_node(&only_de, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();

    assert_eq!(report.operations, 2);
    assert_eq!(report.indices.len(), 1);
    assert!(report.indices.contains(&harness.live_index(&de())));
}

#[tokio::test]
async fn test_index_node_in_every_combination() {
    let mut harness = harness();
    harness.rebuild("1").await;

    let a = harness.node("a", &de());
    harness.indexer().index_node(&a, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();

    assert_eq!(report.operations, 4);
    assert_eq!(report.indices.len(), 2);
}

#[tokio::test]
async fn test_remove_node_from_every_combination() {
    let mut harness = harness();
    harness.rebuild("1").await;

    let a = harness.node("a", &de());
    harness.indexer().remove_node(&a, None).await.unwrap();
    harness.indexer().flush().await.unwrap();

    assert!(harness.engine.find(&harness.live_index(&de()), "a").is_none());
    assert!(harness.engine.find(&harness.live_index(&en()), "a").is_none());
    assert_eq!(harness.fulltext(&en(), "site"), json!({"text": "b"}));
}
