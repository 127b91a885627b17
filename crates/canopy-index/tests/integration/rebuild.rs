//! Integration tests for rebuild, alias swap, and stale cleanup.

use canopy_core::{DimensionCombination, EngineVersion, Error};
use canopy_index::IndexState;
use serde_json::json;

use crate::common::{TestHarness, config, site_nodes};

fn none() -> DimensionCombination {
    DimensionCombination::empty()
}

#[tokio::test]
async fn test_end_to_end_rebuild() {
    let mut harness = TestHarness::new();
    let handle = harness.lifecycle.start_rebuild("1").await.unwrap();
    let stats = harness.lifecycle.rebuild_all().await.unwrap();
    assert_eq!(stats.combinations, 1);
    assert_eq!(stats.nodes_visited, 4);
    assert_eq!(stats.report.failed, 0);

    let detached = harness.lifecycle.swap_alias().await.unwrap();
    assert!(detached.is_empty());

    let new_index = handle.index_for(&none()).unwrap().to_string();
    assert_eq!(
        harness.engine.alias_targets("content").into_iter().collect::<Vec<_>>(),
        vec![new_index.clone()]
    );
    assert_eq!(harness.engine.documents(&new_index).len(), 4);
    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "a b"}));
}

#[tokio::test]
async fn test_second_rebuild_swaps_in_one_call() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;
    let old = harness.live_index(&none());

    let detached = harness.rebuild("2").await;
    assert_eq!(detached, vec![old.clone()]);

    let new = harness.live_index(&none());
    assert_ne!(new, old);
    assert_eq!(harness.engine.alias_targets("content").len(), 1);

    let calls = harness.engine.alias_calls();
    let last = calls.last().unwrap();
    assert_eq!(
        last["actions"],
        json!([
            {"remove": {"index": old, "alias": "content"}},
            {"add": {"index": new, "alias": "content"}}
        ])
    );
}

#[tokio::test]
async fn test_cleanup_removes_only_stale_managed_indices() {
    let mut harness = TestHarness::new();
    harness.engine.add_index("content-archive");
    harness.engine.add_index("contentx-1");
    harness.engine.add_index("other-index");
    harness.rebuild("1").await;
    let old = harness.live_index(&none());
    harness.rebuild("2").await;
    let live = harness.live_index(&none());

    let removed = harness.lifecycle.cleanup_stale().await.unwrap();
    assert_eq!(removed, vec![old]);

    let indices = harness.engine.indices();
    assert!(indices.contains(&live));
    assert!(indices.contains(&"content-archive".to_string()));
    assert!(indices.contains(&"contentx-1".to_string()));
    assert!(indices.contains(&"other-index".to_string()));
    assert_eq!(indices.len(), 4);
}

#[tokio::test]
async fn test_aborted_rebuild_leaves_alias_untouched() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;
    let live = harness.live_index(&none());

    let handle = harness.lifecycle.start_rebuild("2").await.unwrap();
    harness.lifecycle.rebuild_all().await.unwrap();
    let building = handle.index_for(&none()).unwrap().to_string();
    assert!(harness.lifecycle.cleanup_stale().await.unwrap().is_empty());
    harness.lifecycle.abort_rebuild();

    assert_eq!(harness.live_index(&none()), live);
    let removed = harness.lifecycle.cleanup_stale().await.unwrap();
    assert_eq!(removed, vec![building]);
}

#[tokio::test]
async fn test_swap_refuses_concrete_alias_name() {
    let mut harness = TestHarness::new();
    harness.engine.add_index("content");
    harness.lifecycle.start_rebuild("1").await.unwrap();
    harness.lifecycle.rebuild_all().await.unwrap();

    let err = harness.lifecycle.swap_alias().await.unwrap_err();
    assert!(matches!(err, Error::AliasInvariant { .. }));
    assert!(harness.engine.alias_calls().is_empty());
}

#[tokio::test]
async fn test_index_states_through_lifecycle() {
    let mut harness = TestHarness::new();
    assert_eq!(harness.lifecycle.state(&none()).await.unwrap(), IndexState::Absent);

    harness.rebuild("1").await;
    let old = harness.live_index(&none());
    assert_eq!(harness.lifecycle.state(&none()).await.unwrap(), IndexState::Live);

    let handle = harness.lifecycle.start_rebuild("2").await.unwrap();
    assert_eq!(harness.lifecycle.state(&none()).await.unwrap(), IndexState::Building);
    assert_eq!(harness.lifecycle.index_state(&old).await.unwrap(), IndexState::Live);

    harness.lifecycle.swap_alias().await.unwrap();
    let new = handle.index_for(&none()).unwrap();
    assert_eq!(harness.lifecycle.index_state(new).await.unwrap(), IndexState::Live);
    assert_eq!(harness.lifecycle.index_state(&old).await.unwrap(), IndexState::Stale);

    harness.lifecycle.cleanup_stale().await.unwrap();
    assert_eq!(harness.lifecycle.index_state(&old).await.unwrap(), IndexState::Deleted);
}

#[tokio::test]
async fn test_live_updates_after_swap_reach_new_index() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;
    harness.rebuild("2").await;
    let live = harness.live_index(&none());

    let c = canopy_core::ContentNode::new("c", "/site/c", "live", crate::common::TEXT)
        .with_property("text", "<p>c</p>");
    harness.repository.upsert(c.clone());
    harness.indexer().index_node(&c, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();

    assert!(report.indices.contains(&live));
    assert_eq!(harness.fulltext(&none(), "site"), json!({"text": "a b c"}));
}

#[tokio::test]
async fn test_every_engine_generation_rebuilds() {
    for version in [EngineVersion::V1, EngineVersion::V5, EngineVersion::V7] {
        let mut harness = TestHarness::with(version, config(), site_nodes(&none()), Vec::new());
        harness.rebuild("1").await;
        assert_eq!(
            harness.fulltext(&none(), "site"),
            json!({"text": "a b"}),
            "fulltext for {version}"
        );

        let a = harness.node("a", &none());
        harness.indexer().remove_node(&a, None).await.unwrap();
        harness.indexer().flush().await.unwrap();
        assert_eq!(
            harness.fulltext(&none(), "site"),
            json!({"text": "b"}),
            "fulltext after removal for {version}"
        );
    }
}

#[tokio::test]
async fn test_cluster_status() {
    let harness = TestHarness::new();
    let status = harness.lifecycle.cluster_status().await.unwrap();
    assert_eq!(status["status"], "green");
}
