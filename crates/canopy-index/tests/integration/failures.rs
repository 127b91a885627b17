//! Integration tests for partial failures, dropped payloads, and workspace
//! restriction.

use canopy_core::{
    Coercion, ContentNode, ContentRepository, DimensionCombination, EngineVersion, NodeContext,
    PropertyConfig,
};
use canopy_index::{DiagnosticKind, IdentifierStrategy, IdentityBasedIdentifier};
use serde_json::json;

use crate::common::{TEXT, TestHarness, config, site_nodes};

fn none() -> DimensionCombination {
    DimensionCombination::empty()
}

#[tokio::test]
async fn test_rejected_item_does_not_fail_batch() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;
    let live = harness.live_index(&none());

    let a = harness.node("a", &none()).with_property("text", "<p>a2</p>");
    let b = harness.node("b", &none()).with_property("text", "<p>b2</p>");
    let root = harness.node("root", &none()).with_property("note", "updated");
    for node in [&a, &b, &root] {
        harness.repository.upsert(node.clone());
    }
    let b_id = IdentityBasedIdentifier::new("default").identify(&b, "live", &none());
    harness.engine.reject(&b_id);

    for node in [&a, &b, &root] {
        harness.indexer().index_node(node, None).await.unwrap();
    }
    let report = harness.indexer().flush().await.unwrap();

    assert_eq!(report.operations, 5);
    assert_eq!(report.failed, 1);
    assert_eq!(harness.engine.find(&live, "a").unwrap()["text"], "<p>a2</p>");
    assert_eq!(harness.engine.find(&live, "b").unwrap()["text"], "<p>b</p>");
    assert_eq!(harness.engine.find(&live, "root").unwrap()["note"], "updated");

    let entries = harness.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiagnosticKind::ItemRejected);
    assert_eq!(entries[0].document_id.as_deref(), Some(b_id.as_str()));
    assert_eq!(entries[0].status, Some(400));
    assert_eq!(entries[0].payload.as_ref().unwrap()["text"], "<p>b2</p>");
}

#[tokio::test]
async fn test_uncoercible_property_drops_only_that_node() {
    let mut config = config();
    if let Some(text) = config.node_types.get_mut(TEXT) {
        text.properties.insert(
            "count".to_string(),
            PropertyConfig {
                coerce: Some(Coercion::Integer),
                ..Default::default()
            },
        );
    }
    let mut harness = TestHarness::with(EngineVersion::V7, config, site_nodes(&none()), Vec::new());
    harness.rebuild("1").await;
    let live = harness.live_index(&none());

    let a = harness.node("a", &none()).with_property("count", "many");
    let b = harness.node("b", &none()).with_property("count", "3");
    harness.repository.upsert(a.clone());
    harness.repository.upsert(b.clone());
    harness.indexer().index_node(&a, None).await.unwrap();
    harness.indexer().index_node(&b, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.engine.find(&live, "b").unwrap()["count"], 3);
    assert!(harness.engine.find(&live, "a").unwrap().get("count").is_none());

    let entries = harness.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, DiagnosticKind::MalformedPayload);
    assert_eq!(entries[0].payload.as_ref().unwrap()["count"], "many");
}

#[tokio::test]
async fn test_non_live_workspace_is_ignored_by_default() {
    let mut harness = TestHarness::new();
    harness.rebuild("1").await;

    let draft = ContentNode::new("a", "/site/a", "user-admin", TEXT)
        .with_property("text", "<p>draft</p>");
    let result = harness.indexer().index_node(&draft, None).await.unwrap();
    assert!(result.is_none());
    harness.indexer().remove_node(&draft, Some("user-editor")).await.unwrap();
    assert_eq!(harness.indexer().pending(), 0);

    harness.indexer().index_node(&draft, Some("live")).await.unwrap();
    assert_eq!(harness.indexer().pending(), 1);
}

#[tokio::test]
async fn test_all_workspaces_indexed_when_enabled() {
    let mut config = config();
    config.indexing.index_all_workspaces = true;
    let mut nodes = site_nodes(&none());
    nodes.push(
        ContentNode::new("a", "/site/a", "user-admin", TEXT).with_property("text", "<p>draft</p>"),
    );
    let mut harness = TestHarness::with(EngineVersion::V7, config, nodes, Vec::new());
    harness.rebuild("1").await;
    let live = harness.live_index(&none());

    let draft = harness
        .repository
        .resolve("a", &NodeContext::new("user-admin", none()))
        .unwrap();
    harness.indexer().index_node(&draft, None).await.unwrap();
    let report = harness.indexer().flush().await.unwrap();
    assert_eq!(report.operations, 1);

    let documents: Vec<_> = harness
        .engine
        .documents(&live)
        .into_values()
        .filter(|doc| doc["__identifier"] == "a")
        .collect();
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().any(|doc| doc["__workspace"] == json!("user-admin")));
}
