//! Integration tests for loading configuration and wiring it into the
//! pipeline.

use std::io::Write;
use std::sync::Arc;

use canopy_core::{
    CanopyConfig, DimensionCombination, EngineVersion, Error, IdentifierStrategyKind,
    InMemoryContentRepository,
};
use canopy_engine::{MockTransport, Transport, create_driver};
use canopy_index::NodeIndexer;
use serde_json::json;

use crate::common::{PAGE, TEXT, TestHarness, de, en, site_nodes};

const CONFIG: &str = r#"
[engine]
url = "http://search.internal:9200"
version = "v7"

[index]
base_name = "acme-content"
batch_size = 2

[indexing]
live_workspace = "live"
identifier_strategy = "identity"

[[dimensions]]
language = ["de"]

[[dimensions]]
language = ["en"]

[node_types."Acme.Site:Page"]
fulltext_root = true

[node_types."Acme.Site:Page".properties.title]
fulltext = { bucket = "h1" }

[node_types."Acme.Site:Text".properties.text]
fulltext = "html"
"#;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_pipeline_from_config_file() {
    let file = write_config(CONFIG);
    let config = CanopyConfig::load(file.path()).unwrap();
    assert_eq!(config.engine.version, EngineVersion::V7);
    assert_eq!(config.indexing.identifier_strategy, IdentifierStrategyKind::Identity);
    assert!(config.node_type(PAGE).fulltext_root);
    assert!(config.node_type(TEXT).fulltext_enabled);
    assert_eq!(config.dimensions, vec![de(), en()]);

    let combinations = config.dimensions.clone();
    let mut nodes = site_nodes(&de());
    nodes.extend(site_nodes(&en()));
    let mut harness = TestHarness::with(EngineVersion::V7, config, nodes, combinations);
    let detached = harness.rebuild("20240101120000").await;
    assert!(detached.is_empty());

    let targets = harness.engine.alias_targets("acme-content");
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|name| name.ends_with("-20240101120000")));
    assert_eq!(harness.fulltext(&de(), "site"), json!({"text": "a b"}));
}

#[tokio::test]
async fn test_small_batch_size_flushes_during_traversal() {
    let file = write_config(CONFIG);
    let config = CanopyConfig::load(file.path()).unwrap();
    let mut harness = TestHarness::with(
        EngineVersion::V7,
        config,
        site_nodes(&de()),
        vec![de()],
    );
    harness.lifecycle.start_rebuild("1").await.unwrap();
    let stats = harness.lifecycle.rebuild_all().await.unwrap();

    assert_eq!(stats.nodes_visited, 4);
    assert!(stats.flushes >= 2);
    assert_eq!(stats.report.nodes, 4);
}

#[test]
fn test_missing_config_file() {
    let err = CanopyConfig::load("/nonexistent/canopy.toml").unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn test_invalid_base_name_fails_fast() {
    let mut config = CanopyConfig::default();
    config.index.base_name = "bad*name".to_string();
    let config = Arc::new(config);
    let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
    let driver = create_driver(EngineVersion::V7, transport, &config.index);
    let result = NodeIndexer::builder(
        config,
        Arc::new(InMemoryContentRepository::new()),
        driver,
    )
    .build();
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = CanopyConfig::from_toml_str(CONFIG).unwrap();
    let rendered = config.to_toml_string().unwrap();
    let reloaded = CanopyConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(config, reloaded);
    assert!(reloaded.dimensions.contains(&DimensionCombination::empty().with("language", vec!["en"])));
}
