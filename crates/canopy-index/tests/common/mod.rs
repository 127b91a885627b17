//! Common test utilities and harness for Canopy indexing integration tests.
//!
//! [`MemoryEngine`] answers the subset of the engine HTTP API the pipeline
//! uses and keeps documents, aliases, and fulltext parts in memory. It
//! evaluates the merge and preserve scripts by their parameters, the way the
//! engine-side scripts would.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use canopy_core::fulltext::{FULLTEXT_FIELD, FULLTEXT_PARTS_FIELD};
use canopy_core::{
    CanopyConfig, ContentNode, DimensionCombination, EngineVersion, FulltextBuckets,
    FulltextParts, FulltextRule, InMemoryContentRepository, NodeTypeConfig, PropertyConfig,
    Result, StaticDimensions, StaticSchema,
};
use canopy_engine::script::NEW_DATA_PARAM;
use canopy_engine::{EngineRequest, EngineResponse, Method, Transport, create_driver};
use canopy_index::{IndexLifecycle, MemorySink, NodeIndexer};
use serde_json::{Map, Value, json};

pub const PAGE: &str = "Acme.Site:Page";
pub const TEXT: &str = "Acme.Site:Text";

// ============================================================================
// Memory engine
// ============================================================================

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, BTreeMap<String, Value>>,
    parts: BTreeMap<(String, String), FulltextParts>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    alias_calls: Vec<Value>,
    rejected: BTreeSet<String>,
}

/// In-memory stand-in for the search engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an index outside the pipeline.
    pub fn add_index(&self, name: &str) {
        self.lock().indices.entry(name.to_string()).or_default();
    }

    /// Point `alias` at `index` outside the pipeline.
    pub fn add_alias(&self, alias: &str, index: &str) {
        self.lock()
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(index.to_string());
    }

    /// Reject every bulk item for this document id.
    pub fn reject(&self, document_id: &str) {
        self.lock().rejected.insert(document_id.to_string());
    }

    pub fn indices(&self) -> Vec<String> {
        self.lock().indices.keys().cloned().collect()
    }

    pub fn alias_targets(&self, alias: &str) -> BTreeSet<String> {
        self.lock().aliases.get(alias).cloned().unwrap_or_default()
    }

    /// Bodies of every `_aliases` call, in order.
    pub fn alias_calls(&self) -> Vec<Value> {
        self.lock().alias_calls.clone()
    }

    pub fn documents(&self, index: &str) -> BTreeMap<String, Value> {
        self.lock().indices.get(index).cloned().unwrap_or_default()
    }

    /// The document of `index` whose `__identifier` is `identifier`.
    pub fn find(&self, index: &str, identifier: &str) -> Option<Value> {
        self.documents(index)
            .into_values()
            .find(|doc| doc["__identifier"] == identifier)
    }

    fn handle(&self, request: &EngineRequest) -> EngineResponse {
        let path = request.path.as_str();
        let mut state = self.lock();
        match request.method {
            Method::Head => {
                if state.indices.contains_key(path) || state.aliases.contains_key(path) {
                    EngineResponse::ok(Value::Null)
                } else {
                    EngineResponse::not_found()
                }
            }
            Method::Put => {
                if state.indices.contains_key(path) {
                    return EngineResponse::new(
                        400,
                        json!({"error": {"type": "resource_already_exists_exception", "reason": path}}),
                    );
                }
                state.indices.insert(path.to_string(), BTreeMap::new());
                EngineResponse::ok(json!({"acknowledged": true}))
            }
            Method::Delete => {
                if state.indices.remove(path).is_none() {
                    return EngineResponse::not_found();
                }
                state.parts.retain(|(index, _), _| index != path);
                for targets in state.aliases.values_mut() {
                    targets.remove(path);
                }
                state.aliases.retain(|_, targets| !targets.is_empty());
                EngineResponse::ok(json!({"acknowledged": true}))
            }
            Method::Get => state.get(path),
            Method::Post => {
                let body = request.json_body().cloned().unwrap_or(Value::Null);
                if path == "_aliases" {
                    state.update_aliases(body)
                } else if let Some(index) = path.strip_suffix("/_bulk") {
                    state.bulk(index, request.ndjson_body().unwrap_or_default())
                } else if path.ends_with("/_refresh") {
                    EngineResponse::ok(json!({"_shards": {"failed": 0}}))
                } else if path.ends_with("/_delete_by_query") {
                    EngineResponse::ok(json!({"deleted": 0}))
                } else if path.ends_with("/_search") {
                    EngineResponse::ok(json!({"hits": {"hits": []}}))
                } else {
                    EngineResponse::not_found()
                }
            }
        }
    }
}

impl State {
    fn get(&self, path: &str) -> EngineResponse {
        if let Some(alias) = path.strip_prefix("_alias/") {
            let Some(targets) = self.aliases.get(alias) else {
                return EngineResponse::not_found();
            };
            let body: Map<String, Value> = targets
                .iter()
                .map(|index| (index.clone(), json!({"aliases": {alias: {}}})))
                .collect();
            return EngineResponse::ok(Value::Object(body));
        }
        if let Some(rest) = path.strip_prefix("_cat/indices/") {
            let prefix = rest.split('*').next().unwrap_or_default();
            let rows: Vec<Value> = self
                .indices
                .keys()
                .filter(|name| name.starts_with(prefix))
                .map(|name| json!({"index": name, "health": "green"}))
                .collect();
            return EngineResponse::ok(Value::Array(rows));
        }
        if path == "_cluster/health" {
            return EngineResponse::ok(json!({
                "cluster_name": "memory",
                "status": "green",
                "number_of_nodes": 1
            }));
        }
        if self.indices.contains_key(path) {
            return EngineResponse::ok(json!({ path: {"aliases": {}} }));
        }
        match self.aliases.get(path) {
            Some(targets) => {
                let body: Map<String, Value> = targets
                    .iter()
                    .map(|index| (index.clone(), json!({"aliases": {path: {}}})))
                    .collect();
                EngineResponse::ok(Value::Object(body))
            }
            None => EngineResponse::not_found(),
        }
    }

    fn update_aliases(&mut self, body: Value) -> EngineResponse {
        self.alias_calls.push(body.clone());
        let mut aliases = self.aliases.clone();
        let actions = body["actions"].as_array().cloned().unwrap_or_default();
        for action in actions {
            if let Some(add) = action.get("add") {
                let index = add["index"].as_str().unwrap_or_default();
                if !self.indices.contains_key(index) {
                    return EngineResponse::not_found();
                }
                aliases
                    .entry(add["alias"].as_str().unwrap_or_default().to_string())
                    .or_default()
                    .insert(index.to_string());
            } else if let Some(remove) = action.get("remove") {
                let alias = remove["alias"].as_str().unwrap_or_default();
                let index = remove["index"].as_str().unwrap_or_default();
                let removed = aliases
                    .get_mut(alias)
                    .is_some_and(|targets| targets.remove(index));
                if !removed {
                    return EngineResponse::not_found();
                }
            }
        }
        aliases.retain(|_, targets| !targets.is_empty());
        self.aliases = aliases;
        EngineResponse::ok(json!({"acknowledged": true}))
    }

    fn bulk(&mut self, path_index: &str, ndjson: &str) -> EngineResponse {
        let mut items = Vec::new();
        let mut errors = false;
        let mut lines = ndjson.lines().filter(|l| !l.trim().is_empty());
        while let Some(line) = lines.next() {
            let header: Value = serde_json::from_str(line).unwrap_or(Value::Null);
            let Some((action, metadata)) = header.as_object().and_then(|o| o.iter().next()) else {
                continue;
            };
            let body: Value = if action == "delete" {
                Value::Null
            } else {
                lines
                    .next()
                    .and_then(|l| serde_json::from_str(l).ok())
                    .unwrap_or(Value::Null)
            };
            let index = metadata["_index"].as_str().unwrap_or(path_index).to_string();
            let id = metadata["_id"].as_str().unwrap_or_default().to_string();

            let status = if self.rejected.contains(&id) {
                400
            } else if !self.indices.contains_key(&index) {
                404
            } else {
                self.apply(action, &index, &id, &body)
            };
            let mut result = json!({"_index": index, "_id": id, "status": status});
            if status >= 400 && !(action == "delete" && status == 404) {
                errors = true;
                result["error"] = json!({"type": "mapper_parsing_exception", "reason": "rejected"});
            }
            items.push(json!({ action.as_str(): result }));
        }
        EngineResponse::ok(json!({"took": 1, "errors": errors, "items": items}))
    }

    fn apply(&mut self, action: &str, index: &str, id: &str, body: &Value) -> u16 {
        let key = (index.to_string(), id.to_string());
        let Some(docs) = self.indices.get_mut(index) else {
            return 404;
        };
        match action {
            "index" => {
                docs.insert(id.to_string(), body.clone());
                self.parts.remove(&key);
                201
            }
            "delete" => {
                self.parts.remove(&key);
                if docs.remove(id).is_some() { 200 } else { 404 }
            }
            "update" => {
                let params = body
                    .get("script")
                    .and_then(|s| s.get("params"))
                    .or_else(|| body.get("params"))
                    .cloned()
                    .unwrap_or(Value::Null);
                let upsert = body.get("upsert").cloned().unwrap_or_else(|| json!({}));

                if let Some(new_data) = params.get(NEW_DATA_PARAM).and_then(Value::as_object) {
                    let mut doc = new_data.clone();
                    if let Some(existing) = docs.get(id) {
                        for field in [FULLTEXT_FIELD, FULLTEXT_PARTS_FIELD] {
                            if let Some(value) = existing.get(field) {
                                doc.insert(field.to_string(), value.clone());
                            }
                        }
                    }
                    docs.insert(id.to_string(), Value::Object(doc));
                    return 200;
                }

                let Some(identifier) = params.get("identifier").and_then(Value::as_str) else {
                    return 400;
                };
                let buckets: FulltextBuckets =
                    serde_json::from_value(params["fulltext"].clone()).unwrap_or_default();
                let parts = self.parts.entry(key).or_default();
                parts.apply(identifier, &buckets);
                let doc = docs.entry(id.to_string()).or_insert(upsert);
                doc[FULLTEXT_FIELD] = serde_json::to_value(parts.merged()).unwrap_or_default();
                doc[FULLTEXT_PARTS_FIELD] = serde_json::to_value(&*parts).unwrap_or_default();
                200
            }
            _ => 400,
        }
    }
}

#[async_trait]
impl Transport for MemoryEngine {
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        Ok(self.handle(&request))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn de() -> DimensionCombination {
    DimensionCombination::empty().with("language", vec!["de"])
}

pub fn en() -> DimensionCombination {
    DimensionCombination::empty().with("language", vec!["en"])
}

/// Pages are fulltext roots with a heading title; texts contribute HTML.
pub fn config() -> CanopyConfig {
    let mut page = NodeTypeConfig {
        fulltext_root: true,
        ..Default::default()
    };
    page.properties.insert(
        "title".to_string(),
        PropertyConfig {
            fulltext: Some(FulltextRule::Bucket("h1".to_string())),
            ..Default::default()
        },
    );
    let mut text = NodeTypeConfig::default();
    text.properties.insert(
        "text".to_string(),
        PropertyConfig {
            fulltext: Some(FulltextRule::Html),
            ..Default::default()
        },
    );
    let mut config = CanopyConfig::default()
        .with_node_type(PAGE, page)
        .with_node_type(TEXT, text);
    config.index.base_name = "content".to_string();
    config.index.batch_size = 50;
    config
}

/// `/`, a page at `/site`, and texts `a` and `b` below it.
pub fn site_nodes(dimensions: &DimensionCombination) -> Vec<ContentNode> {
    vec![
        ContentNode::new("root", "/", "live", "unstructured").with_dimensions(dimensions.clone()),
        ContentNode::new("site", "/site", "live", PAGE).with_dimensions(dimensions.clone()),
        ContentNode::new("a", "/site/a", "live", TEXT)
            .with_property("text", "<p>a</p>")
            .with_dimensions(dimensions.clone()),
        ContentNode::new("b", "/site/b", "live", TEXT)
            .with_property("text", "<p>b</p>")
            .with_dimensions(dimensions.clone()),
    ]
}

/// Test harness wiring an in-memory tree to an in-memory engine.
pub struct TestHarness {
    pub engine: Arc<MemoryEngine>,
    pub repository: Arc<InMemoryContentRepository>,
    pub sink: Arc<MemorySink>,
    pub lifecycle: IndexLifecycle,
}

impl TestHarness {
    /// Dimension-less tree on a 7.x engine.
    pub fn new() -> Self {
        Self::with(
            EngineVersion::V7,
            config(),
            site_nodes(&DimensionCombination::empty()),
            Vec::new(),
        )
    }

    pub fn with(
        version: EngineVersion,
        config: CanopyConfig,
        nodes: Vec<ContentNode>,
        combinations: Vec<DimensionCombination>,
    ) -> Self {
        let engine = Arc::new(MemoryEngine::new());
        let transport: Arc<dyn Transport> = engine.clone();
        let config = Arc::new(config);
        let driver = create_driver(version, transport, &config.index);
        let repository = Arc::new(InMemoryContentRepository::with_nodes(nodes));
        let sink = Arc::new(MemorySink::new());
        let indexer = NodeIndexer::builder(config, repository.clone(), driver)
            .dimensions(Arc::new(StaticDimensions::new(combinations)))
            .diagnostics(sink.clone())
            .build()
            .unwrap();
        let schema = StaticSchema::default()
            .with_mapping(PAGE, json!({"properties": {"title": {"type": "text"}}}));
        Self {
            engine,
            repository,
            sink,
            lifecycle: IndexLifecycle::new(indexer, Arc::new(schema)),
        }
    }

    /// Run a complete rebuild and swap it live.
    pub async fn rebuild(&mut self, postfix: &str) -> Vec<String> {
        self.lifecycle.start_rebuild(postfix).await.unwrap();
        self.lifecycle.rebuild_all().await.unwrap();
        self.lifecycle.swap_alias().await.unwrap()
    }

    pub fn indexer(&mut self) -> &mut NodeIndexer {
        self.lifecycle.indexer_mut()
    }

    /// Resolve a node of the live tree.
    pub fn node(&self, identifier: &str, dimensions: &DimensionCombination) -> ContentNode {
        use canopy_core::{ContentRepository, NodeContext};
        self.repository
            .resolve(identifier, &NodeContext::new("live", dimensions.clone()))
            .unwrap()
    }

    /// The live physical index of a combination.
    pub fn live_index(&self, dimensions: &DimensionCombination) -> String {
        let naming = self.lifecycle.indexer().naming();
        self.engine
            .alias_targets(naming.alias())
            .into_iter()
            .find(|name| naming.belongs_to(name, dimensions))
            .unwrap()
    }

    /// Merged fulltext of a document in the live index.
    pub fn fulltext(&self, dimensions: &DimensionCombination, identifier: &str) -> Value {
        self.engine
            .find(&self.live_index(dimensions), identifier)
            .map(|doc| doc[FULLTEXT_FIELD].clone())
            .unwrap_or(Value::Null)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
