//! Version-specific engine drivers.
//!
//! A [`Driver`] turns documents and fulltext merges into bulk operations in
//! the dialect of one engine generation, executes bulk requests, and renders
//! index creation bodies. Everything above this layer is version-agnostic.
//!
//! | Generation | Driver | Headers | Scripts | Duplicate cleanup |
//! |---|---|---|---|---|
//! | 1.x/2.x | [`LegacyDriver`] | typed, `_retry_on_conflict` | flat Groovy | search + bulk delete |
//! | 5.x/6.x | [`TypedDriver`] | typed, `_retry_on_conflict` | Painless `inline` | `_delete_by_query` |
//! | 7.x+ | [`TypelessDriver`] | typeless, `retry_on_conflict` | Painless `source` | none |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canopy_core::{EngineVersion, IndexConfig};
//! use canopy_engine::{HttpTransport, create_driver};
//!
//! let transport = Arc::new(HttpTransport::new(&config.engine)?);
//! let driver = create_driver(EngineVersion::V7, transport, &IndexConfig::default());
//! let report = driver.execute_bulk("content-abc-1", operations).await?;
//! ```

mod legacy;
mod typed;
mod typeless;

pub use legacy::LegacyDriver;
pub use typed::TypedDriver;
pub use typeless::TypelessDriver;

use std::sync::Arc;

use async_trait::async_trait;
use canopy_core::document::mapping_type_name;
use canopy_core::{
    Document, DocumentTarget, EngineVersion, FulltextMerge, IndexConfig, IndexSchema, Result,
};
use serde_json::{Map, Value, json};

use crate::admin::IndexAdmin;
use crate::bulk::{self, BulkAction, BulkOperation, BulkReport};
use crate::script::{self, ScriptDialect};
use crate::transport::{EngineRequest, Transport};

/// Removes stale copies of a document stored under another mapping type.
///
/// Typed engines key documents by (type, id); when a node changes type, the
/// copy under the old type must be deleted explicitly.
#[async_trait]
pub trait DuplicateCleanup: Send + Sync {
    /// Delete every document with `document_id` in `index` whose mapping
    /// type is not `mapping_type`. Returns the number deleted.
    async fn remove_duplicates(
        &self,
        index: &str,
        document_id: &str,
        mapping_type: &str,
    ) -> Result<usize>;
}

/// Engine-generation-specific operations.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Engine generation this driver speaks.
    fn version(&self) -> EngineVersion;

    /// Index or overwrite a document.
    ///
    /// Documents of fulltext root types are written through the
    /// preserve-fulltext script so already-merged fulltext survives.
    fn index_operation(&self, target: &DocumentTarget, document: &Document) -> BulkOperation;

    /// Delete a document.
    fn delete_operation(&self, target: &DocumentTarget) -> BulkOperation;

    /// Upsert-with-script applying a fulltext contribution to a root document.
    fn fulltext_merge_operation(
        &self,
        target: &DocumentTarget,
        merge: &FulltextMerge,
    ) -> BulkOperation;

    /// Body of the index creation request.
    fn index_body(&self, schema: &IndexSchema) -> Value;

    /// Index and alias management.
    fn admin(&self) -> &IndexAdmin;

    /// Duplicate cleanup, for generations that need it.
    fn duplicate_cleanup(&self) -> Option<&dyn DuplicateCleanup> {
        None
    }

    /// Send a batch to `index` and collect per-item results.
    ///
    /// Malformed operations are skipped and counted in
    /// [`BulkReport::skipped`]; a batch consisting only of malformed
    /// operations sends nothing.
    async fn execute_bulk(&self, index: &str, operations: Vec<BulkOperation>) -> Result<BulkReport> {
        send_bulk(self.admin().transport().as_ref(), index, &operations).await
    }
}

/// Build the driver for an engine generation.
pub fn create_driver(
    version: EngineVersion,
    transport: Arc<dyn Transport>,
    config: &IndexConfig,
) -> Arc<dyn Driver> {
    let admin = IndexAdmin::new(transport);
    log::debug!("Using {version} engine driver");
    match version {
        EngineVersion::V1 => Arc::new(LegacyDriver::new(admin, config.retry_on_conflict)),
        EngineVersion::V5 => Arc::new(TypedDriver::new(admin, config.retry_on_conflict)),
        EngineVersion::V7 => Arc::new(TypelessDriver::new(admin, config.retry_on_conflict)),
    }
}

pub(crate) async fn send_bulk(
    transport: &dyn Transport,
    index: &str,
    operations: &[BulkOperation],
) -> Result<BulkReport> {
    let (body, sent, skipped) = bulk::encode_batch(operations);
    if sent.is_empty() {
        return Ok(BulkReport {
            items: Vec::new(),
            skipped,
        });
    }
    log::debug!("Sending {} bulk operations to {index}", sent.len());
    let response = transport
        .send(EngineRequest::post_ndjson(format!("{index}/_bulk"), body))
        .await?
        .into_result()?;
    let mut report = bulk::parse_response(&response.body, &sent)?;
    report.skipped = skipped;
    for failure in report.failed() {
        log::debug!(
            "Bulk {} of {} failed with {}",
            failure.action,
            failure.id,
            failure.status
        );
    }
    Ok(report)
}

/// Action-line and script layout shared by the drivers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WireFormat {
    pub typed: bool,
    pub retry_key: &'static str,
    pub retry_on_conflict: u32,
    pub dialect: ScriptDialect,
}

impl WireFormat {
    fn metadata(&self, target: &DocumentTarget, action: BulkAction) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("_index".to_string(), json!(target.index));
        if self.typed {
            metadata.insert("_type".to_string(), json!(target.mapping_type));
        }
        metadata.insert("_id".to_string(), json!(target.id));
        if action == BulkAction::Update {
            metadata.insert(self.retry_key.to_string(), json!(self.retry_on_conflict));
        }
        metadata
    }

    pub fn index_operation(&self, target: &DocumentTarget, document: &Document) -> BulkOperation {
        if !document.fulltext_root {
            return BulkOperation::new(
                BulkAction::Index,
                self.metadata(target, BulkAction::Index),
                Some(Value::Object(document.source.clone())),
            );
        }
        let body = self.dialect.update_body(
            self.dialect.preserve_source(),
            script::preserve_params(&document.source),
            Value::Object(document.source.clone()),
        );
        BulkOperation::new(
            BulkAction::Update,
            self.metadata(target, BulkAction::Update),
            Some(body),
        )
    }

    pub fn delete_operation(&self, target: &DocumentTarget) -> BulkOperation {
        BulkOperation::new(
            BulkAction::Delete,
            self.metadata(target, BulkAction::Delete),
            None,
        )
    }

    pub fn fulltext_merge_operation(
        &self,
        target: &DocumentTarget,
        merge: &FulltextMerge,
    ) -> BulkOperation {
        let body = self.dialect.update_body(
            self.dialect.merge_source(),
            merge.params(),
            merge.upsert_document(),
        );
        BulkOperation::new(
            BulkAction::Update,
            self.metadata(target, BulkAction::Update),
            Some(body),
        )
    }
}

/// Index body with one mapping per mapping type.
pub(crate) fn typed_index_body(schema: &IndexSchema) -> Value {
    let mappings: Map<String, Value> = schema
        .mappings
        .iter()
        .map(|(node_type, mapping)| (mapping_type_name(node_type), mapping.clone()))
        .collect();
    json!({ "settings": schema.settings, "mappings": mappings })
}

/// Index body with all node type properties merged into one mapping.
pub(crate) fn typeless_index_body(schema: &IndexSchema) -> Value {
    let mut properties = Map::new();
    for (node_type, mapping) in &schema.mappings {
        let Some(declared) = mapping.get("properties").and_then(Value::as_object) else {
            continue;
        };
        for (name, definition) in declared {
            match properties.get(name) {
                Some(existing) if existing != definition => log::warn!(
                    "Property {name} of {node_type} conflicts with an earlier mapping, keeping the first"
                ),
                Some(_) => {}
                None => {
                    properties.insert(name.clone(), definition.clone());
                }
            }
        }
    }
    json!({ "settings": schema.settings, "mappings": { "properties": properties } })
}

// ============================================================================
// Tests
// ============================================================================
