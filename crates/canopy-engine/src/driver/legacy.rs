//! Driver for 1.x and 2.x engines.

use async_trait::async_trait;
use canopy_core::{
    Document, DocumentTarget, EngineVersion, Error, FulltextMerge, IndexSchema, Result,
};
use serde_json::{Value, json};

use super::{DuplicateCleanup, Driver, WireFormat, send_bulk, typed_index_body};
use crate::admin::IndexAdmin;
use crate::bulk::BulkOperation;
use crate::script::ScriptDialect;
use crate::transport::EngineRequest;

/// Typed documents, flat Groovy scripts.
///
/// These engines have no delete-by-query, so duplicates are found with a
/// search and removed with a bulk delete.
#[derive(Debug, Clone)]
pub struct LegacyDriver {
    admin: IndexAdmin,
    wire: WireFormat,
}

impl LegacyDriver {
    /// Create a driver.
    pub fn new(admin: IndexAdmin, retry_on_conflict: u32) -> Self {
        Self {
            admin,
            wire: WireFormat {
                typed: true,
                retry_key: "_retry_on_conflict",
                retry_on_conflict,
                dialect: ScriptDialect::FlatGroovy,
            },
        }
    }
}

#[async_trait]
impl Driver for LegacyDriver {
    fn version(&self) -> EngineVersion {
        EngineVersion::V1
    }

    fn index_operation(&self, target: &DocumentTarget, document: &Document) -> BulkOperation {
        self.wire.index_operation(target, document)
    }

    fn delete_operation(&self, target: &DocumentTarget) -> BulkOperation {
        self.wire.delete_operation(target)
    }

    fn fulltext_merge_operation(
        &self,
        target: &DocumentTarget,
        merge: &FulltextMerge,
    ) -> BulkOperation {
        self.wire.fulltext_merge_operation(target, merge)
    }

    fn index_body(&self, schema: &IndexSchema) -> Value {
        typed_index_body(schema)
    }

    fn admin(&self) -> &IndexAdmin {
        &self.admin
    }

    fn duplicate_cleanup(&self) -> Option<&dyn DuplicateCleanup> {
        Some(self)
    }
}

#[async_trait]
impl DuplicateCleanup for LegacyDriver {
    async fn remove_duplicates(
        &self,
        index: &str,
        document_id: &str,
        mapping_type: &str,
    ) -> Result<usize> {
        let query = json!({
            "query": {
                "bool": {
                    "must": {"ids": {"values": [document_id]}},
                    "must_not": {"term": {"_type": mapping_type}}
                }
            },
            "_source": false
        });
        let transport = self.admin.transport();
        let response = transport
            .send(EngineRequest::post(format!("{index}/_search"), query))
            .await?
            .into_result()?;
        let hits = response.body["hits"]["hits"]
            .as_array()
            .ok_or_else(|| Error::parse("search response has no hits"))?;

        let deletes: Vec<BulkOperation> = hits
            .iter()
            .filter_map(|hit| {
                let stale_type = hit.get("_type").and_then(Value::as_str)?;
                let id = hit.get("_id").and_then(Value::as_str)?;
                Some(
                    self.wire
                        .delete_operation(&DocumentTarget::new(index, id, stale_type)),
                )
            })
            .collect();
        if deletes.is_empty() {
            return Ok(0);
        }

        let report = send_bulk(transport.as_ref(), index, &deletes).await?;
        let removed = report.succeeded().count();
        log::debug!("Removed {removed} stale copies of {document_id} from {index}");
        Ok(removed)
    }
}
