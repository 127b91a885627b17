//! Driver for 5.x and 6.x engines.

use async_trait::async_trait;
use canopy_core::{Document, DocumentTarget, EngineVersion, FulltextMerge, IndexSchema, Result};
use serde_json::{Value, json};

use super::{DuplicateCleanup, Driver, WireFormat, typed_index_body};
use crate::admin::IndexAdmin;
use crate::bulk::BulkOperation;
use crate::script::ScriptDialect;
use crate::transport::EngineRequest;

/// Typed documents, Painless scripts with `inline` sources.
#[derive(Debug, Clone)]
pub struct TypedDriver {
    admin: IndexAdmin,
    wire: WireFormat,
}

impl TypedDriver {
    /// Create a driver.
    pub fn new(admin: IndexAdmin, retry_on_conflict: u32) -> Self {
        Self {
            admin,
            wire: WireFormat {
                typed: true,
                retry_key: "_retry_on_conflict",
                retry_on_conflict,
                dialect: ScriptDialect::PainlessInline,
            },
        }
    }
}

#[async_trait]
impl Driver for TypedDriver {
    fn version(&self) -> EngineVersion {
        EngineVersion::V5
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
impl DuplicateCleanup for TypedDriver {
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
            }
        });
        let response = self
            .admin
            .transport()
            .send(EngineRequest::post(format!("{index}/_delete_by_query"), query))
            .await?
            .into_result()?;
        let deleted = response.body["deleted"].as_u64().unwrap_or(0) as usize;
        if deleted > 0 {
            log::debug!("Removed {deleted} stale copies of {document_id} from {index}");
        }
        Ok(deleted)
    }
}
