//! Driver for 7.x and later engines.

use async_trait::async_trait;
use canopy_core::{Document, DocumentTarget, EngineVersion, FulltextMerge, IndexSchema};
use serde_json::Value;

use super::{Driver, WireFormat, typeless_index_body};
use crate::admin::IndexAdmin;
use crate::bulk::BulkOperation;
use crate::script::ScriptDialect;

/// Typeless documents, Painless scripts with `source`.
///
/// A document id is unique per index, so changing a node's type simply
/// overwrites it and no duplicate cleanup is needed.
#[derive(Debug, Clone)]
pub struct TypelessDriver {
    admin: IndexAdmin,
    wire: WireFormat,
}

impl TypelessDriver {
    /// Create a driver.
    pub fn new(admin: IndexAdmin, retry_on_conflict: u32) -> Self {
        Self {
            admin,
            wire: WireFormat {
                typed: false,
                retry_key: "retry_on_conflict",
                retry_on_conflict,
                dialect: ScriptDialect::PainlessSource,
            },
        }
    }
}

#[async_trait]
impl Driver for TypelessDriver {
    fn version(&self) -> EngineVersion {
        EngineVersion::V7
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
        typeless_index_body(schema)
    }

    fn admin(&self) -> &IndexAdmin {
        &self.admin
    }
}
