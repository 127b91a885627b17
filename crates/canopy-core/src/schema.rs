//! Pre-computed index schema.
//!
//! Deriving mappings from node type declarations happens outside the
//! pipeline. The lifecycle manager only needs the finished settings and one
//! mapping per node type, which drivers then render in their own index
//! creation format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings plus per-node-type mappings for a new physical index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index settings (analysis, shards, ...).
    #[serde(default)]
    pub settings: Map<String, Value>,
    /// Node type name → mapping definition.
    #[serde(default)]
    pub mappings: BTreeMap<String, Value>,
}

/// Supplies the schema applied to every rebuilt physical index.
pub trait SchemaProvider: Send + Sync {
    /// The schema for a new physical index.
    fn index_schema(&self) -> IndexSchema;
}

/// A schema fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    schema: IndexSchema,
}

impl StaticSchema {
    /// Wrap an existing schema.
    pub fn new(schema: IndexSchema) -> Self {
        Self { schema }
    }

    /// Add a mapping for one node type.
    pub fn with_mapping(mut self, node_type: impl Into<String>, mapping: Value) -> Self {
        self.schema.mappings.insert(node_type.into(), mapping);
        self
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.schema.settings = settings;
        self
    }
}

impl SchemaProvider for StaticSchema {
    fn index_schema(&self) -> IndexSchema {
        self.schema.clone()
    }
}
