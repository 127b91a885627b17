//! Search document representation.
//!
//! A [`Document`] is the serialized form of one node variant: its identifier,
//! the mapping type it is stored under, and the JSON source sent to the
//! engine. Field names owned by the pipeline are prefixed with `__` so they
//! never clash with node properties.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable node identifier.
pub const IDENTIFIER_FIELD: &str = "__identifier";
/// Node type name.
pub const NODE_TYPE_FIELD: &str = "__nodeType";
/// Node type name followed by all of its supertypes.
pub const TYPE_AND_SUPERTYPES_FIELD: &str = "__typeAndSupertypes";
/// Node path.
pub const PATH_FIELD: &str = "__path";
/// Parent node path.
pub const PARENT_PATH_FIELD: &str = "__parentPath";
/// Target workspace, only set for non-default workspaces.
pub const WORKSPACE_FIELD: &str = "__workspace";
/// The dimension combination the document was indexed for.
pub const DIMENSIONS_FIELD: &str = "__dimensionCombinations";
/// Hash of [`DIMENSIONS_FIELD`], used for exact-match filtering.
pub const DIMENSIONS_HASH_FIELD: &str = "__dimensionCombinationHash";
/// Hidden flag.
pub const HIDDEN_FIELD: &str = "__hidden";
/// Hidden-before timestamp.
pub const HIDDEN_BEFORE_FIELD: &str = "__hiddenBeforeDateTime";
/// Hidden-after timestamp.
pub const HIDDEN_AFTER_FIELD: &str = "__hiddenAfterDateTime";

/// Where a document lives in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentTarget {
    /// Physical index name.
    pub index: String,
    /// Document identifier.
    pub id: String,
    /// Mapping type (ignored by typeless engines).
    pub mapping_type: String,
}

impl DocumentTarget {
    /// Create a target.
    pub fn new(
        index: impl Into<String>,
        id: impl Into<String>,
        mapping_type: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            mapping_type: mapping_type.into(),
        }
    }
}

/// A document ready to be sent to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub id: String,
    /// Node type name of the source node.
    pub node_type: String,
    /// Whether the node type is a fulltext root; such documents must never
    /// be blindly overwritten.
    pub fulltext_root: bool,
    /// JSON source.
    pub source: Map<String, Value>,
}

impl Document {
    /// Mapping type name derived from the node type.
    pub fn mapping_type(&self) -> String {
        mapping_type_name(&self.node_type)
    }
}

/// Mapping type for a node type name.
///
/// Engines reject `.` in type names, so `Acme.Site:Page` becomes
/// `Acme-Site:Page`.
pub fn mapping_type_name(node_type: &str) -> String {
    node_type.replace('.', "-")
}
