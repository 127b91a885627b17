//! Content node representation.
//!
//! [`ContentNode`] is the read-only view of one node variant that the content
//! store hands to the pipeline. The pipeline never mutates nodes; it only
//! reads their identity, position, flags, and properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dimension::DimensionCombination;

/// Path of the absolute tree root.
pub const ROOT_PATH: &str = "/";

/// One variant of a node in the content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    /// Identifier stable across moves and renames.
    pub identifier: String,
    /// Slash-separated absolute path.
    pub path: String,
    /// Path of the parent node, `None` for the tree root.
    pub parent_path: Option<String>,
    /// Workspace this variant lives in.
    pub workspace: String,
    /// Node type name (e.g. `Acme.Site:Page`).
    pub node_type: String,
    /// Dimension coordinate of this variant.
    #[serde(default)]
    pub dimensions: DimensionCombination,
    /// Arbitrary property bag.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Node has been removed in this workspace.
    #[serde(default)]
    pub removed: bool,
    /// Node is hidden.
    #[serde(default)]
    pub hidden: bool,
    /// Hidden before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_before: Option<DateTime<Utc>>,
    /// Hidden after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_after: Option<DateTime<Utc>>,
}

impl ContentNode {
    /// Create a node under `path` with the given identifier and type.
    ///
    /// The parent path is derived from `path`; `/` has no parent.
    pub fn new(
        identifier: impl Into<String>,
        path: impl Into<String>,
        workspace: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            identifier: identifier.into(),
            parent_path: parent_of(&path),
            path,
            workspace: workspace.into(),
            node_type: node_type.into(),
            dimensions: DimensionCombination::empty(),
            properties: Map::new(),
            removed: false,
            hidden: false,
            hidden_before: None,
            hidden_after: None,
        }
    }

    /// Set the dimension coordinate.
    pub fn with_dimensions(mut self, dimensions: DimensionCombination) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set one property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Mark the node removed.
    pub fn removed(mut self) -> Self {
        self.removed = true;
        self
    }

    /// Mark the node hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Move the node to a new path, keeping its identifier.
    pub fn moved_to(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.parent_path = parent_of(&path);
        self.path = path;
        self
    }

    /// Returns `true` for the absolute tree root.
    pub fn is_tree_root(&self) -> bool {
        self.parent_path.is_none()
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// Parent of a slash-separated path; `None` for `/`.
pub fn parent_of(path: &str) -> Option<String> {
    if path == ROOT_PATH || path.is_empty() {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some(ROOT_PATH.to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
