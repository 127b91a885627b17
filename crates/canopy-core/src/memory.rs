//! In-memory content repository.
//!
//! Holds node variants in a flat list and resolves them the way a content
//! store would: by workspace, then by the best dimension fallback match.
//! Used by tests and by embedders that already have their tree in memory.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::node::{ContentNode, ROOT_PATH};
use crate::repository::{ContentRepository, NodeContext};

/// A content tree kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    nodes: RwLock<Vec<ContentNode>>,
    assets: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryContentRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding `nodes`.
    pub fn with_nodes(nodes: impl IntoIterator<Item = ContentNode>) -> Self {
        let repository = Self::new();
        for node in nodes {
            repository.upsert(node);
        }
        repository
    }

    /// Insert a node variant, replacing the variant with the same
    /// identifier, workspace, and dimension coordinate.
    pub fn upsert(&self, node: ContentNode) {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        match nodes.iter_mut().find(|n| {
            n.identifier == node.identifier
                && n.workspace == node.workspace
                && n.dimensions == node.dimensions
        }) {
            Some(existing) => *existing = node,
            None => nodes.push(node),
        }
    }

    /// Drop every variant of a node in a workspace.
    pub fn purge(&self, identifier: &str, workspace: &str) {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        nodes.retain(|n| !(n.identifier == identifier && n.workspace == workspace));
    }

    /// Attach asset bytes to a node property.
    pub fn set_asset(&self, identifier: &str, property: &str, bytes: Vec<u8>) {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        assets.insert((identifier.to_string(), property.to_string()), bytes);
    }

    /// Number of stored variants.
    pub fn len(&self) -> usize {
        self.nodes.read().map(|n| n.len()).unwrap_or_default()
    }

    /// Returns `true` if no variants are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-matching variant satisfying `predicate` in `context`.
    fn find_best<F>(&self, context: &NodeContext, predicate: F) -> Option<ContentNode>
    where
        F: Fn(&ContentNode) -> bool,
    {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .iter()
            .filter(|n| n.workspace == context.workspace && predicate(n))
            .filter_map(|n| {
                context
                    .dimensions
                    .fallback_rank(&n.dimensions)
                    .map(|rank| (rank, n))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, n)| n.clone())
    }

    fn node_by_path(&self, path: &str, context: &NodeContext) -> Option<ContentNode> {
        self.find_best(context, |n| n.path == path)
    }
}

impl ContentRepository for InMemoryContentRepository {
    fn root_node(&self, context: &NodeContext) -> Option<ContentNode> {
        self.node_by_path(ROOT_PATH, context)
    }

    fn child_nodes(&self, node: &ContentNode, context: &NodeContext) -> Vec<ContentNode> {
        let identifiers: Vec<String> = {
            let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
            nodes
                .iter()
                .filter(|n| {
                    n.workspace == context.workspace
                        && n.parent_path.as_deref() == Some(node.path.as_str())
                })
                .map(|n| n.identifier.clone())
                .collect()
        };
        let mut seen = HashSet::new();
        let mut children: Vec<ContentNode> = identifiers
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .filter_map(|id| self.resolve(&id, context))
            .filter(|child| child.parent_path.as_deref() == Some(node.path.as_str()))
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        children
    }

    fn parent_node(&self, node: &ContentNode, context: &NodeContext) -> Option<ContentNode> {
        let parent_path = node.parent_path.as_deref()?;
        self.node_by_path(parent_path, context)
    }

    fn resolve(&self, identifier: &str, context: &NodeContext) -> Option<ContentNode> {
        self.find_best(context, |n| n.identifier == identifier)
    }

    fn asset_content(&self, node: &ContentNode, property: &str) -> Option<Vec<u8>> {
        let assets = self.assets.read().unwrap_or_else(|e| e.into_inner());
        assets
            .get(&(node.identifier.clone(), property.to_string()))
            .cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
