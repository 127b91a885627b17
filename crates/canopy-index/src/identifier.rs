//! Document identifier strategies.
//!
//! A document identifier names one (node, workspace, dimension combination)
//! triple in the engine. Both strategies hash a JSON-encoded tuple, so
//! distinct triples never share an encoding and the only collision source is
//! the hash itself.
//!
//! The two strategies produce different identifiers for the same node.
//! Switching strategy on an existing index leaves the old documents behind;
//! a full rebuild is required.

use canopy_core::{ContentNode, DimensionCombination, IdentifierStrategyKind, IndexingConfig};
use serde::Serialize;

/// Derives document identifiers.
///
/// Implementations must be pure and deterministic.
pub trait IdentifierStrategy: Send + Sync {
    /// Identifier of `node` indexed into `workspace` for `dimensions`.
    fn identify(
        &self,
        node: &ContentNode,
        workspace: &str,
        dimensions: &DimensionCombination,
    ) -> String;

    /// Strategy name for diagnostics.
    fn name(&self) -> &'static str;
}

fn digest(tuple: &impl Serialize) -> String {
    // Tuples of strings and string maps always serialize.
    let encoded = serde_json::to_vec(tuple).unwrap_or_default();
    blake3::hash(&encoded).to_hex().to_string()
}

/// Hash of workspace, path, and dimension coordinate.
///
/// Changes whenever the node is moved or renamed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathBasedIdentifier;

impl IdentifierStrategy for PathBasedIdentifier {
    fn identify(
        &self,
        node: &ContentNode,
        workspace: &str,
        dimensions: &DimensionCombination,
    ) -> String {
        digest(&("path", workspace, &node.path, dimensions))
    }

    fn name(&self) -> &'static str {
        "path"
    }
}

/// Hash of content repository, workspace, dimensions, and the node's stable
/// identifier.
///
/// Survives moves and renames.
#[derive(Debug, Clone)]
pub struct IdentityBasedIdentifier {
    content_repository_id: String,
}

impl IdentityBasedIdentifier {
    /// Create a strategy scoped to one content repository.
    pub fn new(content_repository_id: impl Into<String>) -> Self {
        Self {
            content_repository_id: content_repository_id.into(),
        }
    }
}

impl IdentifierStrategy for IdentityBasedIdentifier {
    fn identify(
        &self,
        node: &ContentNode,
        workspace: &str,
        dimensions: &DimensionCombination,
    ) -> String {
        digest(&(
            "identity",
            &self.content_repository_id,
            workspace,
            dimensions,
            &node.identifier,
        ))
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// The strategy selected by configuration.
pub fn strategy_from_config(config: &IndexingConfig) -> Box<dyn IdentifierStrategy> {
    match config.identifier_strategy {
        IdentifierStrategyKind::Identity => Box::new(IdentityBasedIdentifier::new(
            config.content_repository_id.clone(),
        )),
        IdentifierStrategyKind::Path => Box::new(PathBasedIdentifier),
    }
}

// ============================================================================
// Tests
// ============================================================================
