//! Content tree and dimension collaborator interfaces.
//!
//! The pipeline only reads the content tree. Implementations wrap whatever
//! store holds the nodes; [`InMemoryContentRepository`](crate::memory::InMemoryContentRepository)
//! is the reference implementation.

use crate::dimension::DimensionCombination;
use crate::node::ContentNode;

/// Workspace and dimension combination a node is resolved in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeContext {
    /// Workspace name.
    pub workspace: String,
    /// Dimension combination.
    pub dimensions: DimensionCombination,
}

impl NodeContext {
    /// Create a context.
    pub fn new(workspace: impl Into<String>, dimensions: DimensionCombination) -> Self {
        Self {
            workspace: workspace.into(),
            dimensions,
        }
    }
}

/// Read access to the hierarchical content store.
pub trait ContentRepository: Send + Sync {
    /// The absolute tree root in a context.
    fn root_node(&self, context: &NodeContext) -> Option<ContentNode>;

    /// Children of `node`, resolved in `context`.
    fn child_nodes(&self, node: &ContentNode, context: &NodeContext) -> Vec<ContentNode>;

    /// Parent of `node`, resolved in `context`.
    fn parent_node(&self, node: &ContentNode, context: &NodeContext) -> Option<ContentNode>;

    /// Resolve a node by its stable identifier.
    fn resolve(&self, identifier: &str, context: &NodeContext) -> Option<ContentNode>;

    /// Raw bytes of a binary-bearing property, if any.
    fn asset_content(&self, _node: &ContentNode, _property: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Source of the allowed dimension combinations.
pub trait DimensionResolver: Send + Sync {
    /// All combinations the pipeline fans out over.
    ///
    /// An empty list means the content model is dimension-less.
    fn all_combinations(&self) -> Vec<DimensionCombination>;
}

/// A fixed list of combinations, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDimensions {
    combinations: Vec<DimensionCombination>,
}

impl StaticDimensions {
    /// Create a resolver returning exactly `combinations`.
    pub fn new(combinations: Vec<DimensionCombination>) -> Self {
        Self { combinations }
    }
}

impl DimensionResolver for StaticDimensions {
    fn all_combinations(&self) -> Vec<DimensionCombination> {
        self.combinations.clone()
    }
}

/// Combinations to fan out over, with the dimension-less case mapped to a
/// single empty combination.
pub fn fan_out_combinations(resolver: &dyn DimensionResolver) -> Vec<DimensionCombination> {
    let combinations = resolver.all_combinations();
    if combinations.is_empty() {
        vec![DimensionCombination::empty()]
    } else {
        combinations
    }
}
