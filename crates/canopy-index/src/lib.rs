#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Canopy Index — the indexing pipeline.
//!
//! Turns content-tree mutations into bulk operations and keeps the alias
//! pointing at exactly one physical index per dimension combination.
//!
//! # Modules
//!
//! - [`identifier`]: Document identifier strategies
//! - [`fulltext`]: Bucket extraction and fulltext root aggregation
//! - [`document`]: Document construction and property coercion
//! - [`queue`]: Pending index/remove requests
//! - [`indexer`]: Dimension fan-out and flushing
//! - [`naming`]: Physical index and alias names
//! - [`lifecycle`]: Rebuild, alias swap, and stale cleanup
//! - [`diagnostics`]: Failure reporting sinks

pub mod diagnostics;
pub mod document;
pub mod fulltext;
pub mod identifier;
pub mod indexer;
pub mod lifecycle;
pub mod naming;
pub mod queue;

// Re-export key types at crate root for convenience
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink, LogSink, MemorySink};
pub use document::DocumentBuilder;
pub use fulltext::{FulltextAggregator, FulltextExtractor, HtmlBucketExtractor, PlannedMerge};
pub use identifier::{
    IdentifierStrategy, IdentityBasedIdentifier, PathBasedIdentifier, strategy_from_config,
};
pub use indexer::{FlushReport, IndexingMode, NodeIndexer, NodeIndexerBuilder};
pub use lifecycle::{IndexLifecycle, IndexState, RebuildHandle, RebuildStats};
pub use naming::{IndexNaming, timestamp_postfix};
pub use queue::{Disposition, IndexingQueue, QueuedNode};
