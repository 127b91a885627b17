//! Node indexer.
//!
//! The mutation-driven entry point of the pipeline. [`NodeIndexer::index_node`]
//! and [`NodeIndexer::remove_node`] queue a node; a flush fans every queued
//! node out over the dimension combinations, builds documents and fulltext
//! merges, renders them through the [`Driver`], and sends one bulk request
//! per physical index.
//!
//! The indexer runs in one of two modes:
//!
//! - **live**: target indices are resolved through the alias, and stale
//!   copies under an old node type are removed before indexing;
//! - **bulk**: target indices are set explicitly by a rebuild and duplicate
//!   cleanup is skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut indexer = NodeIndexer::builder(config, repository, driver).build()?;
//! indexer.index_node(&node, None).await?;
//! let report = indexer.flush().await?;
//! println!("{} operations, {} failed", report.operations, report.failed);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use canopy_core::document::mapping_type_name;
use canopy_core::{
    AssetExtractor, CanopyConfig, ContentNode, ContentRepository, DimensionCombination,
    DimensionResolver, DocumentTarget, FulltextBuckets, NodeContext, PlainTextExtractor, Result,
    StaticDimensions, fan_out_combinations,
};
use canopy_engine::{BulkOperation, BulkReport, Driver};
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticsSink, LogSink};
use crate::document::DocumentBuilder;
use crate::fulltext::{FulltextAggregator, FulltextExtractor, HtmlBucketExtractor};
use crate::identifier::{IdentifierStrategy, strategy_from_config};
use crate::naming::IndexNaming;
use crate::queue::{Disposition, IndexingQueue, QueuedNode};

/// Outcome of one or more flushes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Queued nodes processed.
    pub nodes: usize,
    /// Bulk operations sent.
    pub operations: usize,
    /// Operations the engine rejected.
    pub failed: usize,
    /// Operations dropped before sending.
    pub skipped: usize,
    /// Physical indices written to.
    pub indices: BTreeSet<String>,
}

impl FlushReport {
    /// Returns `true` if nothing failed or was dropped.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Add another report to this one.
    pub fn merge(&mut self, other: FlushReport) {
        self.nodes += other.nodes;
        self.operations += other.operations;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.indices.extend(other.indices);
    }
}

/// Where documents are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingMode {
    /// Resolve the index of each combination through the alias.
    Live,
    /// Write to explicit per-combination indices; no duplicate cleanup.
    Bulk {
        /// Target physical index per combination.
        targets: BTreeMap<DimensionCombination, String>,
    },
}

/// Operations collected during one flush, grouped by physical index.
#[derive(Debug, Default)]
struct Batches {
    by_index: BTreeMap<String, Vec<BulkOperation>>,
    skipped: usize,
}

/// Queues node mutations and turns them into bulk operations.
pub struct NodeIndexer {
    config: Arc<CanopyConfig>,
    repository: Arc<dyn ContentRepository>,
    dimensions: Arc<dyn DimensionResolver>,
    driver: Arc<dyn Driver>,
    identifiers: Arc<dyn IdentifierStrategy>,
    documents: DocumentBuilder,
    fulltext: FulltextAggregator,
    diagnostics: Arc<dyn DiagnosticsSink>,
    naming: IndexNaming,
    queue: IndexingQueue,
    mode: IndexingMode,
    restrict_to: Option<DimensionCombination>,
    live_targets: BTreeMap<DimensionCombination, Option<String>>,
}

impl std::fmt::Debug for NodeIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIndexer")
            .field("alias", &self.naming.alias())
            .field("engine", &self.driver.version())
            .field("identifiers", &self.identifiers.name())
            .field("mode", &self.mode)
            .field("restrict_to", &self.restrict_to)
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl NodeIndexer {
    /// Start building an indexer.
    pub fn builder(
        config: Arc<CanopyConfig>,
        repository: Arc<dyn ContentRepository>,
        driver: Arc<dyn Driver>,
    ) -> NodeIndexerBuilder {
        NodeIndexerBuilder {
            config,
            repository,
            driver,
            dimensions: None,
            extractor: None,
            assets: None,
            identifiers: None,
            diagnostics: None,
        }
    }

    // ========================================================================
    // Mutation API
    // ========================================================================

    /// Queue `node` for indexing into `target_workspace` (defaults to the
    /// node's own workspace). Returns the report of an automatic flush.
    pub async fn index_node(
        &mut self,
        node: &ContentNode,
        target_workspace: Option<&str>,
    ) -> Result<Option<FlushReport>> {
        let target = target_workspace.unwrap_or(&node.workspace);
        if !self.accepts(node, target) {
            log::trace!("Not indexing {} outside the live workspace", node.path);
            return Ok(None);
        }
        if self.queue.enqueue_index(node.clone(), target) {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    /// Queue `node` for removal from `target_workspace` (defaults to the
    /// node's own workspace). Returns the report of an automatic flush.
    pub async fn remove_node(
        &mut self,
        node: &ContentNode,
        target_workspace: Option<&str>,
    ) -> Result<Option<FlushReport>> {
        let target = target_workspace.unwrap_or(&node.workspace);
        if !self.accepts(node, target) {
            log::trace!("Not removing {} outside the live workspace", node.path);
            return Ok(None);
        }
        if self.queue.enqueue_remove(node.clone(), target) {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    /// Send everything queued.
    ///
    /// The queue is only cleared when every bulk request was answered; after
    /// an error the same flush can be retried.
    ///
    /// In live mode the alias is read again on every flush, so writes follow
    /// a swap made by another process.
    pub async fn flush(&mut self) -> Result<FlushReport> {
        let pending = self.queue.pending();
        if pending.is_empty() {
            return Ok(FlushReport::default());
        }
        let started = Instant::now();
        self.live_targets.clear();

        let mut batches = Batches::default();
        for queued in &pending {
            match queued.disposition {
                Disposition::Index => self.collect_index(queued, &mut batches).await?,
                Disposition::Remove => {
                    for combination in self.combinations() {
                        let context = NodeContext::new(queued.node.workspace.clone(), combination);
                        self.collect_removal(&queued.node, &queued.target_workspace, &context, &mut batches)
                            .await?;
                    }
                }
            }
        }

        let mut report = FlushReport {
            nodes: pending.len(),
            skipped: batches.skipped,
            ..Default::default()
        };
        for (index, operations) in batches.by_index {
            let result = self.driver.execute_bulk(&index, operations).await?;
            report.operations += result.items.len();
            report.skipped += result.skipped;
            report.failed += self.report_failures(&index, &result);
            report.indices.insert(index);
        }

        self.queue.clear();
        log::info!(
            "Flushed {} nodes as {} operations to {} indices in {:?} ({} failed, {} skipped)",
            report.nodes,
            report.operations,
            report.indices.len(),
            started.elapsed(),
            report.failed,
            report.skipped
        );
        Ok(report)
    }

    // ========================================================================
    // Modes
    // ========================================================================

    /// Write to explicit per-combination indices without duplicate cleanup.
    pub fn set_bulk_mode(&mut self, targets: BTreeMap<DimensionCombination, String>) {
        self.mode = IndexingMode::Bulk { targets };
    }

    /// Resolve target indices through the alias again.
    pub fn set_live_mode(&mut self) {
        self.mode = IndexingMode::Live;
        self.live_targets.clear();
    }

    /// Current mode.
    pub fn mode(&self) -> &IndexingMode {
        &self.mode
    }

    /// Limit fan-out to one combination, or lift the limit with `None`.
    pub fn restrict_to(&mut self, combination: Option<DimensionCombination>) {
        self.restrict_to = combination;
    }

    /// Combinations a queued node fans out over.
    pub fn combinations(&self) -> Vec<DimensionCombination> {
        match &self.restrict_to {
            Some(combination) => vec![combination.clone()],
            None => fan_out_combinations(self.dimensions.as_ref()),
        }
    }

    /// All allowed combinations, ignoring any restriction.
    pub fn all_combinations(&self) -> Vec<DimensionCombination> {
        fan_out_combinations(self.dimensions.as_ref())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Pending node count.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The engine driver.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The content repository.
    pub fn repository(&self) -> &Arc<dyn ContentRepository> {
        &self.repository
    }

    /// Index naming convention.
    pub fn naming(&self) -> &IndexNaming {
        &self.naming
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &CanopyConfig {
        &self.config
    }

    /// Diagnostics sink.
    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticsSink> {
        &self.diagnostics
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Single restrict-to-live check for both mutation calls.
    fn accepts(&self, node: &ContentNode, target_workspace: &str) -> bool {
        let live = self.config.indexing.live_workspace.as_str();
        self.config.indexing.index_all_workspaces
            || target_workspace == live
            || node.workspace == live
    }

    async fn collect_index(&mut self, queued: &QueuedNode, batches: &mut Batches) -> Result<()> {
        let node = &queued.node;
        let target = queued.target_workspace.as_str();
        for combination in self.combinations() {
            let context = NodeContext::new(node.workspace.clone(), combination);
            let variant = match self.repository.resolve(&node.identifier, &context) {
                Some(variant) if !variant.removed => variant,
                Some(variant) => {
                    self.collect_removal(&variant, target, &context, batches).await?;
                    continue;
                }
                None if node.removed => {
                    self.collect_removal(node, target, &context, batches).await?;
                    continue;
                }
                None => {
                    log::debug!(
                        "{} ({}) does not resolve in {}, skipping",
                        node.path,
                        node.identifier,
                        context.dimensions
                    );
                    continue;
                }
            };

            let Some(index) = self.target_index(&context.dimensions).await? else {
                self.report_missing_index(&variant, &context.dimensions);
                continue;
            };
            let document_id = self.identifiers.identify(&variant, target, &context.dimensions);

            if matches!(self.mode, IndexingMode::Live) && self.config.indexing.cleanup_duplicates {
                if let Some(cleanup) = self.driver.duplicate_cleanup() {
                    cleanup
                        .remove_duplicates(&index, &document_id, &mapping_type_name(&variant.node_type))
                        .await?;
                }
            }

            let document =
                match self
                    .documents
                    .build(&variant, document_id.clone(), target, &context.dimensions)
                {
                    Ok(document) => document,
                    Err(e) => {
                        log::warn!("Dropping {} from {index}: {e}", variant.path);
                        self.diagnostics.record(
                            Diagnostic::new(DiagnosticKind::MalformedPayload, e.to_string())
                                .with_index(index.clone())
                                .with_document(document_id)
                                .with_payload(Value::Object(variant.properties.clone())),
                        );
                        batches.skipped += 1;
                        continue;
                    }
                };

            let document_target =
                DocumentTarget::new(index.clone(), document.id.clone(), document.mapping_type());
            let operation = self.driver.index_operation(&document_target, &document);
            self.push(batches, &index, operation);

            if self.fulltext.is_enabled(&variant) {
                let buckets = self.fulltext.extract(&variant);
                self.collect_merge(&variant, buckets, target, &context, &index, batches);
            }
        }
        Ok(())
    }

    async fn collect_removal(
        &mut self,
        node: &ContentNode,
        target: &str,
        context: &NodeContext,
        batches: &mut Batches,
    ) -> Result<()> {
        let Some(index) = self.target_index(&context.dimensions).await? else {
            self.report_missing_index(node, &context.dimensions);
            return Ok(());
        };
        let document_id = self.identifiers.identify(node, target, &context.dimensions);
        let operation = self.driver.delete_operation(&DocumentTarget::new(
            index.clone(),
            document_id,
            mapping_type_name(&node.node_type),
        ));
        self.push(batches, &index, operation);

        if self.fulltext.is_enabled(node) {
            let removed = node.clone().removed();
            self.collect_merge(&removed, FulltextBuckets::new(), target, context, &index, batches);
        }
        Ok(())
    }

    fn collect_merge(
        &self,
        node: &ContentNode,
        buckets: FulltextBuckets,
        target: &str,
        context: &NodeContext,
        index: &str,
        batches: &mut Batches,
    ) {
        let Some(planned) =
            self.fulltext
                .plan_merge(node, buckets, context, target, self.identifiers.as_ref())
        else {
            return;
        };
        let root = DocumentTarget::new(
            index,
            planned.root_document_id,
            mapping_type_name(&planned.root_node_type),
        );
        let operation = self.driver.fulltext_merge_operation(&root, &planned.merge);
        self.push(batches, index, operation);
    }

    fn push(&self, batches: &mut Batches, index: &str, operation: BulkOperation) {
        if let Err(e) = operation.validate() {
            log::warn!("Dropping malformed {} operation for {index}: {e}", operation.action);
            self.diagnostics.record(
                Diagnostic::new(DiagnosticKind::MalformedPayload, e.to_string())
                    .with_index(index)
                    .with_document(operation.id().unwrap_or_default()),
            );
            batches.skipped += 1;
            return;
        }
        batches
            .by_index
            .entry(index.to_string())
            .or_default()
            .push(operation);
    }

    async fn target_index(&mut self, combination: &DimensionCombination) -> Result<Option<String>> {
        if let IndexingMode::Bulk { targets } = &self.mode {
            return Ok(targets.get(combination).cloned());
        }
        if let Some(cached) = self.live_targets.get(combination) {
            return Ok(cached.clone());
        }

        let behind_alias = self
            .driver
            .admin()
            .indices_behind_alias(self.naming.alias())
            .await?;
        let mut candidates: Vec<String> = behind_alias
            .into_iter()
            .filter(|name| self.naming.belongs_to(name, combination))
            .collect();
        if candidates.len() > 1 {
            log::warn!(
                "Alias {} has {} indices for {combination}, using the newest",
                self.naming.alias(),
                candidates.len()
            );
        }
        let target = candidates.pop();
        self.live_targets.insert(combination.clone(), target.clone());
        Ok(target)
    }

    fn report_missing_index(&self, node: &ContentNode, combination: &DimensionCombination) {
        log::warn!(
            "No index behind alias {} for {combination}, skipping {}",
            self.naming.alias(),
            node.path
        );
        self.diagnostics.record(Diagnostic::new(
            DiagnosticKind::MissingIndex,
            format!(
                "no physical index for combination '{combination}' (node {})",
                node.identifier
            ),
        ));
    }

    fn report_failures(&self, index: &str, report: &BulkReport) -> usize {
        let mut failed = 0;
        for item in report.failed() {
            failed += 1;
            let mut diagnostic = Diagnostic::new(
                DiagnosticKind::ItemRejected,
                item.error.clone().unwrap_or_else(|| "rejected".to_string()),
            )
            .with_index(index)
            .with_document(item.id.clone())
            .with_status(item.status);
            if let Some(payload) = &item.payload {
                diagnostic = diagnostic.with_payload(payload.clone());
            }
            self.diagnostics.record(diagnostic);
        }
        failed
    }
}

/// Configures a [`NodeIndexer`].
pub struct NodeIndexerBuilder {
    config: Arc<CanopyConfig>,
    repository: Arc<dyn ContentRepository>,
    driver: Arc<dyn Driver>,
    dimensions: Option<Arc<dyn DimensionResolver>>,
    extractor: Option<Arc<dyn FulltextExtractor>>,
    assets: Option<Arc<dyn AssetExtractor>>,
    identifiers: Option<Arc<dyn IdentifierStrategy>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl NodeIndexerBuilder {
    /// Dimension resolver; defaults to the combinations in configuration.
    pub fn dimensions(mut self, dimensions: Arc<dyn DimensionResolver>) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Fulltext extractor; defaults to [`HtmlBucketExtractor`].
    pub fn extractor(mut self, extractor: Arc<dyn FulltextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Asset extractor; defaults to [`PlainTextExtractor`].
    pub fn assets(mut self, assets: Arc<dyn AssetExtractor>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Identifier strategy; defaults to the configured one.
    pub fn identifiers(mut self, identifiers: Arc<dyn IdentifierStrategy>) -> Self {
        self.identifiers = Some(identifiers);
        self
    }

    /// Diagnostics sink; defaults to [`LogSink`].
    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Build the indexer. Fails on an invalid index base name.
    pub fn build(self) -> Result<NodeIndexer> {
        let naming = IndexNaming::new(self.config.index.base_name.clone())?;
        let dimensions = self.dimensions.unwrap_or_else(|| {
            Arc::new(StaticDimensions::new(self.config.dimensions.clone()))
        });
        let identifiers = self
            .identifiers
            .unwrap_or_else(|| Arc::from(strategy_from_config(&self.config.indexing)));
        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(HtmlBucketExtractor::new()));
        let assets = self.assets.unwrap_or_else(|| Arc::new(PlainTextExtractor));
        let diagnostics = self.diagnostics.unwrap_or_else(|| Arc::new(LogSink));

        Ok(NodeIndexer {
            documents: DocumentBuilder::new(
                self.config.clone(),
                self.repository.clone(),
                assets,
            ),
            fulltext: FulltextAggregator::new(
                self.repository.clone(),
                self.config.clone(),
                extractor,
            ),
            queue: IndexingQueue::new(self.config.index.batch_size),
            config: self.config,
            repository: self.repository,
            dimensions,
            driver: self.driver,
            identifiers,
            diagnostics,
            naming,
            mode: IndexingMode::Live,
            restrict_to: None,
            live_targets: BTreeMap::new(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
