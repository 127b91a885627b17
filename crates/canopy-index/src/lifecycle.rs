//! Index lifecycle: rebuild, alias swap, and stale cleanup.
//!
//! Each dimension combination moves through
//! `absent → building → live → stale → deleted`. A rebuild creates one new
//! physical index per combination, fills it by walking the content tree,
//! and then points the alias at all new indices in a single atomic call.
//! Until that call readers keep seeing the previous indices, so an aborted
//! rebuild only leaves unaliased indices behind for [`IndexLifecycle::cleanup_stale`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use canopy_core::{
    DimensionCombination, Error, NodeContext, Result, SchemaProvider,
};
use canopy_engine::IndexAdmin;
use serde_json::Value;

use crate::indexer::{FlushReport, NodeIndexer};

/// Where a physical index is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexState {
    /// Does not exist.
    Absent,
    /// Created by the current rebuild and not yet aliased.
    Building,
    /// Behind the alias.
    Live,
    /// Exists but is neither aliased nor being built.
    Stale,
    /// Removed by a cleanup.
    Deleted,
}

/// Indices created by one rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildHandle {
    /// Postfix shared by every new index.
    pub postfix: String,
    /// New physical index per combination.
    pub indices: BTreeMap<DimensionCombination, String>,
}

impl RebuildHandle {
    /// The new index for `combination`.
    pub fn index_for(&self, combination: &DimensionCombination) -> Option<&str> {
        self.indices.get(combination).map(String::as_str)
    }

    /// Returns `true` if `name` was created by this rebuild.
    pub fn contains(&self, name: &str) -> bool {
        self.indices.values().any(|index| index == name)
    }
}

/// Counters for a tree rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Combinations walked.
    pub combinations: usize,
    /// Nodes reached by the traversal.
    pub nodes_visited: usize,
    /// Flushes performed.
    pub flushes: usize,
    /// Folded flush reports.
    pub report: FlushReport,
}

impl RebuildStats {
    fn record(&mut self, report: FlushReport) {
        self.flushes += 1;
        self.report.merge(report);
    }

    /// Add another run's counters.
    pub fn merge(&mut self, other: RebuildStats) {
        self.combinations += other.combinations;
        self.nodes_visited += other.nodes_visited;
        self.flushes += other.flushes;
        self.report.merge(other.report);
    }
}

/// Drives rebuilds around a [`NodeIndexer`].
pub struct IndexLifecycle {
    indexer: NodeIndexer,
    schema: Arc<dyn SchemaProvider>,
    current: Option<RebuildHandle>,
    deleted: BTreeSet<String>,
}

impl std::fmt::Debug for IndexLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexLifecycle")
            .field("indexer", &self.indexer)
            .field("current", &self.current)
            .field("deleted", &self.deleted.len())
            .finish()
    }
}

impl IndexLifecycle {
    /// Wrap an indexer; `schema` is applied to every new index.
    pub fn new(indexer: NodeIndexer, schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            indexer,
            schema,
            current: None,
            deleted: BTreeSet::new(),
        }
    }

    /// The wrapped indexer.
    pub fn indexer(&self) -> &NodeIndexer {
        &self.indexer
    }

    /// The wrapped indexer, for mutation-driven indexing between rebuilds.
    pub fn indexer_mut(&mut self) -> &mut NodeIndexer {
        &mut self.indexer
    }

    /// The rebuild in progress, if any.
    pub fn current_rebuild(&self) -> Option<&RebuildHandle> {
        self.current.as_ref()
    }

    fn admin(&self) -> &IndexAdmin {
        self.indexer.driver().admin()
    }

    /// Create one new physical index per combination and switch the indexer
    /// to write into them.
    pub async fn start_rebuild(&mut self, postfix: &str) -> Result<RebuildHandle> {
        if let Some(current) = &self.current {
            return Err(Error::config(format!(
                "rebuild '{}' is still in progress",
                current.postfix
            )));
        }

        let mut schema = self.schema.index_schema();
        for (key, value) in &self.indexer.config().index.settings {
            schema.settings.insert(key.clone(), value.clone());
        }
        let body = self.indexer.driver().index_body(&schema);

        let mut indices = BTreeMap::new();
        for combination in self.indexer.all_combinations() {
            let name = self.indexer.naming().physical_name(&combination, postfix)?;
            self.admin().create_index(&name, body.clone()).await?;
            indices.insert(combination, name);
        }
        log::info!(
            "Started rebuild '{postfix}' with {} new indices behind alias {}",
            indices.len(),
            self.indexer.naming().alias()
        );

        let handle = RebuildHandle {
            postfix: postfix.to_string(),
            indices,
        };
        self.indexer.set_bulk_mode(handle.indices.clone());
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Index the whole live tree of one combination into its new index.
    pub async fn rebuild_tree(&mut self, combination: &DimensionCombination) -> Result<RebuildStats> {
        let Some(handle) = &self.current else {
            return Err(Error::config("rebuild_tree called without start_rebuild"));
        };
        if handle.index_for(combination).is_none() {
            return Err(Error::config(format!(
                "combination '{combination}' is not part of rebuild '{}'",
                handle.postfix
            )));
        }

        self.indexer.restrict_to(Some(combination.clone()));
        let result = self.walk(combination).await;
        self.indexer.restrict_to(None);
        result
    }

    /// Rebuild every combination of the current rebuild.
    pub async fn rebuild_all(&mut self) -> Result<RebuildStats> {
        let combinations: Vec<DimensionCombination> = self
            .current
            .as_ref()
            .map(|handle| handle.indices.keys().cloned().collect())
            .unwrap_or_default();
        let mut stats = RebuildStats::default();
        for combination in &combinations {
            stats.merge(self.rebuild_tree(combination).await?);
        }
        Ok(stats)
    }

    async fn walk(&mut self, combination: &DimensionCombination) -> Result<RebuildStats> {
        let context = NodeContext::new(
            self.indexer.config().indexing.live_workspace.clone(),
            combination.clone(),
        );
        let repository = self.indexer.repository().clone();
        let mut stats = RebuildStats {
            combinations: 1,
            ..Default::default()
        };

        let Some(root) = repository.root_node(&context) else {
            log::warn!("No tree root in {} for {combination}", context.workspace);
            return Ok(stats);
        };

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let children = repository.child_nodes(&node, &context);
            stats.nodes_visited += 1;
            if let Some(report) = self.indexer.index_node(&node, None).await? {
                stats.record(report);
            }
            stack.extend(children.into_iter().rev());
        }
        stats.record(self.indexer.flush().await?);

        log::info!(
            "Rebuilt {combination}: {} nodes, {} operations, {} failed",
            stats.nodes_visited,
            stats.report.operations,
            stats.report.failed
        );
        Ok(stats)
    }

    /// Point the alias at the rebuilt indices in one atomic call.
    ///
    /// Returns the indices that were detached from the alias. Fails without
    /// touching the alias when no rebuild is in progress, a new index is
    /// missing, or the alias name is taken by a concrete index.
    pub async fn swap_alias(&mut self) -> Result<Vec<String>> {
        let Some(handle) = self.current.clone() else {
            return Err(Error::alias_invariant("no rebuilt index to swap in"));
        };
        let alias = self.indexer.naming().alias().to_string();

        for index in handle.indices.values() {
            if *index == alias {
                return Err(Error::alias_invariant(format!(
                    "new index '{index}' has the alias name"
                )));
            }
            if !self.admin().index_exists(index).await? {
                return Err(Error::alias_invariant(format!(
                    "new index '{index}' does not exist"
                )));
            }
        }
        if self.admin().is_concrete_index(&alias).await? {
            return Err(Error::alias_invariant(format!(
                "'{alias}' is a physical index, not an alias"
            )));
        }

        let detached: Vec<String> = self
            .admin()
            .indices_behind_alias(&alias)
            .await?
            .into_iter()
            .filter(|index| !handle.contains(index))
            .collect();
        let added: Vec<String> = handle.indices.values().cloned().collect();
        self.admin().swap_alias(&alias, &detached, &added).await?;
        log::info!(
            "Alias {alias} now points at {} indices ({} detached)",
            handle.indices.len(),
            detached.len()
        );

        for index in handle.indices.values() {
            self.admin().refresh(index).await?;
        }
        self.current = None;
        self.indexer.set_live_mode();
        Ok(detached)
    }

    /// Give up on the current rebuild. Its indices stay until the next
    /// cleanup; the alias is untouched.
    pub fn abort_rebuild(&mut self) -> Option<RebuildHandle> {
        let handle = self.current.take();
        if let Some(handle) = &handle {
            log::warn!("Aborted rebuild '{}'", handle.postfix);
            self.indexer.set_live_mode();
        }
        handle
    }

    /// Delete managed indices that are neither live nor being built.
    ///
    /// Only names of the form `{base}-{dimension hash}-{postfix}` are
    /// considered; anything else under the `{base}-` prefix is left alone.
    pub async fn cleanup_stale(&mut self) -> Result<Vec<String>> {
        let naming = self.indexer.naming().clone();
        let prefix = format!("{}-", naming.alias());
        let candidates = self.admin().list_physical_indices(&prefix).await?;
        let live = self.admin().indices_behind_alias(naming.alias()).await?;

        let mut removed = Vec::new();
        for name in candidates {
            if !name.starts_with(&prefix) || !naming.is_managed(&name) {
                log::debug!("Leaving unmanaged index {name}");
                continue;
            }
            if live.contains(&name) || self.current.as_ref().is_some_and(|h| h.contains(&name)) {
                continue;
            }
            self.admin().delete_index(&name).await?;
            self.deleted.insert(name.clone());
            removed.push(name);
        }
        log::info!("Removed {} stale indices", removed.len());
        Ok(removed)
    }

    /// Lifecycle state of one physical index.
    pub async fn index_state(&self, name: &str) -> Result<IndexState> {
        if !self.admin().index_exists(name).await? {
            return Ok(if self.deleted.contains(name) {
                IndexState::Deleted
            } else {
                IndexState::Absent
            });
        }
        let live = self
            .admin()
            .indices_behind_alias(self.indexer.naming().alias())
            .await?;
        if live.contains(name) {
            return Ok(IndexState::Live);
        }
        if self.current.as_ref().is_some_and(|h| h.contains(name)) {
            return Ok(IndexState::Building);
        }
        Ok(IndexState::Stale)
    }

    /// State of a combination: building during a rebuild, otherwise live
    /// when the alias covers it.
    pub async fn state(&self, combination: &DimensionCombination) -> Result<IndexState> {
        if let Some(index) = self.current.as_ref().and_then(|h| h.index_for(combination)) {
            return self.index_state(index).await;
        }
        let naming = self.indexer.naming();
        let live = self.admin().indices_behind_alias(naming.alias()).await?;
        if live.iter().any(|name| naming.belongs_to(name, combination)) {
            Ok(IndexState::Live)
        } else {
            Ok(IndexState::Absent)
        }
    }

    /// Raw cluster health document.
    pub async fn cluster_status(&self) -> Result<Value> {
        self.admin().cluster_status().await
    }
}

// ============================================================================
// Tests
// ============================================================================
