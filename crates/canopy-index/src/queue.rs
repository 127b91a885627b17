//! Pending index and remove requests.
//!
//! Nodes sit in one of two sets keyed by (node identifier, target
//! workspace). Enqueuing a node moves it out of the other set, so the latest
//! disposition wins. Entries keep the order of their most recent enqueue.

use std::collections::HashMap;

use canopy_core::ContentNode;

/// What to do with a queued node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Index into every combination it resolves in.
    Index,
    /// Remove from every combination.
    Remove,
}

/// A node waiting to be flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedNode {
    /// The node as it was enqueued.
    pub node: ContentNode,
    /// Workspace the documents are written for.
    pub target_workspace: String,
    /// Index or remove.
    pub disposition: Disposition,
}

type QueueKey = (String, String);

/// Batches pending requests until a flush.
#[derive(Debug, Clone)]
pub struct IndexingQueue {
    to_index: HashMap<QueueKey, (u64, ContentNode)>,
    to_remove: HashMap<QueueKey, (u64, ContentNode)>,
    sequence: u64,
    batch_size: usize,
}

impl IndexingQueue {
    /// Create a queue that asks for a flush once more than `batch_size`
    /// nodes are pending.
    pub fn new(batch_size: usize) -> Self {
        Self {
            to_index: HashMap::new(),
            to_remove: HashMap::new(),
            sequence: 0,
            batch_size: batch_size.max(1),
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Queue a node for indexing. Returns `true` if a flush is due.
    pub fn enqueue_index(&mut self, node: ContentNode, target_workspace: &str) -> bool {
        let key = (node.identifier.clone(), target_workspace.to_string());
        self.to_remove.remove(&key);
        let sequence = self.next_sequence();
        self.to_index.insert(key, (sequence, node));
        self.should_flush()
    }

    /// Queue a node for removal. Returns `true` if a flush is due.
    pub fn enqueue_remove(&mut self, node: ContentNode, target_workspace: &str) -> bool {
        let key = (node.identifier.clone(), target_workspace.to_string());
        self.to_index.remove(&key);
        let sequence = self.next_sequence();
        self.to_remove.insert(key, (sequence, node));
        self.should_flush()
    }

    /// Number of pending nodes.
    pub fn len(&self) -> usize {
        self.to_index.len() + self.to_remove.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once the batch size is exceeded.
    pub fn should_flush(&self) -> bool {
        self.len() > self.batch_size
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pending nodes in enqueue order, without removing them.
    pub fn pending(&self) -> Vec<QueuedNode> {
        let indexed = self
            .to_index
            .iter()
            .map(|(key, entry)| (key, entry, Disposition::Index));
        let removed = self
            .to_remove
            .iter()
            .map(|(key, entry)| (key, entry, Disposition::Remove));
        let mut entries: Vec<_> = indexed.chain(removed).collect();
        entries.sort_by_key(|(_, (sequence, _), _)| *sequence);
        entries
            .into_iter()
            .map(|((_, workspace), (_, node), disposition)| QueuedNode {
                node: node.clone(),
                target_workspace: workspace.clone(),
                disposition,
            })
            .collect()
    }

    /// Drop every pending node.
    pub fn clear(&mut self) {
        self.to_index.clear();
        self.to_remove.clear();
    }
}

impl Default for IndexingQueue {
    fn default() -> Self {
        Self::new(canopy_core::IndexConfig::default().batch_size)
    }
}
