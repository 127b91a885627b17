//! Fulltext extraction and aggregation.
//!
//! Each node contributes buckets of text (`h1`..`h6`, `text`, or custom
//! buckets named in configuration) to its nearest fulltext root. The
//! [`FulltextAggregator`] computes a node's buckets and plans the merge into
//! the root document; rendering the merge in engine syntax is left to the
//! driver.
//!
//! # Example
//!
//! ```rust,ignore
//! let extractor = HtmlBucketExtractor::new();
//! let buckets = extractor.extract("<h1>Welcome</h1><p>Hello &amp; bye</p>");
//! assert_eq!(buckets["h1"], "Welcome");
//! assert_eq!(buckets["text"], "Hello & bye");
//! ```

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use canopy_core::fulltext::TEXT_BUCKET;
use canopy_core::{
    CanopyConfig, ContentNode, ContentRepository, FulltextBuckets, FulltextMerge, FulltextRule,
    NodeContext,
};
use regex::Regex;
use serde_json::Value;

use crate::identifier::IdentifierStrategy;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("Invalid heading regex")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b[^>]*>.*?</(?:script|style)\s*>")
        .expect("Invalid script regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Splits rendered content into fulltext buckets.
pub trait FulltextExtractor: Send + Sync {
    /// Buckets for one piece of rendered content. Empty buckets are omitted.
    fn extract(&self, content: &str) -> FulltextBuckets;
}

/// Strip markup, decode common entities, and collapse whitespace.
pub fn strip_markup(html: &str) -> String {
    let without_scripts = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_scripts, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn append(buckets: &mut FulltextBuckets, bucket: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    buckets
        .entry(bucket.to_string())
        .and_modify(|existing| {
            existing.push(' ');
            existing.push_str(text);
        })
        .or_insert_with(|| text.to_string());
}

/// Headings go to `h1`..`h6`, everything else to `text`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlBucketExtractor;

impl HtmlBucketExtractor {
    /// Create an extractor.
    pub fn new() -> Self {
        Self
    }
}

impl FulltextExtractor for HtmlBucketExtractor {
    fn extract(&self, content: &str) -> FulltextBuckets {
        let content = SCRIPT_OR_STYLE.replace_all(content, " ");
        let mut buckets = FulltextBuckets::new();
        for captures in HEADING.captures_iter(&content) {
            let level = captures.get(1).map_or("1", |m| m.as_str());
            let heading = captures.get(2).map_or("", |m| m.as_str());
            append(&mut buckets, &format!("h{level}"), &strip_markup(heading));
        }
        let rest = HEADING.replace_all(&content, " ");
        append(&mut buckets, TEXT_BUCKET, &strip_markup(&rest));
        buckets
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_as_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}

/// A fulltext merge planned against a root document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMerge {
    /// Document identifier of the fulltext root.
    pub root_document_id: String,
    /// Node type of the fulltext root.
    pub root_node_type: String,
    /// The contribution to apply.
    pub merge: FulltextMerge,
}

/// Computes fulltext contributions and plans their merge into roots.
#[derive(Clone)]
pub struct FulltextAggregator {
    repository: Arc<dyn ContentRepository>,
    config: Arc<CanopyConfig>,
    extractor: Arc<dyn FulltextExtractor>,
}

impl std::fmt::Debug for FulltextAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulltextAggregator")
            .field("node_types", &self.config.node_types.len())
            .finish_non_exhaustive()
    }
}

impl FulltextAggregator {
    /// Create an aggregator.
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        config: Arc<CanopyConfig>,
        extractor: Arc<dyn FulltextExtractor>,
    ) -> Self {
        Self {
            repository,
            config,
            extractor,
        }
    }

    /// Returns `true` if the node's type contributes to fulltext.
    pub fn is_enabled(&self, node: &ContentNode) -> bool {
        self.config.node_type(&node.node_type).fulltext_enabled
    }

    /// The node's own buckets, from its configured properties.
    pub fn extract(&self, node: &ContentNode) -> FulltextBuckets {
        let rules = self.config.node_type(&node.node_type);
        let mut buckets = FulltextBuckets::new();
        for (property, rule) in &rules.properties {
            let Some(rule) = &rule.fulltext else {
                continue;
            };
            let Some(text) = node.properties.get(property).and_then(value_as_text) else {
                continue;
            };
            match rule {
                FulltextRule::Html => {
                    for (bucket, value) in self.extractor.extract(&text) {
                        append(&mut buckets, &bucket, &value);
                    }
                }
                FulltextRule::Bucket(bucket) => append(&mut buckets, bucket, &strip_markup(&text)),
            }
        }
        buckets
    }

    /// Nearest fulltext root, starting with the node itself.
    pub fn find_fulltext_root(
        &self,
        node: &ContentNode,
        context: &NodeContext,
    ) -> Option<ContentNode> {
        let mut visited = HashSet::new();
        let mut current = node.clone();
        loop {
            if self.config.node_type(&current.node_type).fulltext_root {
                return Some(current);
            }
            if !visited.insert(current.path.clone()) {
                log::warn!("Cycle in content tree at {}", current.path);
                return None;
            }
            current = self.repository.parent_node(&current, context)?;
        }
    }

    /// Plan the merge of `buckets` into the node's fulltext root.
    ///
    /// Returns `None` when there is no root or the root is removed. Removed
    /// or hidden nodes, and nodes without text, withdraw their contribution.
    pub fn plan_merge(
        &self,
        node: &ContentNode,
        buckets: FulltextBuckets,
        context: &NodeContext,
        target_workspace: &str,
        identifiers: &dyn IdentifierStrategy,
    ) -> Option<PlannedMerge> {
        let Some(root) = self.find_fulltext_root(node, context) else {
            if node.is_tree_root() {
                log::debug!("Tree root {} has no fulltext root", node.path);
            } else {
                log::warn!(
                    "No fulltext root found for {} ({})",
                    node.path,
                    node.identifier
                );
            }
            return None;
        };
        if root.removed {
            log::debug!("Fulltext root {} is removed, skipping merge", root.path);
            return None;
        }

        let merge = if node.removed || node.hidden || buckets.is_empty() {
            FulltextMerge::withdraw(node.identifier.clone())
        } else {
            FulltextMerge::set(node.identifier.clone(), buckets)
        };
        Some(PlannedMerge {
            root_document_id: identifiers.identify(&root, target_workspace, &context.dimensions),
            root_node_type: root.node_type,
            merge,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
