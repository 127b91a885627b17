//! Fulltext aggregation data model.
//!
//! A fulltext root document owns two fields:
//!
//! - `__fulltextParts`: contributing node identifier → that node's buckets,
//!   in insertion order.
//! - `__fulltext`: bucket → merged text, always recomputed from the parts.
//!
//! The engine-side merge scripts rendered by each driver implement exactly
//! the semantics of [`FulltextParts::apply`] followed by
//! [`FulltextParts::merged`]. Because the merged text is a pure function of
//! the parts, applying the same contribution twice is a no-op.

use std::collections::BTreeMap;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

/// Document field holding the merged fulltext.
pub const FULLTEXT_FIELD: &str = "__fulltext";

/// Document field holding per-node fulltext contributions.
pub const FULLTEXT_PARTS_FIELD: &str = "__fulltextParts";

/// Default bucket for text outside headings.
pub const TEXT_BUCKET: &str = "text";

/// Bucket name → text for a single node.
pub type FulltextBuckets = BTreeMap<String, String>;

/// Per-node fulltext contributions owned by a fulltext root document.
///
/// Keeps insertion order; replacing an existing contribution keeps its
/// position, removing one shifts the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FulltextParts {
    entries: Vec<(String, FulltextBuckets)>,
}

impl FulltextParts {
    /// Create empty parts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one node's contribution.
    ///
    /// Empty buckets remove the node's entry; otherwise the entry is set.
    pub fn apply(&mut self, node_identifier: &str, buckets: &FulltextBuckets) {
        if buckets.is_empty() {
            self.entries.retain(|(id, _)| id != node_identifier);
            return;
        }
        match self.entries.iter_mut().find(|(id, _)| id == node_identifier) {
            Some((_, existing)) => *existing = buckets.clone(),
            None => self
                .entries
                .push((node_identifier.to_string(), buckets.clone())),
        }
    }

    /// Recompute the merged fulltext.
    ///
    /// For every bucket, the trimmed texts of all contributing nodes that
    /// have it are joined by a single space, in parts order.
    pub fn merged(&self) -> FulltextBuckets {
        let mut fulltext = FulltextBuckets::new();
        for (_, buckets) in &self.entries {
            for (bucket, text) in buckets {
                let value = text.trim();
                fulltext
                    .entry(bucket.clone())
                    .and_modify(|merged: &mut String| {
                        merged.push(' ');
                        merged.push_str(value);
                    })
                    .or_insert_with(|| value.to_string());
            }
        }
        fulltext
    }

    /// Contribution of one node, if present.
    pub fn get(&self, node_identifier: &str) -> Option<&FulltextBuckets> {
        self.entries
            .iter()
            .find(|(id, _)| id == node_identifier)
            .map(|(_, buckets)| buckets)
    }

    /// Contributing node identifiers in order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Number of contributing nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no node contributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FulltextParts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, buckets) in &self.entries {
            map.serialize_entry(id, buckets)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FulltextParts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PartsVisitor;

        impl<'de> Visitor<'de> for PartsVisitor {
            type Value = FulltextParts;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of node identifiers to fulltext buckets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut parts = FulltextParts::new();
                while let Some((id, buckets)) = access.next_entry::<String, FulltextBuckets>()? {
                    parts.apply(&id, &buckets);
                }
                Ok(parts)
            }
        }

        deserializer.deserialize_map(PartsVisitor)
    }
}

/// A node's contribution to be merged into its fulltext root document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulltextMerge {
    /// Identifier of the contributing node (not its document identifier).
    pub identifier: String,
    /// The node's buckets; empty when the contribution must be withdrawn.
    pub fulltext: FulltextBuckets,
}

impl FulltextMerge {
    /// Contribution that sets the node's buckets.
    pub fn set(identifier: impl Into<String>, fulltext: FulltextBuckets) -> Self {
        Self {
            identifier: identifier.into(),
            fulltext,
        }
    }

    /// Contribution that withdraws the node's buckets.
    pub fn withdraw(identifier: impl Into<String>) -> Self {
        Self::set(identifier, FulltextBuckets::new())
    }

    /// Returns `true` if this contribution removes the node's entry.
    pub fn is_withdrawal(&self) -> bool {
        self.fulltext.is_empty()
    }

    /// Script parameters shared by every driver's merge script.
    pub fn params(&self) -> Value {
        json!({
            "identifier": self.identifier,
            "fulltext": self.fulltext,
        })
    }

    /// Document created when the root document does not exist yet.
    pub fn upsert_document(&self) -> Value {
        let mut parts = FulltextParts::new();
        parts.apply(&self.identifier, &self.fulltext);
        json!({
            FULLTEXT_FIELD: parts.merged(),
            FULLTEXT_PARTS_FIELD: parts,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
