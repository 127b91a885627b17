//! Dimension combinations.
//!
//! A [`DimensionCombination`] is one concrete assignment of content-variant
//! axes (e.g. `language`) to values. Each dimension maps to an ordered list
//! of acceptable values, the first being the preferred value and the rest a
//! fallback chain.
//!
//! The combination hash is part of every physical index name and of the
//! stored document metadata, so it must be stable across processes and
//! releases: it is computed from the canonical JSON form (keys sorted by the
//! underlying `BTreeMap`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of hex characters kept from the combination digest.
pub const DIMENSION_HASH_LEN: usize = 32;

/// One concrete assignment of dimension names to value lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionCombination(BTreeMap<String, Vec<String>>);

impl DimensionCombination {
    /// The combination used by dimension-less content models.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a combination from `(dimension, values)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, values)| (k.into(), values.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }

    /// Add or replace one dimension.
    pub fn with<K, V>(mut self, dimension: K, values: Vec<V>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0
            .insert(dimension.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Returns `true` for the dimension-less combination.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values (preferred first) configured for a dimension.
    pub fn values(&self, dimension: &str) -> Option<&[String]> {
        self.0.get(dimension).map(Vec::as_slice)
    }

    /// Iterate over `(dimension, values)` in dimension-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// Stable hash of this combination, lowercase hex.
    ///
    /// Safe to embed in physical index names (lowercase, no separators).
    pub fn hash(&self) -> String {
        // BTreeMap serialization is infallible and key-ordered.
        let canonical = serde_json::to_string(&self.0).unwrap_or_default();
        let digest = blake3::hash(canonical.as_bytes()).to_hex();
        digest.as_str()[..DIMENSION_HASH_LEN].to_string()
    }

    /// Fallback rank of a coordinate within this combination.
    ///
    /// For every dimension of the combination, the coordinate's first value
    /// must appear in the combination's value list; the rank is the sum of
    /// the positions. Returns `None` when the coordinate does not fit.
    pub fn fallback_rank(&self, coordinate: &DimensionCombination) -> Option<usize> {
        let mut rank = 0;
        for (dimension, allowed) in &self.0 {
            let value = coordinate.values(dimension)?.first()?;
            rank += allowed.iter().position(|v| v == value)?;
        }
        Some(rank)
    }
}

impl fmt::Display for DimensionCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}={}", v.join(",")))
            .collect();
        write!(f, "{}", parts.join("&"))
    }
}

impl From<BTreeMap<String, Vec<String>>> for DimensionCombination {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Tests
// ============================================================================
