//! Physical index and alias names.
//!
//! Physical indices are named `{base}-{dimension hash}-{postfix}` and are
//! read through the alias `{base}`. The dimension-less case uses the hash of
//! the empty combination, so every managed index has the same shape.

use canopy_core::config::validate_base_name;
use canopy_core::dimension::DIMENSION_HASH_LEN;
use canopy_core::{DimensionCombination, Error, Result};
use chrono::Utc;

/// Naming convention for one alias base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNaming {
    base: String,
}

impl IndexNaming {
    /// Create the convention for `base`; invalid base names are fatal.
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let base = base.into();
        validate_base_name(&base)?;
        Ok(Self { base })
    }

    /// Alias readers query.
    pub fn alias(&self) -> &str {
        &self.base
    }

    /// Prefix shared by every physical index of one combination.
    pub fn combination_prefix(&self, dimensions: &DimensionCombination) -> String {
        format!("{}-{}-", self.base, dimensions.hash())
    }

    /// Physical index name for a combination and postfix.
    pub fn physical_name(&self, dimensions: &DimensionCombination, postfix: &str) -> Result<String> {
        validate_postfix(postfix)?;
        Ok(format!("{}{postfix}", self.combination_prefix(dimensions)))
    }

    /// Returns `true` if `name` is a physical index of this combination.
    pub fn belongs_to(&self, name: &str, dimensions: &DimensionCombination) -> bool {
        name.starts_with(&self.combination_prefix(dimensions))
    }

    /// Returns `true` if `name` follows `{base}-{32 hex}-{postfix}`.
    pub fn is_managed(&self, name: &str) -> bool {
        let Some(rest) = name
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return false;
        };
        let Some((hash, postfix)) = rest.split_at_checked(DIMENSION_HASH_LEN) else {
            return false;
        };
        hash.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            && postfix.strip_prefix('-').is_some_and(|p| !p.is_empty())
    }
}

/// Timestamp postfix for a new rebuild.
pub fn timestamp_postfix() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

fn validate_postfix(postfix: &str) -> Result<()> {
    if postfix.is_empty() {
        return Err(Error::config("index postfix must not be empty"));
    }
    let valid = postfix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(Error::config(format!(
            "index postfix may only contain lowercase letters, digits, '-', '_' and '.', got '{postfix}'"
        )));
    }
    Ok(())
}
