//! Pipeline configuration.
//!
//! [`CanopyConfig`] is loaded from TOML. Every section has defaults, so an
//! empty file is a valid (if not very useful) configuration:
//!
//! ```toml
//! [engine]
//! url = "http://localhost:9200"
//! version = "v7"
//!
//! [index]
//! base_name = "content"
//! batch_size = 500
//!
//! [indexing]
//! live_workspace = "live"
//! identifier_strategy = "identity"
//!
//! [[dimensions]]
//! language = ["de", "en"]
//!
//! [node_types."Acme.Site:Page"]
//! fulltext_root = true
//!
//! [node_types."Acme.Site:Page".properties.title]
//! fulltext = { bucket = "h1" }
//!
//! [node_types."Acme.Site:Text".properties.text]
//! fulltext = "html"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dimension::DimensionCombination;
use crate::error::{Error, Result};

/// Characters the engine rejects in index names.
const INVALID_INDEX_CHARS: &[char] = &['*', ',', ' ', '/', '\\', '?', '"', '<', '>', '|', '#'];

// ============================================================================
// Engine
// ============================================================================

/// Wire-protocol generation of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineVersion {
    /// 1.x and 2.x: typed documents, Groovy scripts.
    V1,
    /// 5.x and 6.x: typed documents, Painless scripts.
    V5,
    /// 7.x and later: typeless documents, Painless scripts.
    #[default]
    V7,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V5 => write!(f, "v5"),
            Self::V7 => write!(f, "v7"),
        }
    }
}

/// Connection settings for the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Wire-protocol generation.
    #[serde(default)]
    pub version: EngineVersion,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Basic auth user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            version: EngineVersion::default(),
            timeout_secs: default_timeout_secs(),
            username: None,
            password: None,
        }
    }
}

// ============================================================================
// Index
// ============================================================================

/// Naming and batching of the physical indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Alias name readers query; physical indices are `{base_name}-{hash}-{postfix}`.
    #[serde(default = "default_base_name")]
    pub base_name: String,

    /// Pending nodes that trigger an automatic flush once exceeded.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Engine-side retries for scripted updates on version conflicts.
    #[serde(default = "default_retry_on_conflict")]
    pub retry_on_conflict: u32,

    /// Extra index settings merged into the schema's settings at creation.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
}

fn default_base_name() -> String {
    "canopy".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_retry_on_conflict() -> u32 {
    3
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_name: default_base_name(),
            batch_size: default_batch_size(),
            retry_on_conflict: default_retry_on_conflict(),
            settings: Map::new(),
        }
    }
}

// ============================================================================
// Indexing
// ============================================================================

/// How document identifiers are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierStrategyKind {
    /// Hash of (repository, workspace, dimensions, stable node identifier).
    #[default]
    Identity,
    /// Hash of the node's context path; changes on move/rename.
    Path,
}

/// Indexing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Workspace whose content readers see.
    #[serde(default = "default_live_workspace")]
    pub live_workspace: String,

    /// Index every workspace instead of only the live one.
    #[serde(default)]
    pub index_all_workspaces: bool,

    /// Document identifier derivation.
    #[serde(default)]
    pub identifier_strategy: IdentifierStrategyKind,

    /// Content repository id mixed into identity-based identifiers.
    #[serde(default = "default_content_repository_id")]
    pub content_repository_id: String,

    /// Delete stale documents left under an old node type (typed engines only).
    #[serde(default = "default_true")]
    pub cleanup_duplicates: bool,
}

fn default_live_workspace() -> String {
    "live".to_string()
}

fn default_content_repository_id() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            live_workspace: default_live_workspace(),
            index_all_workspaces: false,
            identifier_strategy: IdentifierStrategyKind::default(),
            content_repository_id: default_content_repository_id(),
            cleanup_duplicates: default_true(),
        }
    }
}

/// Asset extraction limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Assets larger than this are not extracted.
    #[serde(default = "default_size_limit_bytes")]
    pub size_limit_bytes: usize,
}

fn default_size_limit_bytes() -> usize {
    100 * 1024 * 1024
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            size_limit_bytes: default_size_limit_bytes(),
        }
    }
}

// ============================================================================
// Node types
// ============================================================================

/// Indexed representation of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Exact-match string.
    Keyword,
    /// Analyzed text; markup is kept as-is.
    Text,
    /// `true`/`false`, also from `"true"`, `"1"`, `1`.
    Boolean,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// RFC 3339 timestamp, normalized to UTC.
    Date,
    /// Binary asset, replaced by its extracted text and metadata.
    Attachment,
}

/// How a property contributes to fulltext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulltextRule {
    /// Rendered HTML split into heading buckets and `text`.
    Html,
    /// Markup-stripped value appended to the named bucket.
    Bucket(String),
}

/// Per-property indexing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyConfig {
    /// Include the property in the document.
    #[serde(default = "default_true")]
    pub indexed: bool,

    /// Coercion applied before indexing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coerce: Option<Coercion>,

    /// Fulltext contribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulltext: Option<FulltextRule>,
}

impl Default for PropertyConfig {
    fn default() -> Self {
        Self {
            indexed: true,
            coerce: None,
            fulltext: None,
        }
    }
}

/// Indexing behavior of one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeConfig {
    /// Owns the aggregated fulltext of itself and its descendants.
    #[serde(default)]
    pub fulltext_root: bool,

    /// Contributes to its fulltext root.
    #[serde(default = "default_true")]
    pub fulltext_enabled: bool,

    /// Supertype names, most specific first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,

    /// Index properties without an explicit rule.
    #[serde(default = "default_true")]
    pub index_undeclared_properties: bool,

    /// Property rules.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyConfig>,
}

impl Default for NodeTypeConfig {
    fn default() -> Self {
        Self {
            fulltext_root: false,
            fulltext_enabled: true,
            supertypes: Vec::new(),
            index_undeclared_properties: true,
            properties: BTreeMap::new(),
        }
    }
}

/// Applied to node types without configuration: indexed, no fulltext.
static UNCONFIGURED_NODE_TYPE: NodeTypeConfig = NodeTypeConfig {
    fulltext_root: false,
    fulltext_enabled: false,
    supertypes: Vec::new(),
    index_undeclared_properties: true,
    properties: BTreeMap::new(),
};

// ============================================================================
// CanopyConfig
// ============================================================================

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanopyConfig {
    /// Engine connection.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Index naming and batching.
    #[serde(default)]
    pub index: IndexConfig,

    /// Indexing policy.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Asset extraction.
    #[serde(default)]
    pub assets: AssetConfig,

    /// Allowed dimension combinations; empty for dimension-less content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<DimensionCombination>,

    /// Node type rules keyed by node type name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_types: BTreeMap<String, NodeTypeConfig>,
}

impl CanopyConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Check invariants that would otherwise surface as engine errors.
    pub fn validate(&self) -> Result<()> {
        validate_base_name(&self.index.base_name)?;

        if !(self.engine.url.starts_with("http://") || self.engine.url.starts_with("https://")) {
            return Err(Error::config(format!(
                "Engine URL must start with http:// or https://, got '{}'",
                self.engine.url
            )));
        }
        if self.index.batch_size == 0 {
            return Err(Error::config("index.batch_size must be greater than 0"));
        }
        if self.indexing.live_workspace.is_empty() {
            return Err(Error::config("indexing.live_workspace must not be empty"));
        }
        if self.engine.username.is_some() != self.engine.password.is_some() {
            return Err(Error::config(
                "engine.username and engine.password must be set together",
            ));
        }
        Ok(())
    }

    /// Rules for a node type; unconfigured types are indexed without fulltext.
    pub fn node_type(&self, name: &str) -> &NodeTypeConfig {
        self.node_types.get(name).unwrap_or(&UNCONFIGURED_NODE_TYPE)
    }

    /// Add or replace a node type rule.
    pub fn with_node_type(mut self, name: impl Into<String>, config: NodeTypeConfig) -> Self {
        self.node_types.insert(name.into(), config);
        self
    }
}

/// Validate an alias base name against engine index naming rules.
pub fn validate_base_name(base_name: &str) -> Result<()> {
    if base_name.is_empty() {
        return Err(Error::config("index.base_name must not be empty"));
    }
    if base_name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(Error::config(format!(
            "index.base_name must be lowercase, got '{base_name}'"
        )));
    }
    if base_name.starts_with(['-', '_', '+']) {
        return Err(Error::config(format!(
            "index.base_name must not start with '-', '_' or '+', got '{base_name}'"
        )));
    }
    if base_name.contains(INVALID_INDEX_CHARS) {
        return Err(Error::config(format!(
            "index.base_name contains invalid characters: '{base_name}'"
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
