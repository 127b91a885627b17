#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Canopy Core — shared types, traits, errors, and configuration.
//!
//! This crate has no internal Canopy dependencies. It defines the content
//! model the pipeline reads ([`ContentNode`], [`DimensionCombination`]), the
//! collaborator interfaces it is driven through ([`ContentRepository`],
//! [`DimensionResolver`], [`SchemaProvider`], [`AssetExtractor`]), and the
//! fulltext merge semantics every engine driver must reproduce.
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`config`]: TOML configuration
//! - [`dimension`]: Dimension combinations and their hashes
//! - [`node`]: Content nodes
//! - [`fulltext`]: Fulltext buckets and the merge model
//! - [`document`]: Search documents and reserved field names
//! - [`repository`]: Content tree and dimension interfaces
//! - [`schema`]: Pre-computed index schema
//! - [`asset`]: Binary asset extraction
//! - [`memory`]: In-memory content repository

pub mod asset;
pub mod config;
pub mod dimension;
pub mod document;
pub mod error;
pub mod fulltext;
pub mod memory;
pub mod node;
pub mod repository;
pub mod schema;

// Re-export key types at crate root for convenience
pub use asset::{AssetContent, AssetExtractor, PlainTextExtractor};
pub use config::{
    AssetConfig, CanopyConfig, Coercion, EngineConfig, EngineVersion, FulltextRule,
    IdentifierStrategyKind, IndexConfig, IndexingConfig, NodeTypeConfig, PropertyConfig,
};
pub use dimension::DimensionCombination;
pub use document::{Document, DocumentTarget};
pub use error::{Error, Result};
pub use fulltext::{FulltextBuckets, FulltextMerge, FulltextParts};
pub use memory::InMemoryContentRepository;
pub use node::ContentNode;
pub use repository::{
    ContentRepository, DimensionResolver, NodeContext, StaticDimensions, fan_out_combinations,
};
pub use schema::{IndexSchema, SchemaProvider, StaticSchema};
