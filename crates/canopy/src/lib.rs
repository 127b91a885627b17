//! Canopy content indexing — umbrella crate.
//!
//! This crate re-exports all Canopy components for convenience and wires
//! them together from a [`CanopyConfig`](core::CanopyConfig).

use std::sync::Arc;

pub use canopy_core as core;
pub use canopy_engine as engine;
pub use canopy_index as index;

use canopy_core::{CanopyConfig, ContentRepository, Result, SchemaProvider};
use canopy_engine::{HttpTransport, Transport, create_driver};
use canopy_index::{IndexLifecycle, NodeIndexer};

/// Build a lifecycle manager talking HTTP to the configured engine.
///
/// The configuration is validated first; the engine is not contacted.
pub fn connect(
    config: CanopyConfig,
    repository: Arc<dyn ContentRepository>,
    schema: Arc<dyn SchemaProvider>,
) -> Result<IndexLifecycle> {
    config.validate()?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.engine)?);
    let driver = create_driver(config.engine.version, transport, &config.index);
    log::info!(
        "Indexing into {} ({}) behind alias {}",
        config.engine.url,
        config.engine.version,
        config.index.base_name
    );
    let indexer = NodeIndexer::builder(Arc::new(config), repository, driver).build()?;
    Ok(IndexLifecycle::new(indexer, schema))
}
