#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Canopy Engine — search engine wire protocol.
//!
//! Everything that knows what the engine's HTTP API looks like lives here:
//! the [`Transport`] abstraction and its `reqwest` implementation, bulk
//! encoding and response parsing, the fulltext merge scripts, index and
//! alias management, and one [`Driver`] per supported engine generation.
//!
//! # Modules
//!
//! - [`transport`]: Request/response types and the HTTP transport
//! - [`bulk`]: Bulk NDJSON encoding and per-item results
//! - [`script`]: Groovy and Painless update scripts
//! - [`admin`]: Index and alias management
//! - [`driver`]: Version-specific drivers
//! - [`mock`]: Recording transport for tests

pub mod admin;
pub mod bulk;
pub mod driver;
pub mod mock;
pub mod script;
pub mod transport;

// Re-export key types at crate root for convenience
pub use admin::{AliasAction, IndexAdmin};
pub use bulk::{BulkAction, BulkItemResult, BulkOperation, BulkReport};
pub use driver::{
    Driver, DuplicateCleanup, LegacyDriver, TypedDriver, TypelessDriver, create_driver,
};
pub use mock::MockTransport;
pub use transport::{EngineRequest, EngineResponse, HttpTransport, Method, RequestBody, Transport};
