//! Error types for the Canopy indexing pipeline.
//!
//! A single error enum is shared by every Canopy crate. Variants are
//! classified by [`Error::is_retryable`] into transient failures (network,
//! timeouts, engine 5xx) that a caller may retry by re-running a flush, and
//! permanent failures (configuration, alias invariants) that must abort.

use std::path::{Path, PathBuf};

/// Result type alias for Canopy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or maintaining a search index.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or missing configuration (driver mapping, index base name, ...).
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// The wire call could not be completed (connection refused, reset, ...).
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable error message
        message: String,
        /// Source error if available
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The wire call exceeded the configured timeout.
    #[error("Request timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },

    /// The engine answered a management call with an unexpected status.
    #[error("Engine returned {status}: {message}")]
    Engine {
        /// HTTP status code returned by the engine
        status: u16,
        /// Error detail extracted from the response body
        message: String,
    },

    /// A physical index that was expected to exist does not.
    #[error("Index not found: {name}")]
    IndexNotFound {
        /// Physical index name
        name: String,
    },

    /// A precondition of the alias swap does not hold.
    #[error("Alias invariant violated: {message}")]
    AliasInvariant {
        /// Which invariant failed
        message: String,
    },

    /// A property value could not be coerced into its indexed form.
    #[error("Cannot coerce property '{property}': {message}")]
    Coercion {
        /// Property name
        property: String,
        /// What went wrong
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed input that is not JSON (configuration files, engine bodies).
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Returns whether this error is transient.
    ///
    /// Retrying a flush after a retryable error is safe: index upserts,
    /// deletes, and fulltext merges are idempotent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Timeout { .. } => true,
            Error::Engine { status, .. } => *status >= 500 || *status == 429,
            Error::Config { .. } => false,
            Error::IndexNotFound { .. } => false,
            Error::AliasInvariant { .. } => false,
            Error::Coercion { .. } => false,
            Error::Serialization(_) => false,
            Error::Io { .. } => false,
            Error::Parse(_) => false,
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new transport error without a source.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Error::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source error.
    pub fn transport_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new engine error from a status code and detail message.
    pub fn engine<S: Into<String>>(status: u16, message: S) -> Self {
        Error::Engine {
            status,
            message: message.into(),
        }
    }

    /// Creates a new alias invariant error.
    pub fn alias_invariant<S: Into<String>>(message: S) -> Self {
        Error::AliasInvariant {
            message: message.into(),
        }
    }

    /// Creates a new coercion error.
    pub fn coercion<P, M>(property: P, message: M) -> Self
    where
        P: Into<String>,
        M: Into<String>,
    {
        Error::Coercion {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Error::Parse(message.into())
    }

    /// Wraps an I/O error together with the path that caused it.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
