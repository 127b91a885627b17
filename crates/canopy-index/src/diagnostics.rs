//! Failure reporting that never aborts a batch.
//!
//! Bulk items the engine rejects, payloads dropped before sending, and
//! nodes with no target index are reported to a [`DiagnosticsSink`].
//! [`LogSink`] logs them; [`MemorySink`] keeps them for inspection.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

/// Category of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The engine rejected a bulk item.
    ItemRejected,
    /// A payload was dropped before sending.
    MalformedPayload,
    /// No physical index exists for a dimension combination.
    MissingIndex,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemRejected => write!(f, "item rejected"),
            Self::MalformedPayload => write!(f, "malformed payload"),
            Self::MissingIndex => write!(f, "missing index"),
        }
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Category.
    pub kind: DiagnosticKind,
    /// Physical index involved, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Document identifier, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Engine status for rejected items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Error detail.
    pub message: String,
    /// Offending payload, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Diagnostic {
    /// Create a diagnostic with only a kind and message.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            index: None,
            document_id: None,
            status: None,
            message: message.into(),
            payload: None,
        }
    }

    /// Set the physical index.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Set the document identifier.
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Set the engine status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the offending payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(index) = &self.index {
            write!(f, " in {index}")?;
        }
        if let Some(id) = &self.document_id {
            write!(f, " for {id}")?;
        }
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Receives diagnostics.
pub trait DiagnosticsSink: Send + Sync {
    /// Record one problem.
    fn record(&self, diagnostic: Diagnostic);
}

/// Logs every diagnostic at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn record(&self, diagnostic: Diagnostic) {
        log::error!("{diagnostic}");
    }
}

/// Collects diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, diagnostic: Diagnostic) {
        log::debug!("{diagnostic}");
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diagnostic);
    }
}
