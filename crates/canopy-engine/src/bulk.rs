//! Bulk request encoding and response parsing.
//!
//! A bulk request is a sequence of [`BulkOperation`]s, each rendered as an
//! action line followed by an optional source line. The engine answers with
//! one result per operation, in order; [`BulkReport`] keeps those results so
//! partial failures can be reported per item while the rest of the batch
//! stands.

use std::fmt;

use canopy_core::{Error, Result};
use serde_json::{Map, Value};

/// Bulk action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkAction {
    /// Create or overwrite a document.
    Index,
    /// Scripted update or upsert.
    Update,
    /// Remove a document.
    Delete,
}

impl BulkAction {
    /// Action name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "index" | "create" => Some(Self::Index),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action line plus its optional source line.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    /// Action verb.
    pub action: BulkAction,
    /// Action metadata (`_index`, `_id`, ...), already in the driver's dialect.
    pub metadata: Map<String, Value>,
    /// Source line; required for index and update, absent for delete.
    pub body: Option<Value>,
}

impl BulkOperation {
    /// Create an operation.
    pub fn new(action: BulkAction, metadata: Map<String, Value>, body: Option<Value>) -> Self {
        Self {
            action,
            metadata,
            body,
        }
    }

    /// Document identifier from the metadata.
    pub fn id(&self) -> Option<&str> {
        self.metadata.get("_id").and_then(Value::as_str)
    }

    /// Physical index from the metadata.
    pub fn index(&self) -> Option<&str> {
        self.metadata.get("_index").and_then(Value::as_str)
    }

    /// Check the operation can be sent.
    pub fn validate(&self) -> Result<()> {
        if self.id().is_none_or(str::is_empty) {
            return Err(Error::parse(format!(
                "{} operation without a document id",
                self.action
            )));
        }
        match (self.action, &self.body) {
            (BulkAction::Delete, None) => Ok(()),
            (BulkAction::Delete, Some(_)) => Err(Error::parse("delete operation with a body")),
            (_, Some(Value::Object(_))) => Ok(()),
            (action, _) => Err(Error::parse(format!(
                "{action} operation requires an object body"
            ))),
        }
    }

    /// Render the NDJSON lines for this operation, each newline-terminated.
    pub fn encode(&self) -> Result<String> {
        let mut header = Map::new();
        header.insert(
            self.action.as_str().to_string(),
            Value::Object(self.metadata.clone()),
        );
        let mut lines = serde_json::to_string(&header)?;
        lines.push('\n');
        if let Some(body) = &self.body {
            lines.push_str(&serde_json::to_string(body)?);
            lines.push('\n');
        }
        Ok(lines)
    }
}

/// NDJSON body for a batch, plus the operations that made it in.
///
/// Invalid operations are logged and left out so one bad item cannot fail
/// the whole request.
pub fn encode_batch(operations: &[BulkOperation]) -> (String, Vec<&BulkOperation>, usize) {
    let mut body = String::new();
    let mut sent = Vec::with_capacity(operations.len());
    let mut skipped = 0;
    for operation in operations {
        match operation.validate().and_then(|()| operation.encode()) {
            Ok(lines) => {
                body.push_str(&lines);
                sent.push(operation);
            }
            Err(e) => {
                log::warn!("Skipping malformed bulk item: {e}");
                skipped += 1;
            }
        }
    }
    (body, sent, skipped)
}

/// Outcome of a single bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    /// Action that was executed.
    pub action: BulkAction,
    /// Document identifier.
    pub id: String,
    /// Physical index.
    pub index: Option<String>,
    /// Per-item HTTP status.
    pub status: u16,
    /// Engine error detail for failed items.
    pub error: Option<String>,
    /// Source line of the operation at this position, if it had one.
    pub payload: Option<Value>,
}

impl BulkItemResult {
    /// Returns `true` when the item took effect.
    ///
    /// Deleting a document that does not exist counts as success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
            || (self.action == BulkAction::Delete && self.status == 404)
    }
}

/// Per-item results of one or more bulk requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Results in request order.
    pub items: Vec<BulkItemResult>,
    /// Operations that were never sent because they were malformed.
    pub skipped: usize,
}

impl BulkReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Items that took effect.
    pub fn succeeded(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|item| item.is_success())
    }

    /// Items the engine rejected.
    pub fn failed(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|item| !item.is_success())
    }

    /// Returns `true` if any item was rejected.
    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Append another report.
    pub fn merge(&mut self, other: BulkReport) {
        self.items.extend(other.items);
        self.skipped += other.skipped;
    }
}

/// Parse a bulk response body.
///
/// `sent` are the operations in the order they were encoded. Items are
/// matched to them by position, which supplies each item's payload and the
/// document id when an item omits it. Several operations may share an
/// action and id (a fulltext root and the merges into it), so the id alone
/// does not identify the operation.
pub fn parse_response(body: &Value, sent: &[&BulkOperation]) -> Result<BulkReport> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse("bulk response has no items array"))?;
    if items.len() != sent.len() {
        log::warn!(
            "Bulk response has {} items for {} operations",
            items.len(),
            sent.len()
        );
    }

    let mut report = BulkReport::new();
    for (position, item) in items.iter().enumerate() {
        let Some((name, result)) = item.as_object().and_then(|o| o.iter().next()) else {
            return Err(Error::parse(format!("malformed bulk item at {position}")));
        };
        let action = BulkAction::parse(name)
            .ok_or_else(|| Error::parse(format!("unknown bulk action '{name}'")))?;
        let operation = sent.get(position);
        let id = result
            .get("_id")
            .and_then(Value::as_str)
            .or_else(|| operation.and_then(|op| op.id()))
            .unwrap_or_default()
            .to_string();
        let status = result
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(500);
        let error = result.get("error").map(|e| match e {
            Value::String(reason) => reason.clone(),
            other => other
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        });
        report.items.push(BulkItemResult {
            action,
            id,
            index: result
                .get("_index")
                .and_then(Value::as_str)
                .map(str::to_string),
            status,
            error,
            payload: operation.and_then(|op| op.body.clone()),
        });
    }
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
