//! Document construction.
//!
//! Turns one resolved node variant into a [`Document`]: pipeline metadata
//! under reserved `__` fields plus every indexable property after
//! coercion. A property that cannot be coerced fails the whole document;
//! the node indexer drops it and reports a diagnostic.

use std::sync::Arc;

use canopy_core::document::{
    DIMENSIONS_FIELD, DIMENSIONS_HASH_FIELD, HIDDEN_AFTER_FIELD, HIDDEN_BEFORE_FIELD,
    HIDDEN_FIELD, IDENTIFIER_FIELD, NODE_TYPE_FIELD, PARENT_PATH_FIELD, PATH_FIELD,
    TYPE_AND_SUPERTYPES_FIELD, WORKSPACE_FIELD,
};
use canopy_core::{
    AssetExtractor, CanopyConfig, Coercion, ContentNode, ContentRepository,
    DimensionCombination, Document, Error, Result,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

/// Builds search documents from nodes.
#[derive(Clone)]
pub struct DocumentBuilder {
    config: Arc<CanopyConfig>,
    repository: Arc<dyn ContentRepository>,
    assets: Arc<dyn AssetExtractor>,
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("live_workspace", &self.config.indexing.live_workspace)
            .finish_non_exhaustive()
    }
}

impl DocumentBuilder {
    /// Create a builder.
    pub fn new(
        config: Arc<CanopyConfig>,
        repository: Arc<dyn ContentRepository>,
        assets: Arc<dyn AssetExtractor>,
    ) -> Self {
        Self {
            config,
            repository,
            assets,
        }
    }

    /// Build the document for `node` indexed into `target_workspace` under
    /// `dimensions`.
    pub fn build(
        &self,
        node: &ContentNode,
        document_id: String,
        target_workspace: &str,
        dimensions: &DimensionCombination,
    ) -> Result<Document> {
        let rules = self.config.node_type(&node.node_type);
        let mut source = Map::new();

        for (name, value) in &node.properties {
            if name.starts_with("__") {
                log::debug!("Ignoring reserved property {name} on {}", node.path);
                continue;
            }
            let rule = rules.properties.get(name);
            let indexed = rule.map_or(rules.index_undeclared_properties, |r| r.indexed);
            if !indexed {
                continue;
            }
            let coerced = match rule.and_then(|r| r.coerce) {
                Some(Coercion::Attachment) => self.attachment(node, name)?,
                Some(coercion) => Some(coerce(name, value, coercion)?),
                None => Some(value.clone()),
            };
            if let Some(coerced) = coerced {
                source.insert(name.clone(), coerced);
            }
        }

        let mut type_and_supertypes = vec![node.node_type.clone()];
        type_and_supertypes.extend(rules.supertypes.iter().cloned());

        source.insert(IDENTIFIER_FIELD.to_string(), json!(node.identifier));
        source.insert(NODE_TYPE_FIELD.to_string(), json!(node.node_type));
        source.insert(
            TYPE_AND_SUPERTYPES_FIELD.to_string(),
            json!(type_and_supertypes),
        );
        source.insert(PATH_FIELD.to_string(), json!(node.path));
        if let Some(parent) = &node.parent_path {
            source.insert(PARENT_PATH_FIELD.to_string(), json!(parent));
        }
        if target_workspace != self.config.indexing.live_workspace {
            source.insert(WORKSPACE_FIELD.to_string(), json!(target_workspace));
        }
        source.insert(DIMENSIONS_FIELD.to_string(), json!(dimensions));
        source.insert(DIMENSIONS_HASH_FIELD.to_string(), json!(dimensions.hash()));
        source.insert(HIDDEN_FIELD.to_string(), json!(node.hidden));
        if let Some(before) = node.hidden_before {
            source.insert(HIDDEN_BEFORE_FIELD.to_string(), json!(format_date(&before)));
        }
        if let Some(after) = node.hidden_after {
            source.insert(HIDDEN_AFTER_FIELD.to_string(), json!(format_date(&after)));
        }

        Ok(Document {
            id: document_id,
            node_type: node.node_type.clone(),
            fulltext_root: rules.fulltext_root,
            source,
        })
    }

    fn attachment(&self, node: &ContentNode, property: &str) -> Result<Option<Value>> {
        let Some(bytes) = self.repository.asset_content(node, property) else {
            return Ok(None);
        };
        let content = self
            .assets
            .extract(&bytes, self.config.assets.size_limit_bytes);
        if content.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_value(content)?))
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Coerce a property value; `null` always stays `null`.
pub fn coerce(property: &str, value: &Value, coercion: Coercion) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let fail = |message: &str| Error::coercion(property, format!("{message}, got {value}"));

    match coercion {
        Coercion::Keyword => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| coerce(property, item, Coercion::Keyword))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(json!(n.to_string())),
            Value::Bool(b) => Ok(json!(b.to_string())),
            _ => Err(fail("expected a scalar or list of scalars")),
        },
        Coercion::Text => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(json!(n.to_string())),
            Value::Bool(b) => Ok(json!(b.to_string())),
            _ => Err(fail("expected text")),
        },
        Coercion::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(json!(false)),
                Some(1) => Ok(json!(true)),
                _ => Err(fail("expected 0 or 1")),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(json!(true)),
                "false" | "0" | "no" | "off" | "" => Ok(json!(false)),
                _ => Err(fail("expected a boolean")),
            },
            _ => Err(fail("expected a boolean")),
        },
        Coercion::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                        .map(|f| f as i64)
                })
                .map(|i| json!(i))
                .ok_or_else(|| fail("expected an integer")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| fail("expected an integer")),
            _ => Err(fail("expected an integer")),
        },
        Coercion::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(|f| json!(f))
                .ok_or_else(|| fail("expected a number")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| json!(f))
                .ok_or_else(|| fail("expected a number")),
            _ => Err(fail("expected a number")),
        },
        Coercion::Date => {
            let Value::String(s) = value else {
                return Err(fail("expected a date string"));
            };
            parse_date(s.trim())
                .map(|date| json!(format_date(&date)))
                .ok_or_else(|| fail("expected an RFC 3339 date"))
        }
        Coercion::Attachment => Err(fail("attachments are read from the repository")),
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

// ============================================================================
// Tests
// ============================================================================
