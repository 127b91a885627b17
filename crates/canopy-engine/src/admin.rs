//! Index and alias management calls.
//!
//! These endpoints are the same across every supported engine generation,
//! so drivers share a single [`IndexAdmin`] instead of re-implementing them.
//! Non-2xx answers become [`Error::Engine`] except where "not found" is an
//! expected outcome (existence checks, deleting an absent index, reading an
//! alias nobody has created yet).

use std::collections::BTreeSet;
use std::sync::Arc;

use canopy_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::transport::{EngineRequest, Transport};

/// One action of an `_aliases` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    /// Point the alias at an index.
    Add {
        /// Physical index.
        index: String,
        /// Alias name.
        alias: String,
    },
    /// Detach the alias from an index.
    Remove {
        /// Physical index.
        index: String,
        /// Alias name.
        alias: String,
    },
}

/// Index and alias management over a [`Transport`].
#[derive(Clone)]
pub struct IndexAdmin {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for IndexAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexAdmin").finish_non_exhaustive()
    }
}

impl IndexAdmin {
    /// Create an admin client.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Create a physical index with a driver-rendered body.
    pub async fn create_index(&self, name: &str, body: Value) -> Result<()> {
        log::info!("Creating index {name}");
        self.transport
            .send(EngineRequest::put(name, body))
            .await?
            .into_result()?;
        Ok(())
    }

    /// Returns `true` if a physical index or alias with this name exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self.transport.send(EngineRequest::head(name)).await?;
        if response.is_not_found() {
            return Ok(false);
        }
        response.into_result().map(|_| true)
    }

    /// Delete a physical index; deleting a missing index is not an error.
    pub async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self.transport.send(EngineRequest::delete(name)).await?;
        if response.is_not_found() {
            log::debug!("Index {name} already gone");
            return Ok(());
        }
        response.into_result()?;
        log::info!("Deleted index {name}");
        Ok(())
    }

    /// Physical indices the alias currently points at.
    pub async fn indices_behind_alias(&self, alias: &str) -> Result<BTreeSet<String>> {
        let response = self
            .transport
            .send(EngineRequest::get(format!("_alias/{alias}")))
            .await?;
        if response.is_not_found() {
            return Ok(BTreeSet::new());
        }
        let response = response.into_result()?;
        let indices = response
            .body
            .as_object()
            .ok_or_else(|| Error::parse("alias response is not an object"))?;
        Ok(indices.keys().cloned().collect())
    }

    /// Returns `true` if `name` is a concrete index rather than an alias.
    ///
    /// `GET /{name}` answers with the concrete index names; for an alias
    /// that is never the alias name itself.
    pub async fn is_concrete_index(&self, name: &str) -> Result<bool> {
        let response = self.transport.send(EngineRequest::get(name)).await?;
        if response.is_not_found() {
            return Ok(false);
        }
        let response = response.into_result()?;
        Ok(response
            .body
            .as_object()
            .is_some_and(|indices| indices.contains_key(name)))
    }

    /// Physical indices whose name starts with `prefix`.
    pub async fn list_physical_indices(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .transport
            .send(EngineRequest::get(format!(
                "_cat/indices/{prefix}*?format=json"
            )))
            .await?;
        if response.is_not_found() {
            return Ok(Vec::new());
        }
        let response = response.into_result()?;
        let rows = response
            .body
            .as_array()
            .ok_or_else(|| Error::parse("index listing is not an array"))?;
        let mut names: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get("index").and_then(Value::as_str))
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Apply alias actions in one atomic call.
    pub async fn update_aliases(&self, actions: &[AliasAction]) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        log::debug!("Applying {} alias actions", actions.len());
        self.transport
            .send(EngineRequest::post("_aliases", json!({ "actions": actions })))
            .await?
            .into_result()?;
        Ok(())
    }

    /// Point `alias` at every index in `add` and detach it from every index
    /// in `remove`, in a single atomic call.
    ///
    /// Indices present in both lists stay attached.
    pub async fn swap_alias(&self, alias: &str, remove: &[String], add: &[String]) -> Result<()> {
        let mut actions: Vec<AliasAction> = remove
            .iter()
            .filter(|index| !add.contains(*index))
            .map(|index| AliasAction::Remove {
                index: index.clone(),
                alias: alias.to_string(),
            })
            .collect();
        actions.extend(add.iter().map(|index| AliasAction::Add {
            index: index.clone(),
            alias: alias.to_string(),
        }));
        self.update_aliases(&actions).await?;
        log::debug!("Alias {alias} now points at {}", add.join(", "));
        Ok(())
    }

    /// Make recent writes to an index searchable.
    pub async fn refresh(&self, name: &str) -> Result<()> {
        self.transport
            .send(EngineRequest::post_empty(format!("{name}/_refresh")))
            .await?
            .into_result()?;
        Ok(())
    }

    /// Raw cluster health document.
    pub async fn cluster_status(&self) -> Result<Value> {
        let response = self
            .transport
            .send(EngineRequest::get("_cluster/health"))
            .await?
            .into_result()?;
        Ok(response.body)
    }
}

// ============================================================================
// Tests
// ============================================================================
