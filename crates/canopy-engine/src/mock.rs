//! Recording transport for tests.
//!
//! [`MockTransport`] records every request and answers from a queue of
//! scripted responses. When the queue is empty it answers `200 {}`, except
//! for bulk requests, which get one successful item per action line so
//! callers see a well-formed bulk response.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use canopy_core::Result;
use serde_json::{Map, Value, json};

use crate::transport::{EngineRequest, EngineResponse, Transport};

/// A [`Transport`] that records requests and replays scripted responses.
#[derive(Debug, Default)]
pub struct MockTransport {
    requests: Mutex<Vec<EngineRequest>>,
    responses: Mutex<VecDeque<Result<EngineResponse>>>,
}

impl MockTransport {
    /// Create a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unanswered request.
    pub fn push_response(&self, response: EngineResponse) {
        self.lock_responses().push_back(Ok(response));
    }

    /// Queue a transport failure for the next unanswered request.
    pub fn push_error(&self, error: canopy_core::Error) {
        self.lock_responses().push_back(Err(error));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requests whose path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<EngineRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }

    /// Forget recorded requests.
    pub fn clear(&self) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<EngineResponse>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Successful bulk response for an NDJSON body.
pub fn bulk_success_response(ndjson: &str) -> EngineResponse {
    let mut items = Vec::new();
    let mut lines = ndjson.lines().filter(|l| !l.trim().is_empty());
    while let Some(line) = lines.next() {
        let Ok(Value::Object(header)) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some((action, metadata)) = header.into_iter().next() else {
            continue;
        };
        if action != "delete" {
            lines.next();
        }
        let mut result = Map::new();
        if let Some(id) = metadata.get("_id") {
            result.insert("_id".to_string(), id.clone());
        }
        if let Some(index) = metadata.get("_index") {
            result.insert("_index".to_string(), index.clone());
        }
        result.insert("status".to_string(), json!(200));
        items.push(json!({ action: result }));
    }
    EngineResponse::ok(json!({"took": 1, "errors": false, "items": items}))
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if let Some(scripted) = self.lock_responses().pop_front() {
            return scripted;
        }
        Ok(match request.ndjson_body() {
            Some(body) => bulk_success_response(body),
            None => EngineResponse::ok(json!({})),
        })
    }
}
