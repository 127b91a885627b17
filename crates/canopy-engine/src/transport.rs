//! Engine wire transport.
//!
//! Every call the pipeline makes to the search engine goes through the
//! [`Transport`] trait as an [`EngineRequest`]: a method, a path relative to
//! the engine base URL, and an optional JSON or NDJSON body. The response is
//! reduced to a status code and a parsed JSON body, so drivers and admin
//! calls never touch HTTP types directly and can be tested against
//! [`MockTransport`](crate::mock::MockTransport).
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy_core::EngineConfig;
//! use canopy_engine::{EngineRequest, HttpTransport, Transport};
//!
//! let transport = HttpTransport::new(&EngineConfig::default())?;
//! let response = transport.send(EngineRequest::get("_cluster/health")).await?;
//! println!("status: {}", response.body["status"]);
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use canopy_core::{EngineConfig, Error, Result};
use serde_json::Value;

/// HTTP method of an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// A single JSON document.
    Json(Value),
    /// Newline-delimited JSON, used by the bulk endpoint.
    NdJson(String),
}

/// One call to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the engine base URL, without a leading slash.
    pub path: String,
    /// Optional body.
    pub body: Option<RequestBody>,
}

impl EngineRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<RequestBody>) -> Self {
        let path = path.into();
        Self {
            method,
            path: path.trim_start_matches('/').to_string(),
            body,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    /// `HEAD path`
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path, None)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    /// `PUT path` with a JSON body.
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(RequestBody::Json(body)))
    }

    /// `POST path` with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(RequestBody::Json(body)))
    }

    /// `POST path` without a body.
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path, None)
    }

    /// `POST path` with an NDJSON body.
    pub fn post_ndjson(path: impl Into<String>, body: String) -> Self {
        Self::new(Method::Post, path, Some(RequestBody::NdJson(body)))
    }

    /// JSON body, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// NDJSON body, if any.
    pub fn ndjson_body(&self) -> Option<&str> {
        match &self.body {
            Some(RequestBody::NdJson(body)) => Some(body),
            _ => None,
        }
    }
}

/// Status and parsed body of an engine response.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a string when not JSON.
    pub body: Value,
}

impl EngineResponse {
    /// Create a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// `200 OK` with a body.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// `404 Not Found` without a body.
    pub fn not_found() -> Self {
        Self::new(404, Value::Null)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` for 404.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Best-effort error detail from an engine error body.
    pub fn error_message(&self) -> String {
        match &self.body {
            Value::Null => format!("HTTP {}", self.status),
            Value::String(text) => text.clone(),
            body => match body.get("error") {
                Some(Value::String(reason)) => reason.clone(),
                Some(error) => error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
                None => body.to_string(),
            },
        }
    }

    /// Turn a non-2xx response into [`Error::Engine`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::engine(self.status, self.error_message()))
        }
    }
}

/// Sends requests to the engine.
///
/// Implementations must not interpret statuses: a 404 or 409 is returned as
/// a response, and only failures to complete the call are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call.
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse>;
}

/// [`Transport`] over HTTP using `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
    credentials: Option<(String, String)>,
}

impl HttpTransport {
    /// Build a transport from engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::transport_with_source("Failed to build HTTP client", e))?;
        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            credentials,
        })
    }

    /// Engine base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn map_send_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                seconds: self.timeout_secs,
            }
        } else {
            Error::transport_with_source(format!("Engine request failed: {error}"), error)
        }
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: EngineRequest) -> Result<EngineResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        };
        log::trace!("{} /{}", request.method, request.path);

        let mut builder = self.client.request(method, self.url(&request.path));
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, Some(password));
        }
        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::NdJson(body)) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        Ok(EngineResponse::new(status, parse_body(&text)))
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
