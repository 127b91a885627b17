//! Binary asset text extraction.
//!
//! Extracting text from binary assets (PDFs, office documents) is done by an
//! external service. The pipeline sees it as a pure function from bytes to
//! [`AssetContent`]. Assets larger than the configured size limit are never
//! submitted and yield an empty result.

use serde::{Deserialize, Serialize};

/// Text and metadata extracted from an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssetContent {
    /// Plain text body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Document title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Keywords.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    /// Creation date as reported by the asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Detected MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Size of the extracted content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    /// Detected language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl AssetContent {
    /// Returns `true` when nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Extracts text from asset bytes.
pub trait AssetExtractor: Send + Sync {
    /// Extract text and metadata.
    ///
    /// Must return [`AssetContent::default`] without extracting when
    /// `bytes.len() > size_limit`.
    fn extract(&self, bytes: &[u8], size_limit: usize) -> AssetContent;
}

/// Treats assets as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl AssetExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], size_limit: usize) -> AssetContent {
        if bytes.len() > size_limit {
            log::debug!(
                "Asset of {} bytes exceeds limit of {size_limit}, skipping extraction",
                bytes.len()
            );
            return AssetContent::default();
        }
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        if text.is_empty() {
            return AssetContent::default();
        }
        let title = text.lines().next().map(|line| line.trim().to_string());
        AssetContent {
            content_length: Some(text.len()),
            content: Some(text),
            title,
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        }
    }
}
