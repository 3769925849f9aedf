//! Turning raw sources into [`Document`]s.
//!
//! A [`Source`] names one input: a PDF, a plain-text or markdown file, or a
//! JSON export holding an array of records under a known key. The
//! [`Extractor`] trait converts it into documents; [`SourceExtractor`] is the
//! file-system implementation. Extraction never drops content silently: a
//! source that cannot be read, or that yields no text, is an
//! [`RagError::Extraction`] naming the source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::document::Document;
use crate::error::{RagError, Result};

/// Key under which exported records are found when none is given.
pub const DEFAULT_RECORDS_KEY: &str = "users";

/// One ingestion input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A PDF file; yields one document with the full extracted text.
    Pdf(PathBuf),
    /// A UTF-8 text or markdown file; yields one document.
    Text(PathBuf),
    /// A JSON object with an array of records under `key`; yields one
    /// document per record.
    JsonRecords {
        /// Path of the JSON export.
        path: PathBuf,
        /// Top-level key holding the records array.
        key: String,
    },
}

impl Source {
    /// Pick a source kind from the file extension.
    ///
    /// `.pdf` maps to [`Source::Pdf`], `.txt`/`.md`/`.markdown` to
    /// [`Source::Text`], and `.json` to [`Source::JsonRecords`] with the
    /// [`DEFAULT_RECORDS_KEY`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] for any other extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf(path)),
            "txt" | "md" | "markdown" => Ok(Self::Text(path)),
            "json" => Ok(Self::JsonRecords { path, key: DEFAULT_RECORDS_KEY.to_string() }),
            _ => Err(RagError::extraction(
                path.display().to_string(),
                format!("unsupported source type '{extension}'"),
            )),
        }
    }

    /// Records source with an explicit key.
    pub fn json_records(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self::JsonRecords { path: path.into(), key: key.into() }
    }

    /// The file backing this source.
    pub fn path(&self) -> &Path {
        match self {
            Self::Pdf(path) | Self::Text(path) => path,
            Self::JsonRecords { path, .. } => path,
        }
    }

    /// Identity used in logs, errors, and document ids.
    pub fn id(&self) -> String {
        self.path().display().to_string()
    }
}

/// Converts a [`Source`] into documents.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract every document from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] naming the source when it is
    /// unreadable, unsupported, or empty.
    async fn extract(&self, source: &Source) -> Result<Vec<Document>>;
}

/// Reads sources from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceExtractor;

#[async_trait]
impl Extractor for SourceExtractor {
    async fn extract(&self, source: &Source) -> Result<Vec<Document>> {
        let documents = match source {
            Source::Pdf(path) => vec![extract_pdf(path).await?],
            Source::Text(path) => vec![extract_text_file(path).await?],
            Source::JsonRecords { path, key } => extract_json_records(path, key).await?,
        };
        info!(source = %source.id(), document_count = documents.len(), "extracted source");
        Ok(documents)
    }
}

fn file_document(path: &Path, kind: &str, text: String) -> Document {
    let id = path.display().to_string();
    let mut document = Document::new(id.clone(), text)
        .with_metadata("source", id.clone())
        .with_metadata("kind", kind)
        .with_metadata("file_name", path.file_name().and_then(|n| n.to_str()).unwrap_or_default());
    document.source_uri = Some(id);
    document
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        error!(source = %path.display(), error = %e, "failed to read source");
        RagError::extraction(path.display().to_string(), format!("failed to read file: {e}"))
    })
}

fn require_text(path: &Path, text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(RagError::extraction(path.display().to_string(), "no extractable text"));
    }
    Ok(text)
}

#[cfg(feature = "pdf")]
async fn extract_pdf(path: &Path) -> Result<Document> {
    let bytes = read_bytes(path).await?;
    let source_id = path.display().to_string();

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| RagError::extraction(source_id.clone(), format!("task join error: {e}")))?
        .map_err(|e| {
            error!(source = %source_id, error = %e, "PDF extraction failed");
            RagError::extraction(source_id.clone(), format!("PDF extraction error: {e}"))
        })?;

    tracing::debug!(source = %source_id, text_len = text.len(), "extracted PDF text");
    Ok(file_document(path, "pdf", require_text(path, text)?))
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf(path: &Path) -> Result<Document> {
    Err(RagError::extraction(
        path.display().to_string(),
        "PDF support is not enabled (build with the `pdf` feature)",
    ))
}

async fn extract_text_file(path: &Path) -> Result<Document> {
    let bytes = read_bytes(path).await?;
    let text = String::from_utf8(bytes).map_err(|e| {
        RagError::extraction(path.display().to_string(), format!("file is not valid UTF-8: {e}"))
    })?;
    Ok(file_document(path, "text", require_text(path, text)?))
}

async fn extract_json_records(path: &Path, key: &str) -> Result<Vec<Document>> {
    let source_id = path.display().to_string();
    let bytes = read_bytes(path).await?;
    let root: Value = serde_json::from_slice(&bytes)
        .map_err(|e| RagError::extraction(source_id.clone(), format!("invalid JSON: {e}")))?;

    let records = root
        .get(key)
        .ok_or_else(|| RagError::extraction(source_id.clone(), format!("missing key '{key}'")))?
        .as_array()
        .ok_or_else(|| {
            RagError::extraction(source_id.clone(), format!("'{key}' is not an array of records"))
        })?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| record_document(&source_id, key, index, record))
        .collect()
}

/// One document per record; the text is the pretty-printed record.
fn record_document(source_id: &str, key: &str, index: usize, record: &Value) -> Result<Document> {
    let text = serde_json::to_string_pretty(record)
        .map_err(|e| RagError::extraction(source_id, format!("record {index}: {e}")))?;

    let mut document = Document::new(format!("{source_id}#{key}[{index}]"), text)
        .with_metadata("source", source_id)
        .with_metadata("kind", "json_record")
        .with_metadata("record_key", key)
        .with_metadata("record_index", index.to_string());

    match record.get("_id") {
        Some(Value::String(id)) => document = document.with_metadata("record_id", id.clone()),
        Some(other) => document = document.with_metadata("record_id", other.to_string()),
        None => {}
    }

    document.source_uri = Some(source_id.to_string());
    Ok(document)
}
