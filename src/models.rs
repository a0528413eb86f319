//! Core data models used throughout the contract RAG pipeline.
//!
//! These types represent the documents, chunks, vector records, and query
//! answers that flow between ingestion and retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::ExtractError;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
        }
    }

    /// Detect the type from a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Result<Self, ExtractError> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(FileType::Pdf),
            "docx" => Ok(FileType::Docx),
            "txt" => Ok(FileType::Txt),
            other => Err(ExtractError::UnsupportedFileType(other.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an ingested document: `uploaded → processing → ready | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "processing" => Some(DocumentStatus::Processing),
            "ready" => Some(DocumentStatus::Ready),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

/// An uploaded contract document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    /// SHA-256 of the raw file bytes, used to recognise re-uploads.
    pub content_hash: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a freshly uploaded document with a random UUID.
    pub fn new(
        filename: impl Into<String>,
        file_type: FileType,
        file_size: u64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            file_type,
            file_size,
            content_hash: content_hash.into(),
            status: DocumentStatus::Uploaded,
            text_content: None,
            error_message: None,
            uploaded_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// A contiguous, word-bounded section of a document (`chunk_<n>`).
///
/// `start_char`/`end_char` are estimates derived from word lengths and are
/// only meant as ordering hints, not exact slice boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub section_id: String,
    pub content: String,
    pub page_number: Option<u32>,
    pub start_char: Option<usize>,
    pub end_char: Option<usize>,
    /// Only populated on query results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub document_id: String,
    pub filename: String,
    pub file_type: String,
    pub chunk_id: String,
    /// `0` when unknown.
    pub page_number: u32,
    pub start_char: usize,
    pub end_char: usize,
}

/// One embedded chunk, keyed by `<document_id>_<chunk_id>`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub content: String,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Composite id that is unique across documents and stable across re-uploads.
    pub fn composite_id(document_id: &str, chunk_id: &str) -> String {
        format!("{}_{}", document_id, chunk_id)
    }
}

/// A ranked hit from [`VectorIndex::search`](crate::index::VectorIndex::search).
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub metadata: RecordMetadata,
    /// `1 - distance`; may be negative for distant matches.
    pub relevance_score: f64,
    /// 1-based position in the result list.
    pub rank: usize,
}

impl SearchHit {
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            section_id: self.metadata.chunk_id.clone(),
            content: self.content.clone(),
            page_number: (self.metadata.page_number > 0).then_some(self.metadata.page_number),
            start_char: Some(self.metadata.start_char),
            end_char: Some(self.metadata.end_char),
            relevance_score: Some(self.relevance_score),
        }
    }
}

/// Contract fields pulled out of document text by regular expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContractInfo {
    pub contract_number: Option<String>,
    pub sla_times: Vec<String>,
    pub fiber_km: Vec<String>,
    pub penalty_values: Vec<String>,
    pub contract_duration: Vec<String>,
}

/// The answer to a question about one document.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    /// Every retrieved chunk, in rank order, not only those used for grounding.
    pub sources: Vec<Chunk>,
    pub confidence_score: f64,
    /// `true` when the answer was assembled from snippets rather than generated.
    pub fallback: bool,
    pub primary_intent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// In-memory history of questions asked about one document.
#[derive(Debug, Clone, Serialize)]
pub struct QuerySession {
    pub id: String,
    pub document_id: String,
    pub created_at: DateTime<Utc>,
    pub queries: Vec<QueryResponse>,
}

impl QuerySession {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            created_at: Utc::now(),
            queries: Vec::new(),
        }
    }

    pub fn add_query(&mut self, response: QueryResponse) {
        self.queries.push(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_from_extension() {
        assert_eq!(FileType::from_extension("PDF").unwrap(), FileType::Pdf);
        assert_eq!(FileType::from_extension("docx").unwrap(), FileType::Docx);
        assert!(FileType::from_extension("xlsx").is_err());
    }

    #[test]
    fn composite_id_format() {
        assert_eq!(VectorRecord::composite_id("doc-1", "chunk_3"), "doc-1_chunk_3");
    }

    #[test]
    fn hit_without_page_maps_to_none() {
        let hit = SearchHit {
            content: "texto".into(),
            metadata: RecordMetadata {
                document_id: "d".into(),
                filename: "f.pdf".into(),
                file_type: "pdf".into(),
                chunk_id: "chunk_1".into(),
                page_number: 0,
                start_char: 0,
                end_char: 5,
            },
            relevance_score: 0.8,
            rank: 1,
        };
        let chunk = hit.to_chunk();
        assert_eq!(chunk.page_number, None);
        assert_eq!(chunk.section_id, "chunk_1");
        assert_eq!(chunk.relevance_score, Some(0.8));
    }

    #[test]
    fn status_roundtrips_through_str() {
        for s in [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::Ready,
            DocumentStatus::Error,
        ] {
            assert_eq!(DocumentStatus::parse(s.as_str()), Some(s));
        }
    }
}
