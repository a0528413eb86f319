//! Document ingestion and the document registry.
//!
//! [`ingest_file`] takes a file on disk through the whole write path:
//! validate → register → extract → chunk → contract fields → replace
//! vectors → mark ready. Documents are tracked in the SQLite `documents`
//! table by [`DocumentRegistry`]; their chunks live in the vector index.
//!
//! A file whose SHA-256 matches an already registered document keeps that
//! document's id, so re-ingesting it replaces the old chunks instead of
//! adding a second copy.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::contract::extract_contract_info;
use crate::error::{Error, Result};
use crate::extract::{extract_bytes, validate_file, ExtractError};
use crate::index::VectorIndex;
use crate::models::{Chunk, ContractInfo, Document, DocumentStatus, FileType};

/// Size figures for one processed document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessingStats {
    pub total_chars: usize,
    pub total_words: usize,
    pub total_chunks: usize,
    pub avg_chunk_size: f64,
    pub page_count: usize,
}

impl ProcessingStats {
    pub fn compute(text: &str, chunks: &[Chunk], page_count: usize) -> Self {
        let total_chunks = chunks.len();
        let chunk_chars: usize = chunks.iter().map(|c| c.content.chars().count()).sum();
        Self {
            total_chars: text.chars().count(),
            total_words: text.split_whitespace().count(),
            total_chunks,
            avg_chunk_size: if total_chunks == 0 {
                0.0
            } else {
                chunk_chars as f64 / total_chunks as f64
            },
            page_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document: Document,
    pub contract_info: ContractInfo,
    pub stats: ProcessingStats,
    pub stored_chunks: usize,
    /// `true` when the file matched an existing document by content hash.
    pub replaced_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub document_id: String,
    pub found: bool,
    pub vectors_removed: usize,
}

fn registry_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::storage(operation, e.into())
}

fn ts(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let file_type: String = row.get("file_type");
    let status: String = row.get("status");
    let file_size: i64 = row.get("file_size");
    let uploaded_at: i64 = row.get("uploaded_at");
    let processed_at: Option<i64> = row.get("processed_at");

    Ok(Document {
        id: row.get("id"),
        filename: row.get("filename"),
        file_type: FileType::from_extension(&file_type)?,
        file_size: file_size.max(0) as u64,
        content_hash: row.get("content_hash"),
        status: DocumentStatus::parse(&status).ok_or_else(|| {
            Error::storage(
                "read document",
                anyhow::anyhow!("unknown document status '{}'", status),
            )
        })?,
        text_content: row.get("text_content"),
        error_message: row.get("error_message"),
        uploaded_at: from_ts(uploaded_at),
        processed_at: processed_at.map(from_ts),
    })
}

const DOCUMENT_COLUMNS: &str = "id, filename, file_type, file_size, content_hash, status, text_content, error_message, uploaded_at, processed_at";

/// SQLite-backed registry of ingested documents.
#[derive(Clone)]
pub struct DocumentRegistry {
    pool: SqlitePool,
}

impl DocumentRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or fully overwrite a document row.
    pub async fn save(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, file_type, file_size, content_hash, status,
                                   text_content, error_message, uploaded_at, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                file_type = excluded.file_type,
                file_size = excluded.file_size,
                content_hash = excluded.content_hash,
                status = excluded.status,
                text_content = excluded.text_content,
                error_message = excluded.error_message,
                uploaded_at = excluded.uploaded_at,
                processed_at = excluded.processed_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(doc.file_type.as_str())
        .bind(doc.file_size as i64)
        .bind(&doc.content_hash)
        .bind(doc.status.as_str())
        .bind(&doc.text_content)
        .bind(&doc.error_message)
        .bind(ts(&doc.uploaded_at))
        .bind(doc.processed_at.as_ref().map(ts))
        .execute(&self.pool)
        .await
        .map_err(registry_error("save document"))?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(registry_error("get document"))?;
        row.as_ref().map(document_from_row).transpose()
    }

    pub async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE content_hash = ? ORDER BY uploaded_at DESC LIMIT 1",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(content_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(registry_error("find document by hash"))?;
        row.as_ref().map(document_from_row).transpose()
    }

    /// All documents, newest first.
    pub async fn list(&self) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents ORDER BY uploaded_at DESC, id",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(registry_error("list documents"))?;
        rows.iter().map(document_from_row).collect()
    }

    /// Returns `true` if a row was removed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(registry_error("delete document"))?;
        Ok(result.rows_affected() > 0)
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Ingest one file end to end.
///
/// On a processing failure after registration the document is left in the
/// `error` state with the message recorded, and the error is returned.
pub async fn ingest_file(
    config: &Config,
    registry: &DocumentRegistry,
    index: &VectorIndex,
    path: &Path,
) -> Result<IngestReport> {
    let io_error = |e: std::io::Error| ExtractError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    let size = std::fs::metadata(path).map_err(io_error)?.len();
    let max_bytes = config.upload.max_file_size_mb * 1024 * 1024;
    let file_type = validate_file(path, size, max_bytes)?;
    let bytes = std::fs::read(path).map_err(io_error)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let hash = content_hash(&bytes);

    let mut document = Document::new(filename, file_type, size, hash);
    let existing = registry.find_by_hash(&document.content_hash).await?;
    let replaced_existing = existing.is_some();
    if let Some(previous) = existing {
        tracing::info!(document_id = %previous.id, "Re-ingesting document with identical content");
        document.id = previous.id;
    }

    document.status = DocumentStatus::Processing;
    registry.save(&document).await?;

    match process(config, index, &document, &bytes).await {
        Ok(processed) => {
            document.status = DocumentStatus::Ready;
            document.text_content = Some(processed.text);
            document.error_message = None;
            document.processed_at = Some(Utc::now());
            registry.save(&document).await?;

            tracing::info!(
                document_id = %document.id,
                filename = %document.filename,
                chunks = processed.stats.total_chunks,
                stored = processed.stored_chunks,
                "Document ingested"
            );

            Ok(IngestReport {
                document,
                contract_info: processed.contract_info,
                stats: processed.stats,
                stored_chunks: processed.stored_chunks,
                replaced_existing,
            })
        }
        Err(e) => {
            tracing::error!(document_id = %document.id, error = %e, "Document processing failed");
            document.status = DocumentStatus::Error;
            document.error_message = Some(e.to_string());
            document.processed_at = Some(Utc::now());
            registry.save(&document).await?;
            Err(e)
        }
    }
}

/// Output of the extract, chunk and index steps for one document.
struct Processed {
    text: String,
    contract_info: ContractInfo,
    stats: ProcessingStats,
    stored_chunks: usize,
}

async fn process(
    config: &Config,
    index: &VectorIndex,
    document: &Document,
    bytes: &[u8],
) -> Result<Processed> {
    let extracted = extract_bytes(bytes, document.file_type)?;
    let chunks = chunk_text(
        &extracted.text,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?;
    let contract_info = extract_contract_info(&extracted.text);
    let stats = ProcessingStats::compute(&extracted.text, &chunks, extracted.page_count);

    index.delete_document(&document.id).await?;
    let stored = index.store_chunks(document, &chunks).await?;

    Ok(Processed {
        text: extracted.text,
        contract_info,
        stats,
        stored_chunks: stored,
    })
}

pub async fn list_documents(registry: &DocumentRegistry) -> Result<Vec<Document>> {
    registry.list().await
}

pub async fn get_document(registry: &DocumentRegistry, id: &str) -> Result<Option<Document>> {
    registry.get(id).await
}

/// Remove a document's vectors, then its registry row.
pub async fn delete_document(
    registry: &DocumentRegistry,
    index: &VectorIndex,
    id: &str,
) -> Result<DeleteReport> {
    let vectors_removed = index.delete_document(id).await?;
    let found = registry.remove(id).await?;
    tracing::info!(document_id = id, found, vectors_removed, "Document deleted");
    Ok(DeleteReport {
        document_id: id.to_string(),
        found,
        vectors_removed,
    })
}
