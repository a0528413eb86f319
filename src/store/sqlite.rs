//! SQLite-backed [`VectorStore`] implementation.
//!
//! Vectors are stored as little-endian `f32` BLOBs in `vector_records`,
//! one row per `(collection, id)`. Nearest-neighbour search loads the
//! candidate rows for the filter and ranks them by cosine distance in Rust.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::models::{RecordMetadata, VectorRecord};

use super::{ensure_same_dims, sort_by_distance, MetadataFilter, ScoredRecord, StoredRecord, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait, scoped to one
/// collection.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorStore {
    /// Open (creating if necessary) a collection in an already migrated
    /// database.
    pub async fn open(pool: SqlitePool, collection: &str) -> Result<Self> {
        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, description, created_at) VALUES (?, ?, ?)",
        )
        .bind(collection)
        .bind("Contract documents for RAG system")
        .bind(chrono::Utc::now().timestamp())
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            collection: collection.to_string(),
        })
    }
}

fn metadata_from_row(row: &SqliteRow) -> RecordMetadata {
    let page_number: i64 = row.get("page_number");
    let start_char: i64 = row.get("start_char");
    let end_char: i64 = row.get("end_char");
    RecordMetadata {
        document_id: row.get("document_id"),
        filename: row.get("filename"),
        file_type: row.get("file_type"),
        chunk_id: row.get("chunk_id"),
        page_number: page_number.max(0) as u32,
        start_char: start_char.max(0) as usize,
        end_char: end_char.max(0) as usize,
    }
}

const METADATA_COLUMNS: &str =
    "id, document_id, filename, file_type, chunk_id, page_number, start_char, end_char, content";

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for r in records {
            let m = &r.metadata;
            sqlx::query(
                r#"
                INSERT INTO vector_records (collection, id, document_id, filename, file_type,
                                            chunk_id, page_number, start_char, end_char,
                                            content, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document_id = excluded.document_id,
                    filename = excluded.filename,
                    file_type = excluded.file_type,
                    chunk_id = excluded.chunk_id,
                    page_number = excluded.page_number,
                    start_char = excluded.start_char,
                    end_char = excluded.end_char,
                    content = excluded.content,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&r.id)
            .bind(&m.document_id)
            .bind(&m.filename)
            .bind(&m.file_type)
            .bind(&m.chunk_id)
            .bind(m.page_number as i64)
            .bind(m.start_char as i64)
            .bind(m.end_char as i64)
            .bind(&r.content)
            .bind(r.embedding.len() as i64)
            .bind(vec_to_blob(&r.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredRecord>> {
        let sql = format!(
            "SELECT {}, embedding FROM vector_records WHERE collection = ? AND (? IS NULL OR document_id = ?)",
            METADATA_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&self.collection)
            .bind(&filter.document_id)
            .bind(&filter.document_id)
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            ensure_same_dims(&id, vector.len(), stored.len())?;
            hits.push(ScoredRecord {
                id,
                content: row.get("content"),
                metadata: metadata_from_row(row),
                distance: cosine_distance(vector, &stored),
            });
        }

        sort_by_distance(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, filter: &MetadataFilter) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT {} FROM vector_records WHERE collection = ? AND (? IS NULL OR document_id = ?) ORDER BY id",
            METADATA_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&self.collection)
            .bind(&filter.document_id)
            .bind(&filter.document_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| StoredRecord {
                id: row.get("id"),
                content: row.get("content"),
                metadata: metadata_from_row(row),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;

        for id in ids {
            let result = sqlx::query("DELETE FROM vector_records WHERE collection = ? AND id = ?")
                .bind(&self.collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(removed as usize)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM vector_records WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn peek(&self, limit: usize) -> Result<Vec<RecordMetadata>> {
        let sql = format!(
            "SELECT {} FROM vector_records WHERE collection = ? ORDER BY id LIMIT ?",
            METADATA_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(&self.collection)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(metadata_from_row).collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}
