//! Persistent vector store abstraction.
//!
//! The [`VectorStore`] trait is the minimal surface the index adapter needs
//! from a nearest-neighbour store: upsert by id, k-nearest query with an
//! exact-match metadata filter, bulk delete, and introspection.
//!
//! Distances are cosine distances in `[0, 2]`. Implementations must return
//! query results in ascending distance order.
//!
//! Concurrency control is the store's own business: callers add no locking
//! of their own, and two writers for the same id resolve as last-write-wins.

pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{RecordMetadata, VectorRecord};

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Exact-match filter on record metadata. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub document_id: Option<String>,
}

impl MetadataFilter {
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
        }
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        self.document_id
            .as_deref()
            .map_or(true, |id| metadata.document_id == id)
    }
}

/// A stored record as returned by [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub content: String,
    pub metadata: RecordMetadata,
    pub distance: f64,
}

/// A stored record without its vector, as returned by [`VectorStore::get`].
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: String,
    pub content: String,
    pub metadata: RecordMetadata,
}

/// Abstract vector store backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite records by id |
/// | [`query`](VectorStore::query) | `k` nearest records to a vector |
/// | [`get`](VectorStore::get) | Records matching a filter |
/// | [`ids_matching`](VectorStore::ids_matching) | Ids of records matching a filter |
/// | [`delete`](VectorStore::delete) | Remove records by id |
/// | [`count`](VectorStore::count) | Number of records in the collection |
/// | [`peek`](VectorStore::peek) | Metadata of the first few records |
/// | [`list_collections`](VectorStore::list_collections) | Collection names |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the collection this handle reads and writes.
    fn collection(&self) -> &str;

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredRecord>>;

    async fn get(&self, filter: &MetadataFilter) -> Result<Vec<StoredRecord>>;

    async fn ids_matching(&self, filter: &MetadataFilter) -> Result<Vec<String>> {
        Ok(self.get(filter).await?.into_iter().map(|r| r.id).collect())
    }

    /// Returns the number of records actually removed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    async fn count(&self) -> Result<usize>;

    async fn peek(&self, limit: usize) -> Result<Vec<RecordMetadata>>;

    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Reject a stored vector whose dimensionality differs from the query's.
pub(crate) fn ensure_same_dims(id: &str, query_dims: usize, stored_dims: usize) -> Result<()> {
    if query_dims != stored_dims {
        bail!(
            "dimension mismatch for record {}: query has {} dims, stored vector has {}",
            id,
            query_dims,
            stored_dims
        );
    }
    Ok(())
}

/// Order by distance, breaking ties on id so results are deterministic.
pub(crate) fn sort_by_distance(records: &mut [ScoredRecord]) {
    records.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
