//! In-memory [`VectorStore`] for tests and one-off runs.
//!
//! Brute-force cosine distance over a `HashMap` behind a `RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{RecordMetadata, VectorRecord};

use super::{ensure_same_dims, sort_by_distance, MetadataFilter, ScoredRecord, StoredRecord, VectorStore};

pub struct InMemoryVectorStore {
    collection: String,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new("contract_documents")
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.records.write().map_err(poisoned)?;
        for r in records {
            stored.insert(r.id.clone(), r.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read().map_err(poisoned)?;
        let mut hits = Vec::new();
        for r in stored.values().filter(|r| filter.matches(&r.metadata)) {
            ensure_same_dims(&r.id, vector.len(), r.embedding.len())?;
            hits.push(ScoredRecord {
                id: r.id.clone(),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.embedding),
            });
        }
        sort_by_distance(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, filter: &MetadataFilter) -> Result<Vec<StoredRecord>> {
        let stored = self.records.read().map_err(poisoned)?;
        let mut out: Vec<StoredRecord> = stored
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| StoredRecord {
                id: r.id.clone(),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut stored = self.records.write().map_err(poisoned)?;
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    async fn peek(&self, limit: usize) -> Result<Vec<RecordMetadata>> {
        let stored = self.records.read().map_err(poisoned)?;
        let mut ids: Vec<&String> = stored.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit)
            .filter_map(|id| stored.get(id).map(|r| r.metadata.clone()))
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(vec![self.collection.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc: &str, chunk: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: VectorRecord::composite_id(doc, chunk),
            embedding,
            content: format!("{} {}", doc, chunk),
            metadata: RecordMetadata {
                document_id: doc.to_string(),
                filename: "c.pdf".to_string(),
                file_type: "pdf".to_string(),
                chunk_id: chunk.to_string(),
                page_number: 0,
                start_char: 0,
                end_char: 0,
            },
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_same_id() {
        let store = InMemoryVectorStore::default();
        store.upsert(&[record("d1", "chunk_1", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(&[record("d1", "chunk_1", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let store = InMemoryVectorStore::default();
        store
            .upsert(&[
                record("d1", "chunk_1", vec![1.0, 0.0]),
                record("d1", "chunk_2", vec![0.7, 0.7]),
                record("d2", "chunk_1", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, &MetadataFilter::document("d1"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.metadata.document_id == "d1"));
        assert_eq!(hits[0].id, "d1_chunk_1");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn query_rejects_mismatched_dimensions() {
        let store = InMemoryVectorStore::default();
        store.upsert(&[record("d1", "chunk_1", vec![1.0, 0.0])]).await.unwrap();
        let err = store
            .query(&[1.0, 0.0, 0.0], 5, &MetadataFilter::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn delete_reports_removed_count() {
        let store = InMemoryVectorStore::default();
        store.upsert(&[record("d1", "chunk_1", vec![1.0])]).await.unwrap();
        let removed = store
            .delete(&["d1_chunk_1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
