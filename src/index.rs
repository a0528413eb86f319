//! Vector index adapter.
//!
//! [`VectorIndex`] composes an [`EmbeddingProvider`] and a [`VectorStore`]
//! into the operations the rest of the crate needs: embedding a batch,
//! storing a document's chunks, semantic search scoped to one document,
//! deletion and introspection.
//!
//! Both collaborators are passed in at construction. Write-path failures
//! are reported as [`Error::Storage`], read-path failures as
//! [`Error::Retrieval`], each tagged with the operation that failed.
//!
//! # Relevance
//!
//! The store reports cosine distance `d` in `[0, 2]`. Hits carry
//! `relevance_score = 1 - d`, unclamped, so a score at or below zero marks a
//! poor match.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::bail;
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::{Chunk, Document, RecordMetadata, SearchHit, VectorRecord};
use crate::store::{MetadataFilter, StoredRecord, VectorStore};

/// Aggregate numbers about the indexed collection.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub collection_name: String,
    pub total_chunks: usize,
    pub unique_documents: usize,
    /// Chunk count per file type.
    pub document_types: BTreeMap<String, usize>,
    pub embedding_model: String,
}

/// Result of the three health probes. `healthy` is their conjunction.
#[derive(Debug, Clone, Serialize)]
pub struct IndexHealth {
    pub store_reachable: bool,
    pub embedding_reachable: bool,
    pub collection_queryable: bool,
    pub healthy: bool,
}

pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed `texts` in a single provider call.
    ///
    /// An empty batch returns immediately without calling the provider.
    pub async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    /// Embed and upsert every chunk of `document`, returning the number of
    /// records written. Records are keyed `<document_id>_<chunk_id>`, so
    /// storing the same chunks again overwrites them.
    pub async fn store_chunks(&self, document: &Document, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embed(&texts)
            .await
            .map_err(|e| Error::storage("embed chunks", e))?;

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| VectorRecord {
                id: VectorRecord::composite_id(&document.id, &chunk.section_id),
                embedding,
                content: chunk.content.clone(),
                metadata: RecordMetadata {
                    document_id: document.id.clone(),
                    filename: document.filename.clone(),
                    file_type: document.file_type.as_str().to_string(),
                    chunk_id: chunk.section_id.clone(),
                    page_number: chunk.page_number.unwrap_or(0),
                    start_char: chunk.start_char.unwrap_or(0),
                    end_char: chunk.end_char.unwrap_or(0),
                },
            })
            .collect();

        self.store
            .upsert(&records)
            .await
            .map_err(|e| Error::storage("upsert vectors", e))?;

        tracing::info!(
            document_id = %document.id,
            stored = records.len(),
            "Stored chunks in vector index"
        );
        Ok(records.len())
    }

    /// Semantic search, optionally restricted to one document.
    ///
    /// Results are ordered by descending relevance with 1-based ranks.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let vectors = self
            .embed(&[query.to_string()])
            .await
            .map_err(|e| Error::retrieval("embed query", e))?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::retrieval("embed query", anyhow::anyhow!("no vector returned")))?;

        let filter = MetadataFilter {
            document_id: document_id.map(str::to_string),
        };
        let records = self
            .store
            .query(&vector, top_k, &filter)
            .await
            .map_err(|e| Error::retrieval("semantic search", e))?;

        let hits: Vec<SearchHit> = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| SearchHit {
                content: r.content,
                metadata: r.metadata,
                relevance_score: 1.0 - r.distance,
                rank: i + 1,
            })
            .collect();

        tracing::debug!(
            query,
            document_id = document_id.unwrap_or("*"),
            hits = hits.len(),
            "Semantic search"
        );
        Ok(hits)
    }

    /// Remove every record belonging to `document_id`. Returns 0 when the
    /// document has nothing indexed.
    pub async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let ids = self
            .store
            .ids_matching(&MetadataFilter::document(document_id))
            .await
            .map_err(|e| Error::storage("find document vectors", e))?;
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self
            .store
            .delete(&ids)
            .await
            .map_err(|e| Error::storage("delete vectors", e))?;
        tracing::info!(document_id, removed, "Deleted document vectors");
        Ok(removed)
    }

    /// Stored chunks of one document in chunk order (`chunk_2` before
    /// `chunk_10`).
    pub async fn document_chunks(&self, document_id: &str) -> Result<Vec<StoredRecord>> {
        let mut records = self
            .store
            .get(&MetadataFilter::document(document_id))
            .await
            .map_err(|e| Error::retrieval("get document chunks", e))?;
        records.sort_by_key(|r| chunk_ordinal(&r.metadata.chunk_id));
        Ok(records)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let records = self
            .store
            .get(&MetadataFilter::default())
            .await
            .map_err(|e| Error::retrieval("collection stats", e))?;

        let mut document_types: BTreeMap<String, usize> = BTreeMap::new();
        let mut documents = std::collections::HashSet::new();
        for r in &records {
            *document_types.entry(r.metadata.file_type.clone()).or_default() += 1;
            documents.insert(r.metadata.document_id.as_str());
        }

        Ok(IndexStats {
            collection_name: self.store.collection().to_string(),
            total_chunks: records.len(),
            unique_documents: documents.len(),
            document_types,
            embedding_model: self.embedder.model_name().to_string(),
        })
    }

    /// Run the three probes independently; a failing probe is logged and
    /// reported as `false`, never as an error.
    pub async fn health(&self) -> IndexHealth {
        let store_reachable = match self.store.list_collections().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Vector store unreachable");
                false
            }
        };
        let embedding_reachable = match self.embed(&["test".to_string()]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Embedding provider unreachable");
                false
            }
        };
        let collection_queryable = match self.store.count().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Collection not queryable");
                false
            }
        };

        IndexHealth {
            store_reachable,
            embedding_reachable,
            collection_queryable,
            healthy: store_reachable && embedding_reachable && collection_queryable,
        }
    }
}

/// Numeric suffix of `chunk_<n>`, falling back to `usize::MAX` for ids in
/// any other shape.
fn chunk_ordinal(chunk_id: &str) -> usize {
    chunk_id
        .rsplit('_')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use crate::store::InMemoryVectorStore;

    #[test]
    fn chunk_ordinal_parses_suffix() {
        assert_eq!(chunk_ordinal("chunk_10"), 10);
        assert_eq!(chunk_ordinal("chunk_2"), 2);
        assert_eq!(chunk_ordinal("intro"), usize::MAX);
    }

    #[tokio::test]
    async fn empty_embed_skips_provider() {
        let index = VectorIndex::new(
            Arc::new(DisabledProvider),
            Arc::new(InMemoryVectorStore::default()),
        );
        assert!(index.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_failure_is_retrieval_error() {
        let index = VectorIndex::new(
            Arc::new(DisabledProvider),
            Arc::new(InMemoryVectorStore::default()),
        );
        let err = index.search("sla", 5, Some("d1")).await.unwrap_err();
        assert_eq!(err.code(), "RETRIEVAL_ERROR");
    }

    #[tokio::test]
    async fn delete_unknown_document_is_zero() {
        let index = VectorIndex::new(
            Arc::new(DisabledProvider),
            Arc::new(InMemoryVectorStore::default()),
        );
        assert_eq!(index.delete_document("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn health_is_conjunction_of_probes() {
        let index = VectorIndex::new(
            Arc::new(DisabledProvider),
            Arc::new(InMemoryVectorStore::default()),
        );
        let health = index.health().await;
        assert!(health.store_reachable);
        assert!(!health.embedding_reachable);
        assert!(health.collection_queryable);
        assert!(!health.healthy);
    }
}
