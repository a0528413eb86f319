//! End-to-end tests of the ingestion and query pipeline against a temporary
//! SQLite database, with deterministic in-process providers.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use contract_rag::app::App;
use contract_rag::chunk::chunk_text;
use contract_rag::config::Config;
use contract_rag::db;
use contract_rag::embedding::{DisabledProvider, EmbeddingProvider};
use contract_rag::generation::{CompletionProvider, CompletionRequest};
use contract_rag::index::VectorIndex;
use contract_rag::ingest;
use contract_rag::models::{
    Document, DocumentStatus, FileType, QuerySession, RecordMetadata, VectorRecord,
};
use contract_rag::query::{
    PipelineOptions, RagPipeline, MAX_GENERATED_CONFIDENCE, NOT_FOUND_ANSWER,
};
use contract_rag::store::{InMemoryVectorStore, MetadataFilter, VectorStore};

const DIMS: usize = 64;

/// Bag-of-words embedding: each lowercased token is hashed (FNV-1a) into
/// one of `DIMS` buckets.
struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in token.bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % DIMS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Returns the same vector for every input.
struct ConstantEmbedder(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    fn model_name(&self) -> &str {
        "constant-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.0.clone()).collect())
    }
}

struct FixedGenerator {
    answer: &'static str,
    requests: std::sync::Mutex<Vec<CompletionRequest>>,
}

impl FixedGenerator {
    fn new(answer: &'static str) -> Self {
        Self {
            answer,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for FixedGenerator {
    fn model_name(&self) -> &str {
        "fixed-test"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.answer.to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl CompletionProvider for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        bail!("OpenAI API error 429 Too Many Requests: rate limited")
    }
}

const CONTRACT_TEXT: &str = "Contrato nº DCT-NEO165-000210 entre as partes. \
O SLA de atendimento será de 4 horas para incidentes críticos. \
A extensão da fibra óptica será de 15,5 km na rede metropolitana. \
Em caso de descumprimento será aplicada multa de R$ 5.000,00 por ocorrência. \
O contrato tem vigência de 24 meses com renovação automática.";

fn document(id: &str) -> Document {
    let mut doc = Document::new("contrato.txt", FileType::Txt, 100, "hash");
    doc.id = id.to_string();
    doc
}

fn memory_index() -> (Arc<InMemoryVectorStore>, Arc<VectorIndex>) {
    let store = Arc::new(InMemoryVectorStore::default());
    let index = Arc::new(VectorIndex::new(Arc::new(HashEmbedder::new()), store.clone()));
    (store, index)
}

async fn index_contract(index: &VectorIndex, doc_id: &str) -> usize {
    // Small windows so each sentence lands in its own chunks.
    let chunks = chunk_text(CONTRACT_TEXT, 60, 10).unwrap();
    index.store_chunks(&document(doc_id), &chunks).await.unwrap()
}

async fn sqlite_app(
    generator: Option<Arc<dyn CompletionProvider>>,
) -> (TempDir, App) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("data").join("rag.sqlite");
    config.chunking.chunk_size = 60;
    config.chunking.chunk_overlap = 10;
    let pool = db::open(&config).await.unwrap();
    let app = App::with_providers(config, pool, Arc::new(HashEmbedder::new()), generator)
        .await
        .unwrap();
    (tmp, app)
}

#[tokio::test]
async fn storing_twice_overwrites() {
    let (store, index) = memory_index();
    let first = index_contract(&index, "doc-a").await;
    let count_once = store.count().await.unwrap();
    let second = index_contract(&index, "doc-a").await;

    assert_eq!(first, second);
    assert_eq!(store.count().await.unwrap(), count_once);
    assert_eq!(count_once, first);
}

#[tokio::test]
async fn empty_chunk_list_is_noop() {
    let embedder = Arc::new(HashEmbedder::new());
    let index = VectorIndex::new(embedder.clone(), Arc::new(InMemoryVectorStore::default()));
    assert_eq!(index.store_chunks(&document("d"), &[]).await.unwrap(), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn relevance_is_one_minus_distance_in_order() {
    let (store, index) = memory_index();
    index_contract(&index, "doc-a").await;

    let query = "qual o valor da multa por descumprimento?";
    let hits = index.search(query, 10, Some("doc-a")).await.unwrap();
    assert!(!hits.is_empty());

    for pair in hits.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
        assert_eq!(pair[0].rank + 1, pair[1].rank);
    }
    assert_eq!(hits[0].rank, 1);

    let raw = store
        .query(&HashEmbedder::vector(query), 10, &MetadataFilter::document("doc-a"))
        .await
        .unwrap();
    for (hit, record) in hits.iter().zip(&raw) {
        assert_eq!(hit.relevance_score, 1.0 - record.distance);
    }
    assert!(hits[0].content.to_lowercase().contains("multa"));
}

fn raw_record(doc: &str, chunk: &str, embedding: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: VectorRecord::composite_id(doc, chunk),
        embedding,
        content: format!("trecho {}", chunk),
        metadata: RecordMetadata {
            document_id: doc.to_string(),
            filename: "contrato.txt".to_string(),
            file_type: "txt".to_string(),
            chunk_id: chunk.to_string(),
            page_number: 0,
            start_char: 0,
            end_char: 0,
        },
    }
}

#[tokio::test]
async fn opposite_vectors_give_negative_relevance() {
    let store = Arc::new(InMemoryVectorStore::default());
    store
        .upsert(&[raw_record("doc-a", "chunk_1", vec![-1.0, 0.0])])
        .await
        .unwrap();
    let index = VectorIndex::new(Arc::new(ConstantEmbedder(vec![1.0, 0.0])), store);

    let hits = index.search("qualquer pergunta", 5, Some("doc-a")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!((hits[0].relevance_score + 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn dimension_mismatch_is_retrieval_error() {
    let store = Arc::new(InMemoryVectorStore::default());
    store
        .upsert(&[raw_record("doc-a", "chunk_1", vec![1.0, 0.0])])
        .await
        .unwrap();
    let index = VectorIndex::new(Arc::new(ConstantEmbedder(vec![1.0, 0.0, 0.0])), store);

    let err = index.search("qual o SLA?", 5, Some("doc-a")).await.unwrap_err();
    assert_eq!(err.code(), "RETRIEVAL_ERROR");
    assert!(err.to_string().contains("dimension mismatch"));
}

#[tokio::test]
async fn search_is_scoped_to_document() {
    let (_store, index) = memory_index();
    index_contract(&index, "doc-a").await;
    index_contract(&index, "doc-b").await;

    let hits = index.search("multa", 50, Some("doc-a")).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.metadata.document_id == "doc-a"));

    let unscoped = index.search("multa", 50, None).await.unwrap();
    assert!(unscoped.iter().any(|h| h.metadata.document_id == "doc-b"));
}

#[tokio::test]
async fn no_results_without_generation_is_not_found() {
    let (_store, index) = memory_index();
    index_contract(&index, "doc-a").await;
    let pipeline = RagPipeline::new(index, None, PipelineOptions::default());

    let response = pipeline
        .answer_query("qual o SLA?", "unknown-doc")
        .await
        .unwrap();
    assert_eq!(response.confidence_score, 0.0);
    assert_eq!(response.answer, NOT_FOUND_ANSWER);
    assert!(response.sources.is_empty());
    assert!(response.fallback);
}

#[tokio::test]
async fn extractive_confidence_is_max_relevance() {
    let (_store, index) = memory_index();
    index_contract(&index, "doc-a").await;
    let pipeline = RagPipeline::new(index.clone(), None, PipelineOptions::default());

    let question = "qual o valor da multa por descumprimento?";
    let response = pipeline.answer_query(question, "doc-a").await.unwrap();
    let hits = index.search(question, 5, Some("doc-a")).await.unwrap();

    let max = hits
        .iter()
        .map(|h| h.relevance_score)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(response.fallback);
    assert_eq!(response.confidence_score, max);
    assert_eq!(response.sources.len(), hits.len());
    assert!(response.answer.starts_with("Encontrei"));
    assert_eq!(response.primary_intent.as_deref(), Some("penalty"));
}

#[tokio::test]
async fn generated_answer_is_capped_and_grounded() {
    let (_store, index) = memory_index();
    index_contract(&index, "doc-a").await;
    let generator = Arc::new(FixedGenerator::new("O SLA é de 4 horas (Trecho 1)."));
    let pipeline = RagPipeline::new(
        index,
        Some(generator.clone() as Arc<dyn CompletionProvider>),
        PipelineOptions::default(),
    );

    // Asking with the exact sentence makes the top relevance close to 1.
    let question = "O SLA de atendimento será de 4 horas para incidentes críticos.";
    let response = pipeline.answer_query(question, "doc-a").await.unwrap();

    assert!(!response.fallback);
    assert_eq!(response.answer, "O SLA é de 4 horas (Trecho 1).");
    assert!(response.confidence_score <= MAX_GENERATED_CONFIDENCE);
    assert!(response.sources.len() > 3, "all retrieved sources are returned");

    let requests = generator.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.temperature, 0.3);
    assert_eq!(request.max_tokens, 1000);
    assert!(request.user_prompt.contains("[Trecho 3"));
    assert!(!request.user_prompt.contains("[Trecho 4"));
    assert!(request.system_prompt.contains("Foco especial"));
}

#[tokio::test]
async fn generation_failure_degrades_to_extractive() {
    let (_store, index) = memory_index();
    index_contract(&index, "doc-a").await;
    let pipeline = RagPipeline::new(
        index,
        Some(Arc::new(FailingGenerator)),
        PipelineOptions::default(),
    );

    let response = pipeline
        .answer_query("qual a extensão da fibra?", "doc-a")
        .await
        .unwrap();
    assert!(response.fallback);
    assert!(response.answer.starts_with("Encontrei"));
    assert!(response.confidence_score > 0.0);
}

#[tokio::test]
async fn retrieval_failure_aborts_query() {
    let index = Arc::new(VectorIndex::new(
        Arc::new(DisabledProvider),
        Arc::new(InMemoryVectorStore::default()),
    ));
    let pipeline = RagPipeline::new(
        index,
        Some(Arc::new(FixedGenerator::new("unused"))),
        PipelineOptions::default(),
    );

    let err = pipeline.answer_query("qual o SLA?", "doc-a").await.unwrap_err();
    assert_eq!(err.code(), "RETRIEVAL_ERROR");
}

#[tokio::test]
async fn session_records_answers() {
    let (_store, index) = memory_index();
    index_contract(&index, "doc-a").await;
    let pipeline = RagPipeline::new(index, None, PipelineOptions::default());

    let mut session = QuerySession::new("doc-a");
    pipeline.ask(&mut session, "qual o SLA?").await.unwrap();
    pipeline.ask(&mut session, "qual a multa?").await.unwrap();
    assert_eq!(session.queries.len(), 2);
    assert_eq!(session.queries[1].question, "qual a multa?");
}

#[tokio::test]
async fn ingest_reingest_and_delete() {
    let (tmp, app) = sqlite_app(None).await;
    let path = tmp.path().join("contrato.txt");
    fs::write(&path, CONTRACT_TEXT).unwrap();

    let report = ingest::ingest_file(&app.config, &app.registry, &app.index, &path)
        .await
        .unwrap();
    assert_eq!(report.document.status, DocumentStatus::Ready);
    assert!(!report.replaced_existing);
    assert_eq!(
        report.contract_info.contract_number.as_deref(),
        Some("DCT-NEO165-000210")
    );
    assert!(report.contract_info.penalty_values.contains(&"R$ 5.000,00".to_string()));
    assert_eq!(report.stored_chunks, report.stats.total_chunks);

    let stats = app.index.stats().await.unwrap();
    assert_eq!(stats.total_chunks, report.stored_chunks);
    assert_eq!(stats.unique_documents, 1);
    assert_eq!(stats.document_types.get("txt"), Some(&report.stored_chunks));

    // Same bytes again: same id, no duplicate vectors.
    let again = ingest::ingest_file(&app.config, &app.registry, &app.index, &path)
        .await
        .unwrap();
    assert!(again.replaced_existing);
    assert_eq!(again.document.id, report.document.id);
    assert_eq!(app.index.stats().await.unwrap().total_chunks, report.stored_chunks);
    assert_eq!(ingest::list_documents(&app.registry).await.unwrap().len(), 1);

    let chunks = app.index.document_chunks(&report.document.id).await.unwrap();
    assert_eq!(chunks.len(), report.stored_chunks);
    assert_eq!(chunks[0].metadata.chunk_id, "chunk_1");

    let response = app
        .pipeline
        .answer_query("qual o valor da multa?", &report.document.id)
        .await
        .unwrap();
    assert!(!response.sources.is_empty());

    let deleted = ingest::delete_document(&app.registry, &app.index, &report.document.id)
        .await
        .unwrap();
    assert!(deleted.found);
    assert_eq!(deleted.vectors_removed, report.stored_chunks);
    assert!(ingest::get_document(&app.registry, &report.document.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(app.index.stats().await.unwrap().total_chunks, 0);
}

#[tokio::test]
async fn failed_processing_marks_document_error() {
    let (tmp, app) = sqlite_app(None).await;
    let path = tmp.path().join("vazio.txt");
    fs::write(&path, b"").unwrap();

    let err = ingest::ingest_file(&app.config, &app.registry, &app.index, &path)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EXTRACTION_ERROR");

    let docs = ingest::list_documents(&app.registry).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].status, DocumentStatus::Error);
    assert!(docs[0].error_message.is_some());
}

#[tokio::test]
async fn unsupported_file_is_rejected_before_registration() {
    let (tmp, app) = sqlite_app(None).await;
    let path = tmp.path().join("planilha.xlsx");
    fs::write(&path, b"not a contract").unwrap();

    let err = ingest::ingest_file(&app.config, &app.registry, &app.index, &path)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "EXTRACTION_ERROR");
    assert!(ingest::list_documents(&app.registry).await.unwrap().is_empty());
}
