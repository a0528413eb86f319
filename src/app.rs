//! Wiring of the pipeline components.
//!
//! [`App`] owns one instance of each collaborator and hands out references;
//! there are no process-wide client handles. The CLI builds it from a
//! [`Config`] with [`App::open`]; tests inject their own providers through
//! [`App::with_providers`].

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::generation::{create_generator, CompletionProvider};
use crate::index::VectorIndex;
use crate::ingest::DocumentRegistry;
use crate::query::{PipelineOptions, RagPipeline};
use crate::store::SqliteVectorStore;

pub struct App {
    pub config: Config,
    pub registry: DocumentRegistry,
    pub index: Arc<VectorIndex>,
    pub pipeline: RagPipeline,
}

impl App {
    /// Open the database and build the providers named in `config`.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let pool = db::open(&config)
            .await
            .map_err(|e| Error::storage("open database", e))?;
        Self::with_providers(config, pool, embedder, generator).await
    }

    /// Build on an already migrated pool with explicit providers.
    pub async fn with_providers(
        config: Config,
        pool: SqlitePool,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Option<Arc<dyn CompletionProvider>>,
    ) -> Result<Self> {
        let store = SqliteVectorStore::open(pool.clone(), &config.store.collection)
            .await
            .map_err(|e| Error::storage("open collection", e))?;
        let index = Arc::new(VectorIndex::new(embedder, Arc::new(store)));
        let pipeline = RagPipeline::new(
            index.clone(),
            generator,
            PipelineOptions::from_config(&config),
        );

        tracing::debug!(
            collection = %config.store.collection,
            embedding_enabled = config.embedding.is_enabled(),
            generation_enabled = config.generation.is_enabled(),
            "Pipeline ready"
        );

        Ok(Self {
            registry: DocumentRegistry::new(pool),
            index,
            pipeline,
            config,
        })
    }
}
