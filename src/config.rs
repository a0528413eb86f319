//! TOML configuration parsing and validation.
//!
//! Every section has defaults, so a minimal file only needs `[db]`.
//! Credentials are never read from the file: the OpenAI providers take the
//! key from `OPENAI_API_KEY`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::AVG_WORD_LEN;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/contract-rag.sqlite"),
            },
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "contract_documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// How many of the top results are placed in the generation prompt.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_chunks: default_context_chunks(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_context_chunks() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: None,
            timeout_secs: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: None,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_model() -> String {
    "gpt-4".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

fn default_max_file_size_mb() -> u64 {
    50
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| {
        Error::Configuration(format!(
            "failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    validate(&config)?;

    Ok(config)
}

/// Check the invariants the pipeline relies on.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size < AVG_WORD_LEN {
        return Err(Error::Configuration(format!(
            "chunking.chunk_size must be >= {} (got {})",
            AVG_WORD_LEN, config.chunking.chunk_size
        )));
    }

    if config.retrieval.top_k < 1 {
        return Err(Error::Configuration(
            "retrieval.top_k must be >= 1".to_string(),
        ));
    }

    if config.retrieval.context_chunks < 1 {
        return Err(Error::Configuration(
            "retrieval.context_chunks must be >= 1".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        return Err(Error::Configuration(
            "generation.temperature must be in [0.0, 2.0]".to_string(),
        ));
    }

    if config.upload.max_file_size_mb == 0 {
        return Err(Error::Configuration(
            "upload.max_file_size_mb must be > 0".to_string(),
        ));
    }

    for (section, provider) in [
        ("embedding", config.embedding.provider.as_str()),
        ("generation", config.generation.provider.as_str()),
    ] {
        match provider {
            "disabled" | "openai" => {}
            other => {
                return Err(Error::Configuration(format!(
                    "Unknown {} provider: '{}'. Must be disabled or openai.",
                    section, other
                )))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let f = write_config("[db]\npath = \"/tmp/x.sqlite\"\n");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.store.collection, "contract_documents");
        assert!(!config.embedding.is_enabled());
        assert!(!config.generation.is_enabled());
        assert!((config.generation.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let f = write_config("[db]\npath = \"x\"\n[chunking]\nchunk_size = 0\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = load_config(Path::new("/nonexistent/contract-rag.toml")).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("/nonexistent/contract-rag.toml"));
    }

    #[test]
    fn malformed_toml_is_configuration_error() {
        let f = write_config("[db\npath = ");
        let err = load_config(f.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let f = write_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn overlap_larger_than_size_is_allowed() {
        let mut config = Config::default();
        config.chunking.chunk_size = 100;
        config.chunking.chunk_overlap = 500;
        assert!(validate(&config).is_ok());
    }
}
