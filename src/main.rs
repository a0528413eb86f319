//! # Contract RAG CLI (`contract-rag`)
//!
//! Ingest telecom contracts and ask questions about them.
//!
//! ## Usage
//!
//! ```bash
//! contract-rag --config ./config/contract-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create the SQLite database and run schema migrations |
//! | `ingest <file>` | Extract, chunk, embed and store a contract |
//! | `extract <file>` | Print the contract fields found in a file |
//! | `chunk <file>` | Print the chunks a file would be split into |
//! | `search "<query>"` | Semantic search, optionally within one document |
//! | `ask <id> "<question>"` | Answer a question from one document |
//! | `chunks <id>` | List the stored chunks of a document |
//! | `intent "<question>"` | Show the intent analysis of a question |
//! | `documents` | List ingested documents |
//! | `delete <id>` | Remove a document and its vectors |
//! | `stats` | Collection statistics |
//! | `health` | Probe the store and the embedding provider |
//! | `suggestions` | Example questions by topic |
//!
//! Every command accepts `--json`, which prints a
//! `{ success, message, data, error }` envelope instead of text.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use contract_rag::app::App;
use contract_rag::chunk::chunk_text;
use contract_rag::config::{self, Config};
use contract_rag::contract::extract_contract_info;
use contract_rag::db;
use contract_rag::error::{Error, Outcome, Result};
use contract_rag::extract::{extract_file, validate_file, ExtractError};
use contract_rag::index::{IndexHealth, IndexStats};
use contract_rag::ingest::{self, DeleteReport, IngestReport};
use contract_rag::intent::{classify_intent, IntentResult};
use contract_rag::logging;
use contract_rag::models::{Chunk, ContractInfo, Document, QueryResponse, SearchHit};
use contract_rag::query::query_suggestions;
use contract_rag::store::StoredRecord;

/// Contract RAG: question answering over telecom service contracts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. The OpenAI key is read from `OPENAI_API_KEY` (a `.env` file in the
/// working directory is honoured).
#[derive(Parser)]
#[command(
    name = "contract-rag",
    about = "Contract RAG: ingest telecom contracts and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/contract-rag.toml")]
    config: PathBuf,

    /// Print a JSON result envelope instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Debug-level logging with source locations.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents, collections and
    /// vector_records tables. Safe to run more than once.
    Init,

    /// Ingest a contract file (pdf, docx or txt).
    ///
    /// Re-ingesting a file with identical content reuses its document id and
    /// replaces the stored chunks.
    Ingest {
        /// Path to the contract file.
        file: PathBuf,
    },

    /// Print the contract fields found in a file without storing anything.
    Extract { file: PathBuf },

    /// Print the chunks a file would be split into.
    Chunk { file: PathBuf },

    /// Semantic search over stored chunks.
    Search {
        query: String,

        /// Restrict results to one document.
        #[arg(long)]
        document: Option<String>,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question from one document.
    Ask {
        document_id: String,
        question: String,
    },

    /// List the stored chunks of a document in order.
    Chunks { document_id: String },

    /// Show the intent analysis of a question.
    Intent { question: String },

    /// List ingested documents.
    Documents,

    /// Delete a document and its vectors.
    Delete { document_id: String },

    /// Show collection statistics.
    Stats,

    /// Probe the vector store and embedding provider.
    Health,

    /// Print example questions grouped by topic.
    Suggestions,
}

/// Print `result` as a JSON envelope or through `human`.
///
/// In JSON mode a failure is reported in the envelope and the process exits
/// with status 1.
fn emit<T: Serialize>(
    json: bool,
    operation: &str,
    result: Result<T>,
    human: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if json {
        let outcome = Outcome::from_result(operation, result);
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        if !outcome.success {
            std::process::exit(1);
        }
        return Ok(());
    }
    let value = result?;
    human(&value);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.json);
    let json = cli.json;

    let config_path = cli.config.as_path();

    match cli.command {
        Commands::Init => {
            let result = run_init(config_path).await;
            emit(json, "init", result, |_| {
                println!("Database initialized successfully.")
            })?;
        }
        Commands::Ingest { file } => {
            let result = run_ingest(config_path, &file).await;
            emit(json, "ingest", result, print_ingest)?;
        }
        Commands::Extract { file } => {
            let result = run_extract(config_path, &file);
            emit(json, "contract extraction", result, print_contract_info)?;
        }
        Commands::Chunk { file } => {
            let result = run_chunk(config_path, &file);
            emit(json, "chunking", result, |chunks| {
                for c in chunks {
                    print_chunk(c);
                }
                println!("{} chunk(s)", chunks.len());
            })?;
        }
        Commands::Search {
            query,
            document,
            top_k,
        } => {
            let result = run_search(config_path, &query, document.as_deref(), top_k).await;
            emit(json, "semantic search", result, |hits| print_hits(hits))?;
        }
        Commands::Ask {
            document_id,
            question,
        } => {
            let result = run_ask(config_path, &document_id, &question).await;
            emit(json, "query", result, print_answer)?;
        }
        Commands::Chunks { document_id } => {
            let result = run_document_chunks(config_path, &document_id).await;
            emit(json, "document chunks", result, |records| {
                for r in records {
                    print_stored(r);
                }
                println!("{} chunk(s)", records.len());
            })?;
        }
        Commands::Intent { question } => {
            emit(json, "intent analysis", Ok(classify_intent(&question)), print_intent)?;
        }
        Commands::Documents => {
            let result = run_documents(config_path).await;
            emit(json, "list documents", result, |docs| print_documents(docs))?;
        }
        Commands::Delete { document_id } => {
            let result = run_delete(config_path, &document_id).await;
            emit(json, "delete document", result, |r| {
                if r.found {
                    println!(
                        "Deleted document {} ({} vectors removed)",
                        r.document_id, r.vectors_removed
                    );
                } else {
                    println!(
                        "No document {} registered ({} vectors removed)",
                        r.document_id, r.vectors_removed
                    );
                }
            })?;
        }
        Commands::Stats => {
            let result = run_stats(config_path).await;
            emit(json, "collection stats", result, print_stats)?;
        }
        Commands::Health => {
            let result = run_health(config_path).await;
            let healthy = matches!(&result, Ok(h) if h.healthy);
            emit(json, "health check", result, print_health)?;
            if !healthy {
                std::process::exit(1);
            }
        }
        Commands::Suggestions => {
            emit(json, "query suggestions", Ok(query_suggestions()), |s| {
                let groups = [
                    ("SLA", &s.sla_questions),
                    ("Fibra", &s.fiber_questions),
                    ("Multas", &s.penalty_questions),
                    ("Vigência", &s.duration_questions),
                    ("Geral", &s.general_questions),
                ];
                for (title, questions) in groups {
                    println!("{}:", title);
                    for q in questions {
                        println!("  - {}", q);
                    }
                }
            })?;
        }
    }

    Ok(())
}

// ============ Command runners ============

async fn run_init(config_path: &Path) -> Result<String> {
    let cfg = config::load_config(config_path)?;
    let pool = db::open(&cfg)
        .await
        .map_err(|e| Error::storage("initialize database", e))?;
    pool.close().await;
    Ok(cfg.db.path.display().to_string())
}

async fn open_app(config_path: &Path) -> Result<App> {
    App::open(config::load_config(config_path)?).await
}

async fn run_ingest(config_path: &Path, file: &Path) -> Result<IngestReport> {
    let app = open_app(config_path).await?;
    ingest::ingest_file(&app.config, &app.registry, &app.index, file).await
}

fn run_extract(config_path: &Path, file: &Path) -> Result<ContractInfo> {
    let cfg = config::load_config(config_path)?;
    let text = read_text(&cfg, file)?;
    Ok(extract_contract_info(&text))
}

fn run_chunk(config_path: &Path, file: &Path) -> Result<Vec<Chunk>> {
    let cfg = config::load_config(config_path)?;
    let text = read_text(&cfg, file)?;
    chunk_text(&text, cfg.chunking.chunk_size, cfg.chunking.chunk_overlap)
}

fn read_text(cfg: &Config, file: &Path) -> Result<String> {
    let size = std::fs::metadata(file)
        .map(|m| m.len())
        .map_err(|e| ExtractError::Io {
            path: file.display().to_string(),
            message: e.to_string(),
        })?;
    let file_type = validate_file(file, size, cfg.upload.max_file_size_mb * 1024 * 1024)?;
    Ok(extract_file(file, file_type)?.text)
}

async fn run_search(
    config_path: &Path,
    query: &str,
    document: Option<&str>,
    top_k: Option<usize>,
) -> Result<Vec<SearchHit>> {
    let app = open_app(config_path).await?;
    let top_k = top_k.unwrap_or(app.config.retrieval.top_k);
    app.index.search(query, top_k, document).await
}

async fn run_ask(config_path: &Path, document_id: &str, question: &str) -> Result<QueryResponse> {
    let app = open_app(config_path).await?;
    app.pipeline.answer_query(question, document_id).await
}

async fn run_document_chunks(config_path: &Path, document_id: &str) -> Result<Vec<StoredRecord>> {
    let app = open_app(config_path).await?;
    app.index.document_chunks(document_id).await
}

async fn run_documents(config_path: &Path) -> Result<Vec<Document>> {
    let app = open_app(config_path).await?;
    ingest::list_documents(&app.registry).await
}

async fn run_delete(config_path: &Path, document_id: &str) -> Result<DeleteReport> {
    let app = open_app(config_path).await?;
    ingest::delete_document(&app.registry, &app.index, document_id).await
}

async fn run_stats(config_path: &Path) -> Result<IndexStats> {
    let app = open_app(config_path).await?;
    app.index.stats().await
}

async fn run_health(config_path: &Path) -> Result<IndexHealth> {
    let app = open_app(config_path).await?;
    Ok(app.index.health().await)
}

// ============ Text output ============

fn pct(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

fn print_contract_info(info: &ContractInfo) {
    println!(
        "contract_number:   {}",
        info.contract_number.as_deref().unwrap_or("-")
    );
    println!("sla_times:         {}", info.sla_times.join(", "));
    println!("fiber_km:          {}", info.fiber_km.join(", "));
    println!("penalty_values:    {}", info.penalty_values.join(", "));
    println!("contract_duration: {}", info.contract_duration.join(", "));
}

fn print_chunk(chunk: &Chunk) {
    println!(
        "--- {} (chars {}..{})",
        chunk.section_id,
        chunk.start_char.unwrap_or(0),
        chunk.end_char.unwrap_or(0)
    );
    println!("{}", chunk.content);
}

fn print_stored(record: &StoredRecord) {
    println!(
        "--- {} (chars {}..{})",
        record.metadata.chunk_id, record.metadata.start_char, record.metadata.end_char
    );
    println!("{}", record.content);
}

fn print_ingest(report: &IngestReport) {
    let doc = &report.document;
    println!("ingested {}", doc.filename);
    println!("  id: {}", doc.id);
    println!("  status: {}", doc.status.as_str());
    if report.replaced_existing {
        println!("  replaced previous version with identical content");
    }
    println!("  pages: {}", report.stats.page_count);
    println!("  characters: {}", report.stats.total_chars);
    println!("  words: {}", report.stats.total_words);
    println!(
        "  chunks: {} (avg {:.0} chars)",
        report.stats.total_chunks, report.stats.avg_chunk_size
    );
    println!("  vectors stored: {}", report.stored_chunks);
    print_contract_info(&report.contract_info);
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for hit in hits {
        let snippet: String = hit.content.chars().take(160).collect();
        println!(
            "{}. [{}] {} {} ({})",
            hit.rank,
            pct(hit.relevance_score),
            hit.metadata.filename,
            hit.metadata.chunk_id,
            hit.metadata.document_id
        );
        println!("   {}", snippet);
    }
}

fn print_answer(response: &QueryResponse) {
    println!("{}", response.answer);
    println!();
    println!(
        "confidence: {}{}",
        pct(response.confidence_score),
        if response.fallback { " (extractive)" } else { "" }
    );
    if let Some(intent) = &response.primary_intent {
        println!("intent: {}", intent);
    }
    println!("sources:");
    for s in &response.sources {
        println!(
            "  {} [{}]{}",
            s.section_id,
            pct(s.relevance_score.unwrap_or(0.0)),
            s.page_number
                .map(|p| format!(" page {}", p))
                .unwrap_or_default()
        );
    }
}

fn print_intent(result: &IntentResult) {
    println!(
        "primary intent: {}",
        result
            .primary_intent
            .map(|c| c.as_str())
            .unwrap_or("none")
    );
    for m in &result.all_intents {
        println!(
            "  {} ({} match(es), confidence {:.2})",
            m.category, m.matches, m.confidence
        );
    }
    println!("question type: {}", result.question_type.as_str());
    let e = &result.entities;
    println!("numbers: {}", e.numbers.join(", "));
    println!("time units: {}", e.time_units.join(", "));
    println!("money: {}", e.money.join(", "));
    println!("contract refs: {}", e.contract_refs.join(", "));
}

fn print_documents(docs: &[Document]) {
    if docs.is_empty() {
        println!("No documents.");
        return;
    }
    for d in docs {
        println!(
            "{}  {:<10} {:<4} {:>10}  {}  {}",
            d.id,
            d.status.as_str(),
            d.file_type.as_str(),
            d.file_size,
            d.uploaded_at.format("%Y-%m-%d %H:%M"),
            d.filename
        );
        if let Some(err) = &d.error_message {
            println!("    error: {}", err);
        }
    }
}

fn print_stats(stats: &IndexStats) {
    println!("collection: {}", stats.collection_name);
    println!("embedding model: {}", stats.embedding_model);
    println!("chunks: {}", stats.total_chunks);
    println!("documents: {}", stats.unique_documents);
    for (file_type, count) in &stats.document_types {
        println!("  {}: {}", file_type, count);
    }
}

fn print_health(health: &IndexHealth) {
    let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
    println!("vector store:    {}", mark(health.store_reachable));
    println!("embedding API:   {}", mark(health.embedding_reachable));
    println!("collection:      {}", mark(health.collection_queryable));
    println!("overall:         {}", mark(health.healthy));
}
