//! # Contract RAG
//!
//! Question answering over telecom service contracts.
//!
//! Uploaded contracts (PDF, DOCX, TXT) are turned into cleaned text, split
//! into overlapping word windows, embedded, and stored in a SQLite-backed
//! vector index. Questions are classified by intent, answered from the most
//! relevant passages of one document by a language model, and fall back to
//! an extractive answer when generation is unavailable.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Extract  │──▶│  Chunk   │──▶│ VectorIndex │──▶│ SQLite store │
//! │ pdf/docx │   │ + fields │   │  (embed)    │   │  (cosine)    │
//! └──────────┘   └──────────┘   └──────┬──────┘   └──────────────┘
//!                                      │
//!                       ┌──────────────┴───────┐
//!                       ▼                      ▼
//!                 ┌──────────┐          ┌─────────────┐
//!                 │  Intent  │─────────▶│ RagPipeline │──▶ QueryResponse
//!                 └──────────┘          └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! contract-rag init
//! contract-rag ingest ./contrato.pdf
//! contract-rag ask <document-id> "Qual o SLA de atendimento?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy and result envelope |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction and cleaning |
//! | [`chunk`] | Sliding-window chunking |
//! | [`contract`] | Contract field extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Completion provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`index`] | Vector index adapter |
//! | [`intent`] | Question intent classification |
//! | [`query`] | Retrieval-augmented answering |
//! | [`ingest`] | Ingestion and document registry |
//! | [`app`] | Component wiring |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod app;
pub mod chunk;
pub mod config;
pub mod contract;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod intent;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod query;
pub mod store;
