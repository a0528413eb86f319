//! Error taxonomy for the contract RAG core.
//!
//! Mandatory data-path failures (embedding, vector store) surface as
//! [`Error::Storage`] or [`Error::Retrieval`] carrying the operation name.
//! Generation failures are represented by [`Error::Generation`] but are
//! absorbed by the query pipeline and never reach a caller of
//! [`answer_query`](crate::query::RagPipeline::answer_query).

use serde::Serialize;
use thiserror::Error;

use crate::extract::ExtractError;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid settings: chunk parameters, credentials, providers.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding or index failure while writing vectors.
    #[error("storage error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Embedding or index failure while reading vectors.
    #[error("retrieval error during {operation}: {source}")]
    Retrieval {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Language-model call failure.
    #[error("generation error: {0}")]
    Generation(#[source] anyhow::Error),

    /// The input could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractError),
}

impl Error {
    pub fn storage(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Storage { operation, source }
    }

    pub fn retrieval(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Retrieval { operation, source }
    }

    /// Stable machine-readable code for the `--json` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Retrieval { .. } => "RETRIEVAL_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::Extraction(_) => "EXTRACTION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error detail carried inside a failed [`Outcome`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Structured result envelope returned across the library boundary.
///
/// Shape: `{ "success": bool, "message": str, "data": T?, "error": {...}? }`.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl<T: Serialize> Outcome<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, err: &Error) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(ErrorDetail {
                code: err.code().to_string(),
                message: format!("{:#}", err),
            }),
        }
    }

    /// Wrap a core result, logging failures the way every boundary does.
    pub fn from_result(operation: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(format!("{} succeeded", operation), data),
            Err(e) => {
                tracing::error!(operation, error = %e, "operation failed");
                Self::failed(format!("{} failed", operation), &e)
            }
        }
    }
}
