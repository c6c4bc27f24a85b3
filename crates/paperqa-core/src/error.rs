//! Error taxonomy for the indexing and answering stages.
//!
//! Extraction, segmentation, and fetch failures are recoverable and
//! reported as values by their stages. The variants here are the ones
//! that must reach the caller as distinct, catchable errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every supplied unit was empty or whitespace-only.
    #[error("no non-empty units to index")]
    EmptyIndex,

    /// No collection with this name has been built in the store.
    #[error("index collection '{0}' not found; build it first")]
    IndexNotFound(String),

    /// The embedding service failed or returned a malformed batch.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// An embedding vector did not match the index dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The question would be embedded with a different model than the
    /// one the collection was built with.
    #[error("embedding model mismatch: index built with '{index}', query embedder is '{query}'")]
    ModelMismatch { index: String, query: String },

    /// The backing store failed to read or write.
    #[error("store error: {0}")]
    Store(String),

    /// The language model call failed (timeout, quota, malformed response).
    #[error("generation failed: {0}")]
    Generation(String),
}

impl PipelineError {
    pub(crate) fn store(err: anyhow::Error) -> Self {
        PipelineError::Store(format!("{:#}", err))
    }

    pub(crate) fn embedding(err: anyhow::Error) -> Self {
        PipelineError::Embedding(format!("{:#}", err))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
