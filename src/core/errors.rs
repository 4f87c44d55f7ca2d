use thiserror::Error;

/// Error taxonomy for the retrieval pipeline.
///
/// Gateway failures are propagated as-is and never retried here; retry
/// policy, if any, belongs to the gateway implementation.
#[derive(Debug, Error)]
pub enum RagError {
    /// Load requested for a collection that was never built.
    #[error("collection not found: {0}")]
    IndexNotFound(String),

    /// A retriever was requested before any successful build or load.
    #[error("vector index not built or loaded; call build_or_load() first")]
    IndexNotBuilt,

    #[error("embedding gateway error: {0}")]
    EmbeddingGateway(String),

    #[error("chat gateway error: {0}")]
    ChatGateway(String),

    #[error("empty query")]
    EmptyQuery,

    /// Vectors within one collection must share a dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RagError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        RagError::Storage(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::EmbeddingGateway(err.to_string())
    }

    pub fn chat<E: std::fmt::Display>(err: E) -> Self {
        RagError::ChatGateway(err.to_string())
    }
}
