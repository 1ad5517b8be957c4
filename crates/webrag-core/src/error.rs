use thiserror::Error;

/// Failure taxonomy shared by every stage of the pipeline.
///
/// Errors are propagated to the caller unchanged; no stage retries or
/// recovers on its own.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("cannot build an index from an empty corpus")]
    EmptyCorpus,

    #[error("dimension mismatch: expected {expected}-d vector, got {actual}-d")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("ingestion failed: {0}")]
    Ingestion(String),
}

impl Error {
    /// Name of the failure kind as surfaced to users.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Embedding(_) => "EmbeddingError",
            Error::EmptyCorpus => "EmptyCorpusError",
            Error::DimensionMismatch { .. } => "DimensionMismatchError",
            Error::Generation(_) => "GenerationError",
            Error::Ingestion(_) => "IngestionError",
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Error::Embedding(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Error::Generation(msg.into())
    }

    pub fn ingestion(msg: impl Into<String>) -> Self {
        Error::Ingestion(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
