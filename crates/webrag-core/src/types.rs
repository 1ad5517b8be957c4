//! Domain types flowing through ingestion, indexing and answering.

use serde::{Deserialize, Serialize};

/// A fetched source document. Immutable once created and consumed once by
/// the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_uri: String,
    pub raw_text: String,
}

impl Document {
    pub fn new(source_uri: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self { source_uri: source_uri.into(), raw_text: raw_text.into() }
    }
}

/// A bounded, contiguous segment of one document; the unit of retrieval.
///
/// - `text`: trimmed slice of the parent document's text
/// - `source_uri`: `Document::source_uri` of the parent
/// - `sequence_index`: position among the parent's chunks, starting at 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_uri: String,
    pub sequence_index: usize,
}

/// Fixed-dimension embedding produced by an `Embedder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub values: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// A chunk together with its embedding, as stored by the vector index.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: EmbeddingVector,
    pub norm: f32,
}

/// One retrieval hit. Higher `score` is more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Top-k hits in descending score order; ties keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Drop the scores, keeping the ranked chunks.
    #[must_use]
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.hits.into_iter().map(|h| h.chunk).collect()
    }
}

/// Final output of a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub context_used: Vec<Chunk>,
    pub text: String,
}
