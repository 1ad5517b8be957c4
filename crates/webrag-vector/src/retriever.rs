use std::sync::Arc;

use tracing::debug;

use webrag_core::error::{Error, Result};
use webrag_core::traits::Embedder;
use webrag_core::types::{Chunk, RetrievalResult};

use crate::index::VectorIndex;

pub const DEFAULT_K: usize = 4;

/// Embeds a query and returns the `k` most similar indexed chunks.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    /// Fails with `DimensionMismatch` if `embedder` does not produce vectors
    /// of the index's dimension, and with a configuration error if `k` is 0.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, k: usize) -> Result<Self> {
        if embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), actual: embedder.dim() });
        }
        if k == 0 {
            return Err(Error::config("retrieval k must be at least 1"));
        }
        Ok(Self { index, embedder, k })
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        self.retrieve_k(query, self.k)
    }

    pub fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self.search(query, k)?.into_chunks())
    }

    /// Ranked hits with their scores.
    pub fn search(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let vector = self.embedder.embed_one(query)?;
        let result = self.index.search(&vector, k)?;
        debug!(query, hits = result.len(), "retrieved");
        Ok(result)
    }
}
