use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use webrag_core::error::{Error, Result};
use webrag_core::traits::Embedder;
use webrag_core::types::{Chunk, EmbeddingVector, IndexedChunk, RetrievalResult, ScoredChunk};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// In-memory exact cosine-similarity index over embedded chunks.
///
/// Immutable once built; share it across threads through `Arc`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dim: usize,
    model_id: String,
}

impl VectorIndex {
    /// Embed every chunk and store it alongside its vector.
    pub fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        Self::build_batched(chunks, embedder, DEFAULT_BATCH_SIZE)
    }

    /// Like [`VectorIndex::build`], calling `embed_batch` with at most
    /// `batch_size` texts at a time.
    pub fn build_batched(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let batch_size = batch_size.max(1);
        info!("Embedding {} chunks with {}", chunks.len(), embedder.model_id());

        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                     {pos}/{len} chunks ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut vectors: Vec<EmbeddingVector> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = match embedder.embed_batch(&texts) {
                Ok(v) => v,
                Err(e) => {
                    pb.abandon_with_message("embedding failed");
                    return Err(e);
                }
            };
            if embedded.len() != batch.len() {
                pb.abandon_with_message("embedding failed");
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} inputs",
                    embedder.model_id(),
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
            pb.set_position(vectors.len() as u64);
        }
        pb.finish_with_message("done");

        let dim = vectors[0].dimension();
        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            if vector.dimension() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: vector.dimension() });
            }
            let norm = vector.norm();
            entries.push(IndexedChunk { chunk, vector, norm });
        }

        info!(chunks = entries.len(), dim, "vector index built");
        Ok(Self { entries, dim, model_id: embedder.model_id().to_string() })
    }

    /// Dimension shared by every stored vector.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model that produced the stored vectors.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Top `min(k, len)` chunks by cosine similarity to `query`, best first.
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &EmbeddingVector, k: usize) -> Result<RetrievalResult> {
        if query.dimension() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.dimension() });
        }
        let query_norm = query.norm();
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                (i, cosine(&query.values, query_norm, &entry.vector.values, entry.norm))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let hits: Vec<ScoredChunk> = scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk { chunk: self.entries[i].chunk.clone(), score })
            .collect();
        debug!(k, hits = hits.len(), top = hits.first().map(|h| h.score), "index search");
        Ok(RetrievalResult { hits })
    }
}

/// Cosine similarity with precomputed norms; zero-norm inputs score 0.
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
