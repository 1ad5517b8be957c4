use std::hash::Hasher;

use twox_hash::XxHash64;

use webrag_core::error::Result;
use webrag_core::traits::Embedder;
use webrag_core::types::EmbeddingVector;

use crate::tokenize::check_word_lengths;

/// Deterministic hashed bag-of-words embedder for tests and offline runs.
///
/// Each lowercase alphanumeric term longer than two characters is hashed into
/// one of `dim` buckets with a hash-derived sign; the result is L2-normalized.
/// Texts sharing vocabulary score higher under cosine similarity, which is
/// enough to exercise retrieval end to end without model weights.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
    max_len: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), max_len: usize::MAX, id: format!("fake:d{}", dim.max(1)) }
    }

    /// Reject inputs with more than `max_len` whitespace-delimited words.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let terms = text.split(|c: char| !c.is_alphanumeric()).filter(|t| t.chars().count() > 2);
        for term in terms {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(term.to_lowercase().as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        check_word_lengths(texts, self.max_len)?;
        Ok(texts.iter().map(|text| EmbeddingVector::new(self.embed_text(text))).collect())
    }
}
