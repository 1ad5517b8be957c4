use crate::error::{Error, Result};
use crate::types::EmbeddingVector;

/// Maps text to fixed-dimension vectors. Implemented by local models, remote
/// APIs and test fakes.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the underlying model (e.g. `local:all-MiniLM-L6-v2`).
    fn model_id(&self) -> &str;
    /// Dimension shared by every vector this instance produces.
    fn dim(&self) -> usize;
    /// Maximum input length accepted by the model, in model tokens.
    fn max_len(&self) -> usize;
    /// One vector per input, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        match (out.pop(), out.is_empty()) {
            (Some(v), true) => Ok(v),
            _ => Err(Error::embedding(format!(
                "{} returned an unexpected number of vectors for a single input",
                self.model_id()
            ))),
        }
    }
}

/// Raw text-generation capability: prompt in, completion out.
pub trait TextGenerator: Send + Sync {
    fn model_id(&self) -> &str;
    fn generate_raw(&self, prompt: &str) -> Result<String>;
}

/// Counts tokens the way chunk boundaries are measured.
pub trait TokenCounter: Send + Sync {
    fn name(&self) -> &str;
    fn count_tokens(&self, text: &str) -> usize;

    /// Tokens the embedding model adds to every input on top of
    /// `count_tokens`, such as `[CLS]` and `[SEP]`.
    fn special_tokens(&self) -> usize {
        0
    }
}

