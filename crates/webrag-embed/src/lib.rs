//! Embedding backends: a local BERT sentence encoder on candle, an
//! OpenAI-compatible HTTP client and a deterministic fake.

use std::sync::Arc;

use tracing::info;

use webrag_core::config::{expand_path, EmbeddingConfig, EmbeddingProvider};
use webrag_core::error::{Error, Result};
use webrag_core::traits::{Embedder, TokenCounter};

mod api;
mod bert;
mod device;
mod fake;
mod pool;
mod tokenize;

pub use api::{parse_response, ApiEmbedder};
pub use bert::{resolve_model_dir, BertEmbedder};
pub use device::select_device;
pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::{load_tokenizer, HfTokenCounter};

/// An embedder plus, when it has one, a counter over its own tokenizer.
pub struct LoadedEmbedder {
    pub embedder: Arc<dyn Embedder>,
    pub token_counter: Option<Arc<dyn TokenCounter>>,
}

/// Build the embedder selected by `embedding.provider`.
pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<LoadedEmbedder> {
    match config.provider {
        EmbeddingProvider::Fake => {
            info!("Using FakeEmbedder ({} dims)", config.dimensions);
            let embedder = FakeEmbedder::new(config.dimensions).with_max_len(config.max_len);
            Ok(LoadedEmbedder { embedder: Arc::new(embedder), token_counter: None })
        }
        EmbeddingProvider::Api => {
            let embedder = ApiEmbedder::new(config)?;
            info!("Using embedding API at {} ({})", config.base_url, config.model_name);
            Ok(LoadedEmbedder { embedder: Arc::new(embedder), token_counter: None })
        }
        EmbeddingProvider::Local => {
            let model_dir = match &config.model_dir {
                Some(dir) => {
                    let dir = expand_path(dir);
                    if !dir.is_dir() {
                        let shown = dir.display();
                        return Err(Error::config(format!(
                            "embedding.model_dir {shown} is not a directory"
                        )));
                    }
                    dir
                }
                None => resolve_model_dir(&config.model_name)?,
            };
            let embedder = BertEmbedder::load(&model_dir, &config.model_name, config.max_len)?;
            let counter: Arc<dyn TokenCounter> = Arc::new(embedder.token_counter());
            Ok(LoadedEmbedder { embedder: Arc::new(embedder), token_counter: Some(counter) })
        }
    }
}
