use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use webrag_core::config::EmbeddingConfig;
use webrag_core::error::{Error, Result};
use webrag_core::traits::Embedder;
use webrag_core::types::EmbeddingVector;

use crate::tokenize::check_word_lengths;

/// Client for OpenAI-compatible `/embeddings` endpoints.
///
/// Inputs longer than `max_len` whitespace words are rejected before any
/// request is made, since servers may truncate them silently.
pub struct ApiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
    max_len: usize,
    id: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingItem>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl ApiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build embedding HTTP client: {e}")))?;
        let api_key = config.api_key.clone().filter(|k| !k.is_empty());
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model_name.clone(),
            api_key,
            dim: config.dimensions,
            max_len: config.max_len,
            id: format!("api:{}", config.model_name),
        })
    }
}

impl Embedder for ApiEmbedder {
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
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        check_word_lengths(texts, self.max_len)?;
        let payload = EmbeddingRequest { model: &self.model, input: texts };
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| Error::embedding(format!("request to {} failed: {e}", self.endpoint)))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::embedding(format!("failed to read embedding response: {e}")))?;
        if !status.is_success() {
            let detail = parse_error(&body).unwrap_or(body);
            let message = format!("{} returned {status}: {detail}", self.endpoint);
            return Err(Error::embedding(message));
        }
        debug!(batch = texts.len(), model = %self.model, "embedded batch via API");
        parse_response(&body, texts.len(), self.dim)
    }
}

fn parse_error(body: &str) -> Option<String> {
    serde_json::from_str::<EmbeddingResponse>(body).ok()?.error.map(|e| e.message)
}

/// Decode an `/embeddings` response body, restoring input order and checking
/// that there are `expected` vectors of dimension `dim`.
pub fn parse_response(body: &str, expected: usize, dim: usize) -> Result<Vec<EmbeddingVector>> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| Error::embedding(format!("malformed embedding response: {e}")))?;
    if let Some(err) = parsed.error {
        return Err(Error::embedding(err.message));
    }
    let mut items = parsed.data;
    if items.len() != expected {
        let got = items.len();
        return Err(Error::embedding(format!("expected {expected} embeddings, got {got}")));
    }
    items.sort_by_key(|item| item.index);
    items
        .into_iter()
        .map(|item| {
            if item.embedding.len() == dim {
                Ok(EmbeddingVector::new(item.embedding))
            } else {
                Err(Error::DimensionMismatch { expected: dim, actual: item.embedding.len() })
            }
        })
        .collect()
}
