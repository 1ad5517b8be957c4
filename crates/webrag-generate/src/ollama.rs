use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use webrag_core::config::GenerationConfig;
use webrag_core::error::{Error, Result};
use webrag_core::traits::TextGenerator;

/// Local Ollama server, non-streaming `/api/generate`.
#[derive(Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    id: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build Ollama HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            id: format!("ollama:{}", config.model_name),
        })
    }
}

impl TextGenerator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn generate_raw(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| Error::generation(format!("request to {url} failed: {e}")))?;
        let status = res.status();
        let text = res
            .text()
            .map_err(|e| Error::generation(format!("failed to read Ollama response: {e}")))?;
        if !status.is_success() {
            return Err(Error::generation(format!("Ollama returned {status}: {text}")));
        }
        debug!(model = %self.model, bytes = text.len(), "ollama response");
        parse_response(&text)
    }
}

/// Extract `response` from an `/api/generate` body.
pub fn parse_response(body: &str) -> Result<String> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| Error::generation(format!("malformed Ollama response: {e}")))?;
    if let Some(err) = payload["error"].as_str() {
        return Err(Error::generation(format!("Ollama error: {err}")));
    }
    payload["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::generation("Ollama response has no 'response' field"))
}
