use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use webrag_core::config::GenerationConfig;
use webrag_core::error::{Error, Result};
use webrag_core::traits::TextGenerator;

/// OpenAI-compatible `/chat/completions`; the prompt is sent as one user message.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    id: String,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build OpenAI HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model_name.clone(),
            temperature: config.temperature,
            id: format!("openai:{}", config.model_name),
        })
    }
}

impl TextGenerator for OpenAiGenerator {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn generate_raw(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "stream": false,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req
            .send()
            .map_err(|e| Error::generation(format!("request to {url} failed: {e}")))?;
        let status = res.status();
        let text = res
            .text()
            .map_err(|e| Error::generation(format!("failed to read chat response: {e}")))?;
        if !status.is_success() {
            return Err(Error::generation(format!("chat completion returned {status}: {text}")));
        }
        debug!(model = %self.model, bytes = text.len(), "chat completion response");
        parse_response(&text)
    }
}

/// Extract `choices[0].message.content` from a chat completion body.
pub fn parse_response(body: &str) -> Result<String> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| Error::generation(format!("malformed chat response: {e}")))?;
    if let Some(err) = payload["error"]["message"].as_str() {
        return Err(Error::generation(format!("chat completion error: {err}")));
    }
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::generation("chat response has no choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::parse_response;

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices":[
            {"index":0,"message":{"role":"assistant","content":"I don't know."}}
        ]}"#;
        assert_eq!(parse_response(body).unwrap(), "I don't know.");
    }

    #[test]
    fn missing_choices_is_generation_error() {
        assert_eq!(parse_response(r#"{"choices":[]}"#).unwrap_err().kind(), "GenerationError");
        assert!(parse_response(r#"{"error":{"message":"rate limited"}}"#)
            .unwrap_err()
            .to_string()
            .contains("rate limited"));
    }
}
