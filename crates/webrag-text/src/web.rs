use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use webrag_core::config::IngestionConfig;
use webrag_core::error::{Error, Result};
use webrag_core::types::Document;

use crate::html::html_to_text;

/// Fetches web pages and turns them into documents.
pub struct WebLoader {
    client: Client,
}

impl WebLoader {
    pub fn new(config: &IngestionConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::ingestion(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch one URL. HTML bodies are reduced to text; anything else is kept
    /// verbatim.
    pub fn load(&self, url: &str) -> Result<Document> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::ingestion(format!("GET {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::ingestion(format!("GET {url}: HTTP {status}")));
        }
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |ct| ct.contains("html"));
        let body = resp
            .text()
            .map_err(|e| Error::ingestion(format!("GET {url}: failed to read body: {e}")))?;
        let raw_text = if is_html { html_to_text(&body) } else { body };
        debug!(url, bytes = raw_text.len(), is_html, "fetched page");
        Ok(Document::new(url, raw_text))
    }

    pub fn load_all(&self, urls: &[String]) -> Result<Vec<Document>> {
        let mut docs = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            info!("Fetching {}/{}: {}", i + 1, urls.len(), url);
            docs.push(self.load(url)?);
        }
        Ok(docs)
    }
}
