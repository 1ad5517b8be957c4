//! webrag-text
//!
//! Document ingestion: web pages over HTTP and local text/HTML files, with
//! HTML reduced to paragraph-structured plain text.

pub mod files;
pub mod html;
pub mod web;

use tracing::info;

use webrag_core::config::{expand_path, IngestionConfig};
use webrag_core::error::Result;
use webrag_core::types::Document;

pub use html::html_to_text;
pub use web::WebLoader;

/// Load the configured URLs, then the configured directories.
pub fn load_documents(config: &IngestionConfig) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    if !config.urls.is_empty() {
        docs.extend(WebLoader::new(config)?.load_all(&config.urls)?);
    }
    for dir in &config.dirs {
        docs.extend(files::load_dir(&expand_path(dir))?);
    }
    info!(documents = docs.len(), "ingestion complete");
    Ok(docs)
}
