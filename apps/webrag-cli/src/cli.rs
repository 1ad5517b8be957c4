use std::path::PathBuf;

use clap::{Parser, Subcommand};

use webrag_core::config::{EmbeddingProvider, GenerationProvider, IngestionConfig, RagSettings};
use webrag_core::error::Result;

/// Asked when `webrag ask` is given no questions.
pub const DEMO_QUESTIONS: [&str; 3] = [
    "What is prompt engineering?",
    "What are types of attacks on LLMs?",
    "What is the square root of pi?",
];

#[derive(Debug, Parser)]
#[command(
    name = "webrag",
    version,
    about = "Answer questions over web articles with retrieval-augmented generation"
)]
pub struct Cli {
    /// Extra TOML file merged over config.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Article URL to index (repeatable); replaces the configured sources
    #[arg(long = "url", global = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory of .txt/.md/.html files to index (repeatable); replaces the
    /// configured sources
    #[arg(long = "dir", global = true, value_name = "DIR")]
    pub dirs: Vec<String>,

    /// Maximum tokens per chunk
    #[arg(long, global = true)]
    pub max_tokens: Option<usize>,

    /// Tokens repeated between consecutive chunks
    #[arg(long, global = true)]
    pub overlap: Option<usize>,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long = "top-k", global = true)]
    pub k: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer questions (the demo questions when none are given)
    Ask { questions: Vec<String> },
    /// Show the chunks retrieved for a query, with scores
    Search { query: String },
    /// Show how the corpus is chunked
    Chunks,
}

impl Cli {
    /// Fold command-line overrides into `settings` and re-validate.
    pub fn apply(&self, settings: &mut RagSettings) -> Result<()> {
        if !self.urls.is_empty() || !self.dirs.is_empty() {
            settings.ingestion.urls = self.urls.clone();
            settings.ingestion.dirs = self.dirs.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.chunking.max_tokens = max_tokens;
        }
        if let Some(overlap) = self.overlap {
            settings.chunking.overlap_tokens = overlap;
        }
        if let Some(k) = self.k {
            settings.retrieval.k = k;
        }
        settings.validate()
    }
}

/// Use `api_key` (normally `OPENAI_API_KEY`) for API providers that have none configured.
pub fn fill_api_keys(settings: &mut RagSettings, api_key: Option<String>) {
    let Some(key) = api_key.filter(|k| !k.is_empty()) else {
        return;
    };
    let embedding = &mut settings.embedding;
    if embedding.provider == EmbeddingProvider::Api && embedding.api_key.is_none() {
        embedding.api_key = Some(key.clone());
    }
    let generation = &mut settings.generation;
    if generation.provider == GenerationProvider::Openai && generation.api_key.is_none() {
        generation.api_key = Some(key);
    }
}

/// Use `user_agent` (normally `USER_AGENT`) when `ingestion.user_agent` was
/// left at its default.
pub fn fill_user_agent(settings: &mut RagSettings, user_agent: Option<String>) {
    let Some(agent) = user_agent.filter(|a| !a.trim().is_empty()) else {
        return;
    };
    if settings.ingestion.user_agent == IngestionConfig::default().user_agent {
        settings.ingestion.user_agent = agent;
    }
}
