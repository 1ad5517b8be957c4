//! Layered configuration and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml`, an
//! optional explicit file and `APP_*` environment variables (`__` separates
//! sections, e.g. `APP_RETRIEVAL__K=6`). The result is extracted into
//! [`RagSettings`], which components receive explicitly.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_URLS: [&str; 3] = [
    "https://lilianweng.github.io/posts/2023-06-23-agent/",
    "https://lilianweng.github.io/posts/2023-03-15-prompt-engineering/",
    "https://lilianweng.github.io/posts/2023-10-25-adv-attack-llm/",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// Whitespace-delimited units.
    Whitespace,
    /// The embedding model's own tokenizer (local embedder only).
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub tokenizer: TokenizerKind,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 250, overlap_tokens: 0, tokenizer: TokenizerKind::Model }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Local,
    Api,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model_name: String,
    /// Directory holding `config.json`, `tokenizer.json` and weights.
    pub model_dir: Option<String>,
    pub base_url: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
    /// Model input limit in model tokens, special tokens included.
    pub max_len: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            dimensions: 384,
            max_len: 512,
            batch_size: 32,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    Ollama,
    Openai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub model_name: String,
    pub temperature: f32,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Replaces the built-in prompt; must contain `{question}` and `{documents}`.
    pub prompt_template: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Ollama,
            model_name: "llama3.1".to_string(),
            temperature: 0.0,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 300,
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub urls: Vec<String>,
    pub dirs: Vec<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_URLS.iter().map(ToString::to_string).collect(),
            dirs: Vec::new(),
            user_agent: concat!("webrag/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Every tunable of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub ingestion: IngestionConfig,
    pub logging: LoggingConfig,
}

impl RagSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            return Err(Error::config("chunking.max_tokens must be greater than zero"));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            return Err(Error::config(
                "chunking.overlap_tokens must be smaller than chunking.max_tokens",
            ));
        }
        if self.retrieval.k == 0 {
            return Err(Error::config("retrieval.k must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.generation.temperature) {
            return Err(Error::config(format!(
                "generation.temperature must lie in [0, 1], got {}",
                self.generation.temperature
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::config("embedding.batch_size must be at least 1"));
        }
        if self.embedding.dimensions == 0 {
            return Err(Error::config("embedding.dimensions must be at least 1"));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load defaults, `config.toml`, `config.<RUST_ENV>.toml` and `APP_*` vars.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], with `extra` merged after the standard files.
    pub fn load_with(extra: Option<&Path>) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(RagSettings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        if let Some(path) = extra {
            if !path.exists() {
                return Err(Error::config(format!("config file {} does not exist", path.display())));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Build from an in-memory figment; used by tests and embedders of the library.
    #[must_use]
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("failed to read '{key}': {e}")))
    }

    /// Extract and validate all sections.
    pub fn settings(&self) -> Result<RagSettings> {
        let settings = RagSettings {
            chunking: self.get("chunking")?,
            embedding: self.get("embedding")?,
            retrieval: self.get("retrieval")?,
            generation: self.get("generation")?,
            ingestion: self.get("ingestion")?,
            logging: self.get("logging")?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
