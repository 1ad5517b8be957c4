//! Prompt construction and LLM providers.

use std::sync::Arc;

use tracing::info;

use webrag_core::config::{GenerationConfig, GenerationProvider};
use webrag_core::error::{Error, Result};
use webrag_core::traits::TextGenerator;

pub mod generator;
pub mod ollama;
pub mod openai;
pub mod prompt;

pub use generator::Generator;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;
pub use prompt::{PromptTemplate, DEFAULT_TEMPLATE};

/// Build the LLM client selected by `generation.provider`.
pub fn get_default_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    if !(0.0..=1.0).contains(&config.temperature) {
        return Err(Error::config(format!(
            "generation.temperature must lie in [0, 1], got {}",
            config.temperature
        )));
    }
    let llm: Arc<dyn TextGenerator> = match config.provider {
        GenerationProvider::Ollama => Arc::new(OllamaGenerator::new(config)?),
        GenerationProvider::Openai => Arc::new(OpenAiGenerator::new(config)?),
    };
    info!("Using {} at {} (temperature {})", llm.model_id(), config.base_url, config.temperature);
    Ok(llm)
}

/// The configured template, or the built-in one.
pub fn prompt_template(config: &GenerationConfig) -> Result<PromptTemplate> {
    match &config.prompt_template {
        Some(t) => PromptTemplate::new(t.as_str()),
        None => Ok(PromptTemplate::default()),
    }
}
