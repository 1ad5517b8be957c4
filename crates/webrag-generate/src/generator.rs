use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use webrag_core::error::{Error, Result};
use webrag_core::traits::TextGenerator;
use webrag_core::types::Chunk;

use crate::prompt::PromptTemplate;

/// Renders the prompt for a question and its context, then asks the LLM.
#[derive(Clone)]
pub struct Generator {
    llm: Arc<dyn TextGenerator>,
    template: PromptTemplate,
}

impl Generator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm, template: PromptTemplate::default() }
    }

    pub fn with_template(llm: Arc<dyn TextGenerator>, template: PromptTemplate) -> Self {
        Self { llm, template }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// The prompt `generate` would send for these inputs.
    pub fn build_prompt(&self, question: &str, context: &[Chunk]) -> String {
        let documents = context.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
        self.template.render(question, &documents)
    }

    /// Raw model output for `question` grounded in `context`, which is
    /// inserted in the order given.
    pub fn generate(&self, question: &str, context: &[Chunk]) -> Result<String> {
        let prompt = self.build_prompt(question, context);
        debug!(
            model = self.llm.model_id(),
            chunks = context.len(),
            prompt_chars = prompt.len(),
            "generating"
        );

        let start = Instant::now();
        let output = self.llm.generate_raw(&prompt)?;
        if output.trim().is_empty() {
            let model = self.llm.model_id();
            return Err(Error::generation(format!("{model} returned an empty answer")));
        }
        info!(
            model = self.llm.model_id(),
            elapsed_ms = start.elapsed().as_millis(),
            "answer generated"
        );
        Ok(output)
    }
}
