//! Question answering over an indexed corpus: retrieve, assemble, generate.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use webrag_core::chunker::{Chunker, WhitespaceTokenCounter};
use webrag_core::config::{RagSettings, TokenizerKind};
use webrag_core::error::{Error, Result};
use webrag_core::traits::{Embedder, TextGenerator, TokenCounter};
use webrag_core::types::{Answer, Chunk, Document};
use webrag_generate::{prompt_template, Generator};
use webrag_vector::{Retriever, VectorIndex};

/// Where a single `answer` call currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Retrieving,
    Assembling,
    Generating,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Generating => "generating",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Retriever plus generator. Holds no per-question state, so one instance
/// can answer from several threads at once.
#[derive(Clone)]
pub struct RagPipeline {
    retriever: Retriever,
    generator: Generator,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, generator: Generator) -> Self {
        Self { retriever, generator }
    }

    /// Chunk, embed and index `documents`, chunking by whitespace tokens.
    pub fn from_documents(
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn TextGenerator>,
        settings: &RagSettings,
    ) -> Result<Self> {
        Self::from_documents_with_counter(documents, embedder, llm, None, settings)
    }

    /// Like [`RagPipeline::from_documents`]; `model_counter` is the embedding
    /// model's tokenizer, used when `chunking.tokenizer = "model"`.
    ///
    /// Fails with a configuration error before anything is embedded when a
    /// full-size chunk would not fit the embedder's input limit.
    pub fn from_documents_with_counter(
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn TextGenerator>,
        model_counter: Option<Arc<dyn TokenCounter>>,
        settings: &RagSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let counter = chunk_token_counter(settings, model_counter);
        check_input_limit(settings, &*counter, &*embedder)?;
        let chunks = chunk_documents(documents, settings, Some(counter))?;
        info!("Split {} documents into {} chunks", documents.len(), chunks.len());

        let index = VectorIndex::build_batched(chunks, &*embedder, settings.embedding.batch_size)?;
        let retriever = Retriever::new(Arc::new(index), embedder, settings.retrieval.k)?;
        let generator = Generator::with_template(llm, prompt_template(&settings.generation)?);
        Ok(Self::new(retriever, generator))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Answer `question` from the `k` best chunks. Errors come back exactly
    /// as the failing stage raised them; retrieval failure means the LLM is
    /// never called.
    pub fn answer(&self, question: &str) -> Result<Answer> {
        let mut stage = PipelineStage::Idle;
        match self.run(question, &mut stage) {
            Ok(answer) => {
                advance(&mut stage, PipelineStage::Done);
                Ok(answer)
            }
            Err(e) => {
                warn!(stage = %stage, kind = e.kind(), "question failed: {e}");
                advance(&mut stage, PipelineStage::Failed);
                Err(e)
            }
        }
    }

    /// The answer text alone.
    pub fn answer_text(&self, question: &str) -> Result<String> {
        Ok(self.answer(question)?.text)
    }

    fn run(&self, question: &str, stage: &mut PipelineStage) -> Result<Answer> {
        advance(stage, PipelineStage::Retrieving);
        let context = self.retriever.retrieve(question)?;

        advance(stage, PipelineStage::Assembling);
        debug!(
            chunks = context.len(),
            sources = ?context.iter().map(|c| c.source_uri.as_str()).collect::<Vec<_>>(),
            "context assembled"
        );

        advance(stage, PipelineStage::Generating);
        let text = self.generator.generate(question, &context)?;

        Ok(Answer { question: question.to_string(), context_used: context, text })
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    debug!(from = %stage, to = %next, "pipeline stage");
    *stage = next;
}

/// Counter used to measure chunk sizes. The model tokenizer is used when
/// configured and available; otherwise whitespace tokens.
pub fn chunk_token_counter(
    settings: &RagSettings,
    model_counter: Option<Arc<dyn TokenCounter>>,
) -> Arc<dyn TokenCounter> {
    match (settings.chunking.tokenizer, model_counter) {
        (TokenizerKind::Model, Some(counter)) => counter,
        (TokenizerKind::Model, None) => {
            info!("Embedding model has no local tokenizer; chunking by whitespace tokens");
            Arc::new(WhitespaceTokenCounter)
        }
        (TokenizerKind::Whitespace, _) => Arc::new(WhitespaceTokenCounter),
    }
}

/// Ensure a chunk of `chunking.max_tokens`, plus the special tokens the
/// model wraps every input in, fits within `embedder.max_len()`.
pub fn check_input_limit(
    settings: &RagSettings,
    counter: &dyn TokenCounter,
    embedder: &dyn Embedder,
) -> Result<()> {
    let max_tokens = settings.chunking.max_tokens;
    let special = counter.special_tokens();
    let limit = embedder.max_len();
    if max_tokens.saturating_add(special) > limit {
        return Err(Error::config(format!(
            "chunking.max_tokens ({max_tokens}) plus {special} special tokens exceeds the \
             {} input limit of {limit} tokens",
            embedder.model_id()
        )));
    }
    Ok(())
}

/// Split `documents` with the configured chunking parameters.
pub fn chunk_documents(
    documents: &[Document],
    settings: &RagSettings,
    model_counter: Option<Arc<dyn TokenCounter>>,
) -> Result<Vec<Chunk>> {
    if documents.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    let counter = chunk_token_counter(settings, model_counter);
    let chunking = &settings.chunking;
    let chunker = Chunker::new(chunking.max_tokens, chunking.overlap_tokens, counter)?;
    chunker.split(documents)
}
