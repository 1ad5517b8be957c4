use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use webrag_core::config::{EmbeddingProvider, RagSettings, TokenizerKind};
use webrag_core::error::{Error, Result};
use webrag_core::traits::{Embedder, TextGenerator, TokenCounter};
use webrag_core::types::{Document, EmbeddingVector};
use webrag_embed::FakeEmbedder;
use webrag_pipeline::{chunk_documents, RagPipeline};
use webrag_text::files;

const PROMPT_SOURCE: &str = "prompt-engineering.md";
const ATTACK_SOURCE: &str = "adv-attack-llm.md";

/// Answers from the first sentence of the documents when any question term
/// appears in them, otherwise admits it does not know. Counts its calls.
#[derive(Default)]
struct ExtractiveLlm {
    calls: AtomicUsize,
}

impl TextGenerator for ExtractiveLlm {
    fn model_id(&self) -> &str {
        "extractive"
    }

    fn generate_raw(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let question = prompt
            .split("Question: ")
            .nth(1)
            .and_then(|s| s.lines().next())
            .unwrap_or_default();
        let documents = prompt.split("Documents: ").nth(1).unwrap_or_default();
        let lowered = documents.to_lowercase();
        let grounded = question
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .filter(|w| w.len() > 3 && w != "what")
            .any(|w| lowered.contains(&w));
        if !grounded {
            return Ok("I don't know.".to_string());
        }
        let first_sentence = documents.split(". ").next().unwrap_or(documents).trim();
        Ok(format!("{first_sentence}."))
    }
}

/// Fake embedder that can be switched to fail after the index is built.
/// Counts the batches it is asked to embed.
struct SwitchableEmbedder {
    inner: FakeEmbedder,
    failing: AtomicBool,
    batches: AtomicUsize,
}

impl SwitchableEmbedder {
    fn new(inner: FakeEmbedder) -> Self {
        Self { inner, failing: AtomicBool::new(false), batches: AtomicUsize::new(0) }
    }
}

/// Whitespace tokens, plus `[CLS]`/`[SEP]` around every model input.
struct WrappedWordCounter;

impl TokenCounter for WrappedWordCounter {
    fn name(&self) -> &str {
        "wrapped-words"
    }
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
    fn special_tokens(&self) -> usize {
        2
    }
}

impl Embedder for SwitchableEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    fn max_len(&self) -> usize {
        self.inner.max_len()
    }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::embedding("embedding service unavailable"));
        }
        self.inner.embed_batch(texts)
    }
}

fn fixtures() -> Vec<Document> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    files::load_dir(&dir).expect("fixtures")
}

fn settings() -> RagSettings {
    let mut settings = RagSettings::default();
    settings.chunking.max_tokens = 60;
    settings.chunking.tokenizer = TokenizerKind::Whitespace;
    settings.embedding.provider = EmbeddingProvider::Fake;
    settings.embedding.dimensions = 512;
    settings.embedding.batch_size = 8;
    settings
}

fn source_name(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

fn build(llm: Arc<ExtractiveLlm>) -> RagPipeline {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(512));
    RagPipeline::from_documents(&fixtures(), embedder, llm, &settings()).expect("pipeline")
}

#[test]
fn fixtures_chunk_within_budget() {
    let chunks = chunk_documents(&fixtures(), &settings(), None).expect("chunks");
    assert_eq!(chunks.len(), 18);
    assert!(chunks.iter().all(|c| c.text.split_whitespace().count() <= 60));
}

#[test]
fn prompt_engineering_question_is_grounded_in_its_article() {
    let llm = Arc::new(ExtractiveLlm::default());
    let pipeline = build(llm.clone());

    let answer = pipeline.answer("What is prompt engineering?").expect("answer");
    assert_eq!(answer.question, "What is prompt engineering?");
    assert_eq!(answer.context_used.len(), 4);
    assert_eq!(source_name(&answer.context_used[0].source_uri), PROMPT_SOURCE);
    let from_article = answer
        .context_used
        .iter()
        .filter(|c| source_name(&c.source_uri) == PROMPT_SOURCE)
        .count();
    assert!(from_article >= 3, "only {from_article} of 4 chunks from the prompt article");

    assert!(!answer.text.trim().is_empty());
    assert!(answer.text.matches(". ").count() < 3, "at most three sentences: {}", answer.text);
    assert!(answer.text.to_lowercase().contains("prompt"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn attack_question_retrieves_attack_article() {
    let pipeline = build(Arc::new(ExtractiveLlm::default()));
    let chunks =
        pipeline.retriever().retrieve("What are types of attacks on LLMs?").expect("retrieve");
    assert_eq!(source_name(&chunks[0].source_uri), ATTACK_SOURCE);
    let from_article =
        chunks.iter().filter(|c| source_name(&c.source_uri) == ATTACK_SOURCE).count();
    assert!(from_article >= 3);
}

#[test]
fn unrelated_question_yields_uncertainty() {
    let pipeline = build(Arc::new(ExtractiveLlm::default()));
    let answer = pipeline.answer_text("What is the square root of pi?").expect("answer");
    assert!(answer.contains("don't know"));
}

#[test]
fn answers_are_deterministic() {
    let pipeline = build(Arc::new(ExtractiveLlm::default()));
    let first = pipeline.answer("What is prompt engineering?").expect("first");
    let second = pipeline.answer("What is prompt engineering?").expect("second");
    assert_eq!(first, second);
}

#[test]
fn retrieval_failure_skips_generation() {
    let embedder = Arc::new(SwitchableEmbedder::new(FakeEmbedder::new(512)));
    let llm = Arc::new(ExtractiveLlm::default());
    let pipeline =
        RagPipeline::from_documents(&fixtures(), embedder.clone(), llm.clone(), &settings())
            .expect("pipeline");

    embedder.failing.store(true, Ordering::SeqCst);
    let err = pipeline.answer("What is prompt engineering?").expect_err("must fail");
    assert_eq!(err.to_string(), "embedding failed: embedding service unavailable");
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_corpus_is_rejected() {
    let llm = Arc::new(ExtractiveLlm::default());
    let embedder = Arc::new(FakeEmbedder::new(8));
    let err = RagPipeline::from_documents(&[], embedder.clone(), llm.clone(), &settings())
        .err()
        .expect("must fail");
    assert!(matches!(err, Error::EmptyCorpus));

    let blank = [Document::new("mem://blank", "  \n\n ")];
    let err = RagPipeline::from_documents(&blank, embedder, llm, &settings())
        .err()
        .expect("must fail");
    assert!(matches!(err, Error::EmptyCorpus));
}

#[test]
fn invalid_settings_are_rejected_before_indexing() {
    let mut bad = settings();
    bad.chunking.overlap_tokens = 60;
    let embedder = Arc::new(FakeEmbedder::new(8));
    let llm = Arc::new(ExtractiveLlm::default());
    let err = RagPipeline::from_documents(&fixtures(), embedder, llm, &bad)
        .err()
        .expect("must fail");
    assert_eq!(err.kind(), "ConfigurationError");
}

#[test]
fn chunk_budget_above_embedder_limit_fails_before_embedding() {
    let embedder = Arc::new(SwitchableEmbedder::new(FakeEmbedder::new(512).with_max_len(50)));
    let llm = Arc::new(ExtractiveLlm::default());
    let err = RagPipeline::from_documents(&fixtures(), embedder.clone(), llm, &settings())
        .err()
        .expect("must fail");
    assert_eq!(err.kind(), "ConfigurationError");
    assert!(err.to_string().contains("input limit of 50 tokens"), "{err}");
    assert_eq!(embedder.batches.load(Ordering::SeqCst), 0);
}

#[test]
fn special_tokens_count_against_embedder_limit() {
    let mut settings = settings();
    settings.chunking.tokenizer = TokenizerKind::Model;
    let counter: Arc<dyn TokenCounter> = Arc::new(WrappedWordCounter);
    let build_with_limit = |max_len: usize| {
        let embedder = Arc::new(FakeEmbedder::new(512).with_max_len(max_len));
        let llm = Arc::new(ExtractiveLlm::default());
        RagPipeline::from_documents_with_counter(
            &fixtures(),
            embedder,
            llm,
            Some(counter.clone()),
            &settings,
        )
    };

    // 60 content tokens fit a 61-token model only without [CLS] and [SEP].
    let err = build_with_limit(61).err().expect("must fail");
    assert_eq!(err.kind(), "ConfigurationError");
    assert!(err.to_string().contains("plus 2 special tokens"), "{err}");

    let pipeline = build_with_limit(62).expect("pipeline");
    assert_eq!(pipeline.retriever().index().len(), 18);
}
