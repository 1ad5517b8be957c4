use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use webrag_core::config::RagSettings;
use webrag_core::traits::TokenCounter;
use webrag_core::types::{Chunk, Document};
use webrag_embed::get_default_embedder;
use webrag_generate::get_default_generator;
use webrag_pipeline::{check_input_limit, chunk_documents, chunk_token_counter, RagPipeline};
use webrag_text::load_documents;
use webrag_vector::{Retriever, VectorIndex};

use crate::cli::DEMO_QUESTIONS;

fn load_corpus(settings: &RagSettings) -> Result<Vec<Document>> {
    let documents = load_documents(&settings.ingestion)?;
    info!("Loaded {} documents", documents.len());
    Ok(documents)
}

pub fn ask(settings: &RagSettings, questions: &[String], out: &mut impl Write) -> Result<()> {
    let documents = load_corpus(settings)?;
    let loaded = get_default_embedder(&settings.embedding)?;
    let llm = get_default_generator(&settings.generation)?;
    let pipeline = RagPipeline::from_documents_with_counter(
        &documents,
        loaded.embedder,
        llm,
        loaded.token_counter,
        settings,
    )?;

    let questions: Vec<String> = if questions.is_empty() {
        DEMO_QUESTIONS.iter().map(ToString::to_string).collect()
    } else {
        questions.to_vec()
    };
    for question in &questions {
        let answer = pipeline.answer_text(question)?;
        writeln!(out, "Question: {question}")?;
        writeln!(out, "Answer: {}", answer.trim_end())?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn search(settings: &RagSettings, query: &str, out: &mut impl Write) -> Result<()> {
    let documents = load_corpus(settings)?;
    let loaded = get_default_embedder(&settings.embedding)?;
    let counter = chunk_token_counter(settings, loaded.token_counter);
    check_input_limit(settings, &*counter, &*loaded.embedder)?;
    let chunks = chunk_documents(&documents, settings, Some(counter))?;
    let batch_size = settings.embedding.batch_size;
    let index = VectorIndex::build_batched(chunks, &*loaded.embedder, batch_size)?;
    let retriever = Retriever::new(Arc::new(index), loaded.embedder, settings.retrieval.k)?;

    let result = retriever.search(query, settings.retrieval.k)?;
    for (rank, hit) in result.hits.iter().enumerate() {
        writeln!(
            out,
            "{}. [{:.4}] {} #{}",
            rank + 1,
            hit.score,
            hit.chunk.source_uri,
            hit.chunk.sequence_index
        )?;
        writeln!(out, "   {}", preview(&hit.chunk.text, 200))?;
    }
    Ok(())
}

pub fn chunks(settings: &RagSettings, out: &mut impl Write) -> Result<()> {
    let documents = load_corpus(settings)?;
    let loaded = get_default_embedder(&settings.embedding)?;
    let counter = chunk_token_counter(settings, loaded.token_counter);
    let chunks = chunk_documents(&documents, settings, Some(counter.clone()))?;

    writeln!(
        out,
        "{} documents, {} chunks (max {} tokens, overlap {}, counted by {})",
        documents.len(),
        chunks.len(),
        settings.chunking.max_tokens,
        settings.chunking.overlap_tokens,
        counter.name()
    )?;
    for (source, stats) in chunk_stats(&chunks, |text| counter.count_tokens(text)) {
        writeln!(
            out,
            "{source}: {} chunks, tokens min {} / mean {:.1} / max {}",
            stats.count, stats.min, stats.mean, stats.max
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStats {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

/// Per-source chunk counts and token statistics, keyed by source URI.
pub fn chunk_stats(
    chunks: &[Chunk],
    count_tokens: impl Fn(&str) -> usize,
) -> BTreeMap<String, ChunkStats> {
    let mut sizes: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for chunk in chunks {
        sizes.entry(chunk.source_uri.clone()).or_default().push(count_tokens(&chunk.text));
    }
    sizes
        .into_iter()
        .map(|(source, sizes)| {
            let total: usize = sizes.iter().sum();
            let stats = ChunkStats {
                count: sizes.len(),
                min: sizes.iter().copied().min().unwrap_or(0),
                max: sizes.iter().copied().max().unwrap_or(0),
                mean: total as f64 / sizes.len() as f64,
            };
            (source, stats)
        })
        .collect()
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
