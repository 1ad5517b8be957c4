use std::path::Path;

use candle_core::{Device, Tensor};
use tokenizers::{PostProcessor, Tokenizer};

use webrag_core::error::{Error, Result};
use webrag_core::traits::TokenCounter;

/// Load a `tokenizer.json` with truncation and padding disabled, so lengths
/// are reported faithfully and padding is applied per batch.
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
        Error::embedding(format!("failed to load tokenizer from {}: {e}", path.display()))
    })?;
    tokenizer
        .with_truncation(None)
        .map_err(|e| Error::embedding(format!("failed to disable truncation: {e}")))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Counts tokens with a HuggingFace tokenizer, special tokens excluded.
/// The number the post-processor adds per input is reported separately.
#[derive(Clone)]
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
    name: String,
    special_tokens: usize,
}

impl HfTokenCounter {
    pub fn new(tokenizer: Tokenizer, name: impl Into<String>) -> Self {
        let special_tokens = tokenizer.get_post_processor().map_or(0, |pp| pp.added_tokens(false));
        Self { tokenizer, name: name.into(), special_tokens }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(load_tokenizer(path)?, path.display().to_string()))
    }
}

impl TokenCounter for HfTokenCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn count_tokens(&self, text: &str) -> usize {
        // Unencodable text counts as over any budget so it keeps being split.
        self.tokenizer.encode(text, false).map_or(usize::MAX, |enc| enc.get_ids().len())
    }

    fn special_tokens(&self) -> usize {
        self.special_tokens
    }
}

/// Token ids and attention mask for a batch, right-padded to the longest
/// sequence. Fails if any sequence exceeds `max_len` tokens.
pub fn encode_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| Error::embedding(format!("tokenization failed: {e}")))?;

    let mut longest = 0;
    for (i, enc) in encodings.iter().enumerate() {
        let n = enc.get_ids().len();
        if n > max_len {
            return Err(Error::embedding(format!(
                "input {i} is {n} tokens long, model accepts at most {max_len}"
            )));
        }
        longest = longest.max(n);
    }

    let batch = encodings.len();
    let mut ids = Vec::with_capacity(batch * longest);
    let mut mask = Vec::with_capacity(batch * longest);
    for enc in &encodings {
        let n = enc.get_ids().len();
        ids.extend_from_slice(enc.get_ids());
        ids.extend(std::iter::repeat(pad_id).take(longest - n));
        mask.extend(std::iter::repeat(1u32).take(n));
        mask.extend(std::iter::repeat(0u32).take(longest - n));
    }

    let to_err =
        |e: candle_core::Error| Error::embedding(format!("tensor construction failed: {e}"));
    let input_ids = Tensor::from_vec(ids, (batch, longest), device).map_err(to_err)?;
    let attention_mask = Tensor::from_vec(mask, (batch, longest), device).map_err(to_err)?;
    Ok((input_ids, attention_mask))
}

/// Length check for embedders without a local tokenizer: each input may hold
/// at most `max_len` whitespace-delimited words.
pub(crate) fn check_word_lengths(texts: &[String], max_len: usize) -> Result<()> {
    for (i, text) in texts.iter().enumerate() {
        let words = text.split_whitespace().count();
        if words > max_len {
            return Err(Error::embedding(format!(
                "input {i} is {words} tokens long, model accepts at most {max_len}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;
    use tokenizers::processors::template::TemplateProcessing;
    use webrag_core::chunker::Chunker;
    use webrag_core::types::Document;

    use super::*;

    const PAD: u32 = 0;
    const CLS: u32 = 1;
    const SEP: u32 = 2;

    /// Word-level tokenizer over a tiny vocabulary that wraps every input
    /// in `[CLS] ... [SEP]`, like the BERT family does.
    fn bert_like_tokenizer() -> Tokenizer {
        let words = ["[PAD]", "[CLS]", "[SEP]", "[UNK]", "a", "b", "c", "."];
        let vocab: HashMap<String, u32> =
            words.iter().zip(0u32..).map(|(w, id)| ((*w).to_string(), id)).collect();
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .unwrap();
        let template = TemplateProcessing::builder()
            .try_single("[CLS] $A [SEP]")
            .unwrap()
            .special_tokens(vec![("[CLS]", CLS), ("[SEP]", SEP)])
            .build()
            .unwrap();
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(Whitespace);
        tokenizer.with_post_processor(template);
        tokenizer
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn pads_right_and_masks_padding() {
        let tokenizer = bert_like_tokenizer();
        let (ids, mask) =
            encode_batch(&tokenizer, &texts(&["a b", "c"]), 8, PAD, &Device::Cpu).unwrap();
        assert_eq!(ids.dims(), &[2, 4]);
        assert_eq!(
            ids.to_vec2::<u32>().unwrap(),
            vec![vec![CLS, 4, 5, SEP], vec![CLS, 6, SEP, PAD]]
        );
        assert_eq!(mask.to_vec2::<u32>().unwrap(), vec![vec![1, 1, 1, 1], vec![1, 1, 1, 0]]);
    }

    #[test]
    fn over_length_input_is_embedding_error() {
        let tokenizer = bert_like_tokenizer();
        // Four words become six ids once [CLS] and [SEP] are added.
        let err = encode_batch(&tokenizer, &texts(&["a", "a b a b"]), 4, PAD, &Device::Cpu)
            .unwrap_err();
        assert_eq!(err.kind(), "EmbeddingError");
        assert!(err.to_string().contains("input 1 is 6 tokens long"), "{err}");
    }

    #[test]
    fn counter_reports_special_tokens_separately() {
        let counter = HfTokenCounter::new(bert_like_tokenizer(), "test");
        assert_eq!(counter.count_tokens("a b a"), 3);
        assert_eq!(counter.special_tokens(), 2);
        assert_eq!(counter.name(), "test");
    }

    #[test]
    fn unknown_words_still_count() {
        let counter = HfTokenCounter::new(bert_like_tokenizer(), "test");
        assert_eq!(counter.count_tokens("a zebra b"), 3);
    }

    #[test]
    fn chunks_from_model_counter_fit_the_model() {
        let tokenizer = bert_like_tokenizer();
        let counter = Arc::new(HfTokenCounter::new(tokenizer.clone(), "test"));
        let max_tokens = 5;
        let chunker = Chunker::new(max_tokens, 1, counter.clone()).unwrap();
        let text = "a b c a b c a. b c a b c.\n\nc c c c c c c c c c c c c\na b\n\na";
        let chunks = chunker.split(&[Document::new("mem://a", text)]).unwrap();
        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(counter.count_tokens(&chunk.text) <= max_tokens, "{:?}", chunk.text);
        }
        let model_len = max_tokens + counter.special_tokens();
        let batch: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        encode_batch(&tokenizer, &batch, model_len, PAD, &Device::Cpu).unwrap();
    }

    #[test]
    fn word_limit_names_the_offending_input() {
        assert!(check_word_lengths(&texts(&["a b", "c"]), 2).is_ok());
        let err = check_word_lengths(&texts(&["a", "a b c"]), 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "embedding failed: input 1 is 3 tokens long, model accepts at most 2"
        );
    }
}
