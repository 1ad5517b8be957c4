//! Token-aware recursive splitter.
//!
//! Text is cut at the coarsest boundary that keeps pieces under the token
//! budget: paragraphs first, then lines, sentences, words and finally single
//! characters. Neighbouring pieces are merged greedily back up to the budget.
//! Every emitted chunk is a trimmed, contiguous slice of its document.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::TokenCounter;
use crate::types::{Chunk, Document};

/// Counts whitespace-delimited units.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

const LEVELS: [Boundary; 5] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
    Boundary::Character,
];

impl Boundary {
    /// Cut `text[range]` into consecutive ranges that cover it exactly.
    /// Separators stay attached to the end of the preceding piece.
    fn pieces(self, text: &str, range: Range<usize>) -> Vec<Range<usize>> {
        let slice = &text[range.clone()];
        let cuts: Vec<usize> = match self {
            Boundary::Paragraph => {
                slice.match_indices("\n\n").map(|(i, sep)| i + sep.len()).collect()
            }
            Boundary::Line => slice.match_indices('\n').map(|(i, _)| i + 1).collect(),
            Boundary::Sentence => {
                let mut cuts = Vec::new();
                let mut chars = slice.char_indices().peekable();
                while let Some((_, c)) = chars.next() {
                    if matches!(c, '.' | '!' | '?') {
                        if let Some(&(j, next)) = chars.peek() {
                            if next.is_whitespace() {
                                cuts.push(j + next.len_utf8());
                            }
                        }
                    }
                }
                cuts
            }
            Boundary::Word => slice
                .char_indices()
                .filter(|(_, c)| c.is_whitespace())
                .map(|(i, c)| i + c.len_utf8())
                .collect(),
            Boundary::Character => slice.char_indices().skip(1).map(|(i, _)| i).collect(),
        };

        let mut out = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for cut in cuts {
            if cut > start && cut < slice.len() {
                out.push(range.start + start..range.start + cut);
                start = cut;
            }
        }
        if start < slice.len() {
            out.push(range.start + start..range.end);
        }
        out
    }
}

/// Splits documents into chunks of at most `max_tokens` tokens.
pub struct Chunker {
    max_tokens: usize,
    overlap_tokens: usize,
    counter: Arc<dyn TokenCounter>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("max_tokens", &self.max_tokens)
            .field("overlap_tokens", &self.overlap_tokens)
            .field("counter", &self.counter.name())
            .finish()
    }
}

impl Chunker {
    pub fn new(
        max_tokens: usize,
        overlap_tokens: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self> {
        if max_tokens == 0 {
            return Err(Error::config("chunk max_tokens must be greater than zero"));
        }
        if overlap_tokens >= max_tokens {
            return Err(Error::config(format!(
                "chunk overlap_tokens ({overlap_tokens}) must be smaller than \
                 max_tokens ({max_tokens})"
            )));
        }
        Ok(Self { max_tokens, overlap_tokens, counter })
    }

    #[must_use]
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    #[must_use]
    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    #[must_use]
    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Chunk every document in order. Chunks never cross document boundaries
    /// and `sequence_index` restarts at 0 for each document.
    pub fn split(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for doc in documents {
            let pieces = self.split_text(&doc.raw_text)?;
            debug!(source = %doc.source_uri, chunks = pieces.len(), "split document");
            chunks.extend(pieces.into_iter().enumerate().map(|(sequence_index, text)| Chunk {
                text: text.to_string(),
                source_uri: doc.source_uri.clone(),
                sequence_index,
            }));
        }
        Ok(chunks)
    }

    /// Split a single text into trimmed slices of at most `max_tokens` tokens.
    pub fn split_text<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        let mut ranges = Vec::new();
        self.split_range(text, 0..text.len(), 0, &mut ranges)?;
        Ok(ranges.into_iter().map(|r| &text[r]).collect())
    }

    fn tokens(&self, text: &str, range: Range<usize>) -> usize {
        self.counter.count_tokens(text[range].trim())
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        level: usize,
        out: &mut Vec<Range<usize>>,
    ) -> Result<()> {
        let boundary = LEVELS[level];
        let mut window: VecDeque<Range<usize>> = VecDeque::new();
        // Window holds pieces that were not part of any emitted chunk yet.
        let mut pending = false;

        for piece in boundary.pieces(text, range) {
            if self.tokens(text, piece.clone()) > self.max_tokens {
                // Overlap does not cross into or out of a piece that is split
                // at a finer level: both neighbouring chunks start fresh.
                if pending {
                    emit(text, span(&window), out);
                }
                window.clear();
                pending = false;
                if level + 1 == LEVELS.len() {
                    return Err(Error::config(format!(
                        "chunk max_tokens ({}) is too small to hold the character {:?}",
                        self.max_tokens,
                        &text[piece]
                    )));
                }
                self.split_range(text, piece, level + 1, out)?;
                continue;
            }

            if let Some(start) = window.front().map(|r| r.start) {
                if self.tokens(text, start..piece.end) > self.max_tokens {
                    if pending {
                        emit(text, span(&window), out);
                        pending = false;
                    }
                    self.keep_overlap(text, &mut window, piece.end);
                }
            }
            window.push_back(piece);
            pending = true;
        }

        if pending {
            emit(text, span(&window), out);
        }
        Ok(())
    }

    /// Drop leading pieces until what remains fits the overlap budget and
    /// still leaves room for the piece ending at `next_end`.
    fn keep_overlap(&self, text: &str, window: &mut VecDeque<Range<usize>>, next_end: usize) {
        while let Some(start) = window.front().map(|r| r.start) {
            let end = window.back().map_or(start, |r| r.end);
            if self.overlap_tokens > 0
                && self.tokens(text, start..end) <= self.overlap_tokens
                && self.tokens(text, start..next_end) <= self.max_tokens
            {
                break;
            }
            window.pop_front();
        }
    }
}

fn span(window: &VecDeque<Range<usize>>) -> Range<usize> {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => first.start..last.end,
        _ => 0..0,
    }
}

fn emit(text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = range.start + (slice.len() - slice.trim_start().len());
    let trimmed = start..start + trimmed.len();
    // A trailing whitespace piece after an overlap tail would re-emit a suffix
    // of the previous chunk.
    if let Some(last) = out.last() {
        if last.start <= trimmed.start && trimmed.end <= last.end {
            return;
        }
    }
    out.push(trimmed);
}

/// Split `documents` with a freshly validated chunker.
pub fn split(
    documents: &[Document],
    max_tokens: usize,
    overlap_tokens: usize,
    counter: Arc<dyn TokenCounter>,
) -> Result<Vec<Chunk>> {
    Chunker::new(max_tokens, overlap_tokens, counter)?.split(documents)
}
