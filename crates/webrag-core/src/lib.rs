//! webrag-core
//!
//! Data model, error taxonomy, capability traits, configuration and the
//! token-aware chunker shared by every other webrag crate.
#![deny(unsafe_code)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, WhitespaceTokenCounter};
pub use error::{Error, Result};
pub use traits::{Embedder, TextGenerator, TokenCounter};
pub use types::{
    Answer, Chunk, Document, EmbeddingVector, IndexedChunk, RetrievalResult, ScoredChunk,
};
