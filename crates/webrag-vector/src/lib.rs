//! Exact in-memory vector index and the retriever built on it.

pub mod index;
pub mod retriever;

pub use index::VectorIndex;
pub use retriever::Retriever;
