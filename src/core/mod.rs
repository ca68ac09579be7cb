//! Document processing primitives: PDF extraction, chunking, relevance.

pub mod chunking;
pub mod pdf;
pub mod relevance;

pub use chunking::{Chunk, chunk_text, chunk_with_pages};
pub use relevance::{ScoredChunk, cosine_similarity, embedding_top_k, token_overlap_top_k};
