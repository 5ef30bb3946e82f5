//! Retrieval augmentation over the scraped airline pages.
//!
//! This crate provides:
//! - [`DocumentSplitter`]: recursive segmenting with overlap
//! - [`Embedder`]: OpenAI and Ollama embedding backends
//! - [`InMemoryVectorStore`]: cosine-similarity search
//! - [`Ingestor`]: fetch, split, embed and store sources
//! - [`Retriever`] and [`inject`]: query-time augmentation of the user message

mod embedder;
mod ingest;
mod retriever;
mod splitter;
mod store;

#[cfg(test)]
mod test_support;

pub use embedder::{Embedder, OllamaEmbedder, OpenAiEmbedder, build_embedder};
pub use ingest::{IngestProgress, IngestReport, Ingestor, SilentProgress, SourceIngest};
pub use retriever::{Retriever, inject};
pub use splitter::DocumentSplitter;
pub use store::{EmbeddedSegment, InMemoryVectorStore, SearchHit, TextSegment, cosine_similarity};
