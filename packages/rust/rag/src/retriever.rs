//! Query-time retrieval and prompt augmentation.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, instrument};

use milesdesk_shared::{RagConfig, Result};

use crate::embedder::Embedder;
use crate::store::{InMemoryVectorStore, SearchHit};

/// Finds stored segments relevant to a question.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<InMemoryVectorStore>,
    max_results: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<InMemoryVectorStore>,
        max_results: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            max_results,
            min_score,
        }
    }

    /// Build a retriever using the `[rag]` limits.
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<InMemoryVectorStore>,
    ) -> Self {
        Self::new(embedder, store, config.max_results, config.min_score)
    }

    /// Embed `query` and return the best-scoring segments.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>> {
        if self.store.is_empty() {
            debug!("vector store is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed_query(query).await?;
        let hits = self.store.search(&vector, self.max_results, self.min_score);

        debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score).unwrap_or(0.0),
            "retrieval complete"
        );
        Ok(hits)
    }

    /// Retrieve for `question` and inject the hits into it.
    pub async fn augment(&self, question: &str) -> Result<String> {
        let hits = self.retrieve(question).await?;
        Ok(inject(question, &hits))
    }
}

/// Append retrieved snippets to the user's question.
///
/// Returns the question unchanged when there are no hits.
pub fn inject(question: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return question.to_string();
    }

    let mut prompt = format!("{question}\n\nAnswer using the following information:\n");
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            prompt.push_str("\n\n");
        }
        let segment = &hit.segment;
        let _ = write!(prompt, "[{}: {}]\n{}", segment.airline, segment.title, segment.text);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TextSegment;
    use crate::test_support::KeywordEmbedder;

    fn hit(airline: &str, title: &str, text: &str, score: f32) -> SearchHit {
        SearchHit {
            segment: Arc::new(TextSegment {
                source_url: "https://example.com".into(),
                title: title.into(),
                airline: airline.into(),
                text: text.into(),
                index: 0,
            }),
            score,
        }
    }

    #[test]
    fn inject_without_hits_returns_question() {
        assert_eq!(inject("How do I get Gold?", &[]), "How do I get Gold?");
    }

    #[test]
    fn inject_formats_snippets() {
        let hits = vec![
            hit("Air France-KLM", "How to qualify", "Gold needs 180 XP.", 0.9),
            hit("Lufthansa Group", "Status", "Senator needs 130,000 miles.", 0.8),
        ];
        let prompt = inject("Compare gold tiers", &hits);
        assert_eq!(
            prompt,
            "Compare gold tiers\n\nAnswer using the following information:\n\
             [Air France-KLM: How to qualify]\nGold needs 180 XP.\n\n\
             [Lufthansa Group: Status]\nSenator needs 130,000 miles."
        );
    }

    #[tokio::test]
    async fn retrieve_applies_threshold() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let store = Arc::new(InMemoryVectorStore::new());
        store.add((*hit("A", "t", "gold", 0.0).segment).clone(), vec![0.0, 1.0, 0.0]);
        store.add((*hit("A", "t", "platinum", 0.0).segment).clone(), vec![0.0, 0.0, 1.0]);

        let retriever = Retriever::new(embedder, store, 5, 0.6);
        let hits = retriever.retrieve("what about gold?").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].segment.text, "gold");

        let augmented = retriever.augment("what about gold?").await.unwrap();
        assert!(augmented.starts_with("what about gold?\n\nAnswer using the following information:\n"));
    }

    #[tokio::test]
    async fn retrieve_on_empty_store_skips_embedding() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let retriever = Retriever::new(embedder.clone(), Arc::new(InMemoryVectorStore::new()), 5, 0.6);

        assert!(retriever.retrieve("gold").await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
