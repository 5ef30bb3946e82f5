//! In-memory vector store with cosine similarity search.

use std::sync::{Arc, RwLock};

use serde::Serialize;

/// A piece of a scraped page, labelled with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    pub source_url: String,
    pub title: String,
    /// Airline the page belongs to, e.g. `Air France-KLM`.
    pub airline: String,
    pub text: String,
    /// Position of this segment within its page.
    pub index: usize,
}

/// A segment together with its embedding.
#[derive(Debug, Clone)]
pub struct EmbeddedSegment {
    pub segment: Arc<TextSegment>,
    pub vector: Vec<f32>,
}

/// A search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub segment: Arc<TextSegment>,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Calculate cosine similarity between two embeddings.
///
/// Returns 0.0 for vectors of different length or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        0.0
    } else {
        dot_product / (magnitude_a * magnitude_b)
    }
}

/// Process-local embedding store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<EmbeddedSegment>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, segment: TextSegment, vector: Vec<f32>) {
        self.add_all(std::iter::once((segment, vector)));
    }

    pub fn add_all(&self, items: impl IntoIterator<Item = (TextSegment, Vec<f32>)>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.extend(items.into_iter().map(|(segment, vector)| EmbeddedSegment {
            segment: Arc::new(segment),
            vector,
        }));
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best matches for `query`, highest score first.
    ///
    /// Hits scoring below `min_score` are dropped and at most `max_results`
    /// are returned.
    pub fn search(&self, query: &[f32], max_results: usize, min_score: f32) -> Vec<SearchHit> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                segment: Arc::clone(&entry.segment),
                score: cosine_similarity(query, &entry.vector),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(max_results);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> TextSegment {
        TextSegment {
            source_url: "https://example.com".into(),
            title: "Status".into(),
            airline: "Test Air".into(),
            text: text.into(),
            index: 0,
        }
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn search_sorts_filters_and_truncates() {
        let store = InMemoryVectorStore::new();
        store.add(segment("exact"), vec![1.0, 0.0]);
        store.add(segment("close"), vec![0.9, 0.1]);
        store.add(segment("far"), vec![0.0, 1.0]);
        store.add(segment("near"), vec![0.7, 0.3]);
        assert_eq!(store.len(), 4);

        let hits = store.search(&[1.0, 0.0], 5, 0.6);
        let texts: Vec<&str> = hits.iter().map(|h| h.segment.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "close", "near"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        let top = store.search(&[1.0, 0.0], 2, 0.6);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].segment.text, "exact");
    }

    #[test]
    fn search_on_empty_store() {
        let store = InMemoryVectorStore::new();
        assert!(store.is_empty());
        assert!(store.search(&[1.0], 5, 0.0).is_empty());
    }
}
