//! Split, embed and store scraped pages.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use milesdesk_scraper::{Fetcher, SourcePage};
use milesdesk_shared::{MilesdeskError, Result, Source};

use crate::embedder::Embedder;
use crate::splitter::DocumentSplitter;
use crate::store::{InMemoryVectorStore, TextSegment};

/// Progress callbacks for ingestion (CLI spinners, logs).
pub trait IngestProgress: Send + Sync {
    /// Called before a source is split and embedded.
    fn source_started(&self, source: &Source);
    /// Called once a source's segments are stored.
    fn source_done(&self, source: &Source, segments: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl IngestProgress for SilentProgress {
    fn source_started(&self, _source: &Source) {}
    fn source_done(&self, _source: &Source, _segments: usize) {}
}

/// Segments stored for one source.
#[derive(Debug, Clone)]
pub struct SourceIngest {
    pub source: Source,
    pub segments: usize,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub sources: Vec<SourceIngest>,
    /// Sources that could not be fetched or embedded, with the reason.
    pub failures: Vec<(Source, String)>,
}

impl IngestReport {
    pub fn total_segments(&self) -> usize {
        self.sources.iter().map(|s| s.segments).sum()
    }
}

pub struct Ingestor {
    splitter: DocumentSplitter,
    embedder: Arc<dyn Embedder>,
    store: Arc<InMemoryVectorStore>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        splitter: DocumentSplitter,
        embedder: Arc<dyn Embedder>,
        store: Arc<InMemoryVectorStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            splitter,
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Fetch every source concurrently, then ingest the pages that arrived.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn ingest_sources(
        &self,
        fetcher: &Fetcher,
        sources: &[Source],
        progress: &dyn IngestProgress,
    ) -> IngestReport {
        let fetched = fetcher.fetch_all(sources).await;
        let mut report = self.ingest(&fetched.pages, progress).await;

        let mut failures: Vec<(Source, String)> = fetched
            .failures
            .into_iter()
            .map(|f| (f.source, f.error))
            .collect();
        failures.append(&mut report.failures);
        report.failures = failures;
        report
    }

    /// Split and embed each page; a page that fails to embed is logged and skipped.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub async fn ingest(&self, pages: &[SourcePage], progress: &dyn IngestProgress) -> IngestReport {
        let mut report = IngestReport::default();

        for page in pages {
            progress.source_started(&page.source);
            match self.ingest_page(page).await {
                Ok(segments) => {
                    progress.source_done(&page.source, segments);
                    report.sources.push(SourceIngest {
                        source: page.source.clone(),
                        segments,
                    });
                }
                Err(e) => {
                    warn!(source = %page.source.id, error = %e, "ingestion failed, skipping source");
                    report.failures.push((page.source.clone(), e.to_string()));
                }
            }
        }

        info!(
            sources = report.sources.len(),
            failures = report.failures.len(),
            segments = report.total_segments(),
            stored = self.store.len(),
            "ingestion completed"
        );
        report
    }

    async fn ingest_page(&self, page: &SourcePage) -> Result<usize> {
        let title = page
            .page
            .title
            .clone()
            .unwrap_or_else(|| page.source.name.clone());

        let segments: Vec<TextSegment> = self
            .splitter
            .split(&page.page.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextSegment {
                source_url: page.page.url.clone(),
                title: title.clone(),
                airline: page.source.airline.clone(),
                text,
                index,
            })
            .collect();

        // Embed everything before storing so a failed batch leaves no partial page.
        let mut embedded = Vec::with_capacity(segments.len());
        for batch in segments.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            check_vectors(&vectors, texts.len(), self.embedder.dimensions())?;
            embedded.extend(batch.iter().cloned().zip(vectors));
        }

        let count = embedded.len();
        self.store.add_all(embedded);
        Ok(count)
    }
}

/// One vector per text, each of the embedder's declared size.
fn check_vectors(vectors: &[Vec<f32>], expected: usize, dimensions: Option<usize>) -> Result<()> {
    if vectors.len() != expected {
        return Err(MilesdeskError::Embedding(format!(
            "expected {expected} vectors, got {}",
            vectors.len()
        )));
    }
    if let Some(dimensions) = dimensions {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(MilesdeskError::Embedding(format!(
                "expected {dimensions}-dimensional vectors, got {}",
                bad.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{KeywordEmbedder, source_page};
    use std::sync::atomic::Ordering;

    fn ingestor(embedder: Arc<KeywordEmbedder>, store: Arc<InMemoryVectorStore>) -> Ingestor {
        Ingestor::new(DocumentSplitter::new(40, 0).unwrap(), embedder, store, 2)
    }

    #[tokio::test]
    async fn ingest_labels_segments_and_batches() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let store = Arc::new(InMemoryVectorStore::new());
        let pages = vec![source_page(
            "flying-blue",
            "Air France-KLM",
            "Silver needs 100 XP.\n\nGold needs 180 XP.\n\nPlatinum needs 300 XP.",
        )];

        let report = ingestor(embedder.clone(), store.clone())
            .ingest(&pages, &SilentProgress)
            .await;

        assert_eq!(report.total_segments(), 3);
        assert_eq!(store.len(), 3);
        // Three segments in batches of two.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let hits = store.search(&[0.0, 1.0, 0.0], 5, 0.5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].segment.airline, "Air France-KLM");
        assert_eq!(hits[0].segment.index, 1);
    }

    #[tokio::test]
    async fn failing_source_does_not_block_others() {
        let embedder = Arc::new(KeywordEmbedder {
            fail_on: Some("broken".into()),
            ..KeywordEmbedder::default()
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let pages = vec![
            source_page("miles-and-more", "Lufthansa Group", "This page is broken."),
            source_page("flying-blue", "Air France-KLM", "Gold needs 180 XP."),
        ];

        let report = ingestor(embedder, store.clone())
            .ingest(&pages, &SilentProgress)
            .await;

        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].source.id, "flying-blue");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0.id, "miles-and-more");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn vectors_of_unexpected_size_fail_the_source() {
        let embedder = Arc::new(KeywordEmbedder {
            declared_dimensions: Some(1536),
            ..KeywordEmbedder::default()
        });
        let store = Arc::new(InMemoryVectorStore::new());
        let pages = vec![source_page("flying-blue", "Air France-KLM", "Gold needs 180 XP.")];

        let report = ingestor(embedder, store.clone())
            .ingest(&pages, &SilentProgress)
            .await;

        assert!(report.sources.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].1.contains("1536"));
        assert!(store.is_empty());
    }
}
