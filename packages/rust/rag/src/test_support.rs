//! Test doubles shared by this crate's tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use milesdesk_scraper::{FetchedPage, SourcePage};
use milesdesk_shared::{MilesdeskError, Result, Source};

use crate::embedder::Embedder;

/// Embeds text as `[silver, gold, platinum]` keyword flags.
#[derive(Default)]
pub(crate) struct KeywordEmbedder {
    pub calls: AtomicUsize,
    /// Fail any batch containing this substring.
    pub fail_on: Option<String>,
    /// Reported vector size, when it should disagree with the real one.
    pub declared_dimensions: Option<usize>,
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_on {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(MilesdeskError::Embedding("mock failure".into()));
            }
        }

        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                ["silver", "gold", "platinum"]
                    .iter()
                    .map(|k| if t.contains(*k) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.declared_dimensions.unwrap_or(3))
    }
}

pub(crate) fn source_page(id: &str, airline: &str, text: &str) -> SourcePage {
    let url = format!("https://example.com/{id}");
    SourcePage {
        source: Source {
            id: id.into(),
            airline: airline.into(),
            name: id.into(),
            url: url.clone(),
        },
        page: FetchedPage {
            url,
            title: Some(format!("{id} status")),
            html: String::new(),
            text: text.into(),
            content_hash: String::new(),
            fetched_at: Utc::now(),
            status_code: 200,
        },
    }
}
