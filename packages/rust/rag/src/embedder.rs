//! Embedding backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use milesdesk_shared::{EmbeddingConfig, MilesdeskError, ModelProvider, Result, resolve_api_key};

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the output has one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector size, when known for the configured model.
    fn dimensions(&self) -> Option<usize>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MilesdeskError::Embedding("empty embedding response".into()))
    }
}

/// Known output sizes for common embedding models.
fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        _ => None,
    }
}

fn check_count(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(MilesdeskError::Embedding(format!(
            "expected {expected} embeddings, got {got}"
        )));
    }
    Ok(())
}

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MilesdeskError::Embedding(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// OpenAI-compatible `POST {base}/embeddings`.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip_all, fields(model = %self.model, batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| MilesdeskError::Embedding(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MilesdeskError::Embedding(format!(
                "OpenAI API error ({status}): {}",
                body.chars().take(500).collect::<String>()
            )));
        }

        let mut parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MilesdeskError::Embedding(format!("failed to parse response: {e}")))?;

        check_count(texts.len(), parsed.data.len())?;
        parsed.data.sort_by_key(|d| d.index);
        debug!(count = parsed.data.len(), "embeddings received");

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        known_dimensions(&self.model)
    }
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

/// Ollama `POST {base}/api/embed`.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip_all, fields(model = %self.model, batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| MilesdeskError::Embedding(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MilesdeskError::Embedding(format!(
                "Ollama API error ({status}): {}",
                body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| MilesdeskError::Embedding(format!("failed to parse response: {e}")))?;

        check_count(texts.len(), parsed.embeddings.len())?;
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> Option<usize> {
        known_dimensions(&self.model)
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the embedding backend selected by `[embedding]`.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let base_url = config.effective_base_url();
    let timeout = Duration::from_secs(config.timeout_secs);
    let api_key = if config.provider.requires_api_key() {
        resolve_api_key(&config.api_key_env)?
    } else {
        String::new()
    };

    let embedder: Arc<dyn Embedder> = match config.provider {
        ModelProvider::OpenAi => Arc::new(OpenAiEmbedder::new(api_key, &base_url, &config.model, timeout)?),
        ModelProvider::Ollama => Arc::new(OllamaEmbedder::new(&base_url, &config.model, timeout)?),
    };

    info!(provider = %config.provider, model = %config.model, "embedder ready");
    Ok(embedder)
}
