//! Wire an [`Assistant`] from the application config.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use milesdesk_llm::{ChatModel, build_chat_model};
use milesdesk_rag::{
    DocumentSplitter, Embedder, InMemoryVectorStore, IngestProgress, IngestReport, Ingestor,
    Retriever, build_embedder,
};
use milesdesk_scraper::Fetcher;
use milesdesk_shared::{AppConfig, Result};

use crate::assistant::{Assistant, AssistantConfig};
use crate::guardrail::LlmGuardrail;
use crate::memory::ChatMemoryStore;
use crate::tools::QualificationTools;

/// Vector store filled from the configured sources.
pub struct KnowledgeBase {
    pub store: Arc<InMemoryVectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub report: IngestReport,
}

/// Fetch, split and embed every configured source into a fresh store.
#[instrument(skip_all, fields(sources = config.sources.len()))]
pub async fn ingest_knowledge(config: &AppConfig, progress: &dyn IngestProgress) -> Result<KnowledgeBase> {
    let start = Instant::now();
    let embedder = build_embedder(&config.embedding)?;
    let store = Arc::new(InMemoryVectorStore::new());
    let splitter = DocumentSplitter::new(config.rag.segment_size, config.rag.segment_overlap)?;
    let fetcher = Fetcher::from_config(&config.tools)?;

    let ingestor = Ingestor::new(splitter, embedder.clone(), store.clone(), config.embedding.batch_size);
    let report = ingestor.ingest_sources(&fetcher, &config.sources, progress).await;

    for (source, error) in &report.failures {
        warn!(source = %source.id, %error, "source not ingested");
    }
    info!(
        segments = report.total_segments(),
        failures = report.failures.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "knowledge base ready"
    );

    Ok(KnowledgeBase {
        store,
        embedder,
        report,
    })
}

/// Build the assistant with every component enabled in `config`.
///
/// 1. Chat model
/// 2. Memory (`[memory]`)
/// 3. Retrieval, ingesting the sources first (`[rag]`)
/// 4. Qualification tools (`[tools]`)
/// 5. Input guardrail (`[guardrail]`)
#[instrument(skip_all, fields(provider = %config.llm.provider, model = %config.llm.model))]
pub async fn build_assistant(config: &AppConfig, progress: &dyn IngestProgress) -> Result<Assistant> {
    config.validate()?;

    let model: Arc<dyn ChatModel> = build_chat_model(&config.llm)?;
    let mut assistant = Assistant::new(AssistantConfig::from_config(config), model.clone());

    if config.memory.enabled {
        assistant = assistant.with_memory(Arc::new(ChatMemoryStore::new(
            config.memory.max_messages,
            config.memory.max_conversations,
        )));
    }

    if config.rag.enabled {
        let kb = ingest_knowledge(config, progress).await?;
        if kb.store.is_empty() {
            warn!("no segments ingested, answers will not be augmented");
        }
        let retriever = Retriever::from_config(&config.rag, kb.embedder, kb.store);
        assistant = assistant.with_retriever(Arc::new(retriever));
    }

    if config.tools.enabled {
        assistant = assistant.with_tools(Arc::new(QualificationTools::from_config(config)?));
    }

    if config.guardrail.enabled {
        assistant = assistant.with_guardrail(Arc::new(LlmGuardrail::from_config(&config.guardrail, model)));
    }

    info!(
        memory = config.memory.enabled,
        rag = config.rag.enabled,
        tools = config.tools.enabled,
        guardrail = config.guardrail.enabled,
        "assistant ready"
    );
    Ok(assistant)
}
