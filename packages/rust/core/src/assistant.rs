//! The assistant facade: guardrail, memory, retrieval, tool loop.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use milesdesk_llm::{ChatMessage, ChatModel, ChatRequest, ToolSpec};
use milesdesk_rag::Retriever;
use milesdesk_shared::{AppConfig, MemoryId, MilesdeskError, Result};

use crate::guardrail::{GuardrailOutcome, InputGuardrail};
use crate::memory::ChatMemoryStore;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::tools::ToolBox;

/// Per-request behaviour of the [`Assistant`].
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub system_prompt: String,
    pub temperature: Option<f32>,
    /// Model round-trips that may be spent on tool calls per question.
    pub max_tool_rounds: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            max_tool_rounds: 5,
        }
    }
}

impl AssistantConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            system_prompt: config
                .llm
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: Some(config.llm.temperature),
            max_tool_rounds: config.tools.max_rounds,
        }
    }
}

/// Outcome of [`Assistant::answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answered { text: String },
    /// The guardrail refused the question.
    Rejected { message: String },
}

impl Reply {
    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Answered { text } => text,
            Self::Rejected { message } => message,
        }
    }
}

/// Answers questions with a chat model, optionally backed by memory,
/// retrieval, tools and an input guardrail.
pub struct Assistant {
    config: AssistantConfig,
    model: Arc<dyn ChatModel>,
    memory: Option<Arc<ChatMemoryStore>>,
    retriever: Option<Arc<Retriever>>,
    tools: Option<Arc<dyn ToolBox>>,
    guardrail: Option<Arc<dyn InputGuardrail>>,
}

impl Assistant {
    pub fn new(config: AssistantConfig, model: Arc<dyn ChatModel>) -> Self {
        Self {
            config,
            model,
            memory: None,
            retriever: None,
            tools: None,
            guardrail: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<ChatMemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolBox>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn InputGuardrail>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    /// Answer `question` within the conversation `memory_id`.
    ///
    /// 1. Reject blank input
    /// 2. Run the guardrail (short-circuits with [`Reply::Rejected`])
    /// 3. Load the conversation history
    /// 4. Augment the question with retrieved snippets
    /// 5. Call the model, executing requested tools up to `max_tool_rounds`
    /// 6. Store the original question and the final answer
    #[instrument(skip_all, fields(memory_id = %memory_id, provider = self.model.provider_name()))]
    pub async fn answer(&self, memory_id: &MemoryId, question: &str) -> Result<Reply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(MilesdeskError::validation("question must not be empty"));
        }

        if let Some(guardrail) = &self.guardrail {
            if let GuardrailOutcome::Rejected { message } = guardrail.validate(question).await {
                info!("question rejected by guardrail");
                return Ok(Reply::Rejected { message });
            }
        }

        let history = match &self.memory {
            Some(memory) => memory.history(memory_id).await,
            None => Vec::new(),
        };

        let user_message = self.augment(question).await;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(&self.config.system_prompt));
        messages.extend(history);
        messages.push(ChatMessage::user(user_message));

        let answer = self.run_model(messages).await?;

        if let Some(memory) = &self.memory {
            memory
                .append(
                    memory_id,
                    [ChatMessage::user(question), ChatMessage::assistant(&answer)],
                )
                .await;
        }

        Ok(Reply::Answered { text: answer })
    }

    /// Question with retrieved snippets appended; the plain question when
    /// retrieval is off or fails.
    async fn augment(&self, question: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return question.to_string();
        };

        match retriever.augment(question).await {
            Ok(augmented) => augmented,
            Err(e) => {
                warn!(error = %e, "retrieval failed, using the plain question");
                question.to_string()
            }
        }
    }

    /// Call the model until it answers without requesting tools.
    async fn run_model(&self, mut messages: Vec<ChatMessage>) -> Result<String> {
        let specs: Vec<ToolSpec> = self.tools.as_ref().map(|t| t.specs()).unwrap_or_default();
        let mut rounds = 0;

        loop {
            let mut request = ChatRequest::new(messages.clone()).with_tools(specs.clone());
            request.temperature = self.config.temperature;

            let response = self.model.chat(request).await?;
            let message = response.message;

            if let Some(usage) = response.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "model call complete"
                );
            }

            if !message.has_tool_calls() {
                return Ok(message.content);
            }
            let Some(tools) = self.tools.as_ref() else {
                if message.content.trim().is_empty() {
                    return Err(MilesdeskError::Llm(
                        "model requested tools but none are available".into(),
                    ));
                }
                warn!("ignoring tool calls: no tools available");
                return Ok(message.content);
            };

            if rounds >= self.config.max_tool_rounds {
                warn!(rounds, "tool round limit reached");
                if message.content.trim().is_empty() {
                    return Err(MilesdeskError::Llm(format!(
                        "model still requested tools after {rounds} rounds"
                    )));
                }
                return Ok(message.content);
            }
            rounds += 1;

            let calls = message.tool_calls.clone();
            messages.push(message);
            for call in calls {
                debug!(tool = %call.name, round = rounds, "executing tool call");
                let result = tools.call(&call.name, &call.arguments).await;
                messages.push(ChatMessage::tool_result(call.id, result));
            }
        }
    }
}
