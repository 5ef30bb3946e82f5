//! Test doubles shared by this crate's tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use milesdesk_llm::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ToolCall, ToolSpec};
use milesdesk_rag::Embedder;
use milesdesk_shared::{MilesdeskError, Result};

use crate::tools::ToolBox;

/// Chat model replaying a fixed script and recording every request.
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<Result<ChatMessage>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(script: impl IntoIterator<Item = Result<ChatMessage>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain assistant replies, in order.
    pub fn replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|r| Ok(ChatMessage::assistant(r))))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MilesdeskError::Llm("script exhausted".into())));

        next.map(|message| ChatResponse { message, usage: None })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

pub(crate) fn tool_call(id: &str, name: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: "{}".into(),
    }
}

/// Tool box answering `result of {name}` and recording call names.
#[derive(Default)]
pub(crate) struct RecordingToolBox {
    calls: Mutex<Vec<String>>,
}

impl RecordingToolBox {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolBox for RecordingToolBox {
    fn specs(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::without_arguments("compare_qualification", "Compare programmes.")]
    }

    async fn call(&self, name: &str, _arguments: &str) -> String {
        self.calls.lock().unwrap().push(name.to_string());
        format!("result of {name}")
    }
}

/// Embedder that always fails.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(MilesdeskError::Embedding("embedding service unavailable".into()))
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }
}
