//! Ollama chat backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

use milesdesk_shared::{MilesdeskError, Result};

use crate::error_snippet;
use crate::types::{ChatMessage, ChatModel, ChatRequest, ChatResponse, TokenUsage, ToolCall};

/// Chat backend for a local Ollama server (`POST /api/chat`, non-streaming).
pub struct OllamaChatModel {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChatModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MilesdeskError::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        if let Some(temperature) = request.temperature {
            body["options"] = json!({ "temperature": temperature });
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }
}

/// Ollama expects tool-call arguments as JSON objects, not strings.
fn message_to_json(message: &ChatMessage) -> Value {
    let mut msg = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });

    if message.has_tool_calls() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|tc| {
                let arguments: Value =
                    serde_json::from_str(&tc.arguments).unwrap_or_else(|_| json!({}));
                json!({
                    "function": {
                        "name": tc.name,
                        "arguments": arguments,
                    }
                })
            })
            .collect();
        msg["tool_calls"] = json!(calls);
    }

    msg
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len(), tools = request.tools.len()))]
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.request_body(&request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MilesdeskError::Llm(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MilesdeskError::Llm(format!(
                "Ollama API error ({status}): {}",
                error_snippet(&error_text)
            )));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| MilesdeskError::Llm(format!("failed to parse Ollama response: {e}")))?;

        let tool_calls: Vec<ToolCall> = parsed
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id.unwrap_or_else(|| format!("call_{}", Uuid::now_v7().simple())),
                name: tc.function.name,
                arguments: arguments_to_string(tc.function.arguments),
            })
            .collect();

        debug!(
            tool_calls = tool_calls.len(),
            done_reason = parsed.done_reason.as_deref().unwrap_or(""),
            "Ollama response received"
        );

        let message = if tool_calls.is_empty() {
            ChatMessage::assistant(parsed.message.content)
        } else {
            ChatMessage::assistant_with_tools(parsed.message.content, tool_calls)
        };

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt_tokens = prompt.unwrap_or(0);
                let completion_tokens = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        };

        Ok(ChatResponse { message, usage })
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Normalise Ollama's argument object into the JSON string form used elsewhere.
fn arguments_to_string(arguments: Value) -> String {
    match arguments {
        Value::Null => "{}".to_string(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    id: Option<String>,
    function: OllamaFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model(server: &MockServer) -> OllamaChatModel {
        OllamaChatModel::new(server.uri(), "llama3.2", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn chat_sends_non_streaming_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "stream": false,
                "options": { "temperature": 0.25 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": { "role": "assistant", "content": "Senator needs 130,000 status miles." },
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 30,
                "eval_count": 10
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::new(vec![ChatMessage::user("Senator?")]).with_temperature(0.25);
        let response = model(&server).chat(request).await.unwrap();

        assert_eq!(response.message.content, "Senator needs 130,000 status miles.");
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(40));
    }

    #[tokio::test]
    async fn chat_normalises_tool_call_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "function": { "name": "get_flying_blue_qualification", "arguments": { "detail": "gold" } }
                    }]
                },
                "done": true
            })))
            .mount(&server)
            .await;

        let response = model(&server)
            .chat(ChatRequest::new(vec![ChatMessage::user("Gold?")]))
            .await
            .unwrap();

        let calls = &response.message.tool_calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_flying_blue_qualification");
        assert!(calls[0].id.starts_with("call_"));
        let args: Value = serde_json::from_str(&calls[0].arguments).unwrap();
        assert_eq!(args["detail"], "gold");
        assert!(response.usage.is_none());
    }

    #[tokio::test]
    async fn chat_maps_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model \"llama3.2\" not found"))
            .mount(&server)
            .await;

        let err = model(&server)
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();

        assert!(matches!(err, MilesdeskError::Llm(_)));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn assistant_tool_calls_are_sent_as_objects() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "compare_qualification".into(),
            arguments: "{\"verbose\":true}".into(),
        };
        let msg = message_to_json(&ChatMessage::assistant_with_tools("", vec![call]));
        assert_eq!(msg["tool_calls"][0]["function"]["arguments"]["verbose"], true);
    }

    #[test]
    fn arguments_to_string_handles_all_shapes() {
        assert_eq!(arguments_to_string(Value::Null), "{}");
        assert_eq!(arguments_to_string(json!("{\"a\":1}")), "{\"a\":1}");
        assert_eq!(arguments_to_string(json!({ "a": 1 })), "{\"a\":1}");
    }
}
