//! Input guardrail: classify a question before it reaches the assistant.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use milesdesk_llm::{ChatMessage, ChatModel, ChatRequest};
use milesdesk_shared::GuardrailConfig;

use crate::prompts::GUARDRAIL_PROMPT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailOutcome {
    Accepted,
    /// Input refused; `message` is shown to the user.
    Rejected { message: String },
}

impl GuardrailOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Accepts or rejects user input before the main model call.
#[async_trait]
pub trait InputGuardrail: Send + Sync {
    async fn validate(&self, question: &str) -> GuardrailOutcome;
}

/// Guardrail asking the chat model for a YES/NO topic classification.
///
/// Unparseable answers count as accepted. When the classification call
/// itself fails, the input is accepted if `fail_open` is set and rejected
/// otherwise.
pub struct LlmGuardrail {
    model: Arc<dyn ChatModel>,
    fail_open: bool,
    rejection_message: String,
}

impl LlmGuardrail {
    pub fn new(model: Arc<dyn ChatModel>, fail_open: bool, rejection_message: impl Into<String>) -> Self {
        Self {
            model,
            fail_open,
            rejection_message: rejection_message.into(),
        }
    }

    pub fn from_config(config: &GuardrailConfig, model: Arc<dyn ChatModel>) -> Self {
        Self::new(model, config.fail_open, config.rejection_message.clone())
    }

    fn rejected(&self) -> GuardrailOutcome {
        GuardrailOutcome::Rejected {
            message: self.rejection_message.clone(),
        }
    }
}

#[async_trait]
impl InputGuardrail for LlmGuardrail {
    #[instrument(skip_all, fields(fail_open = self.fail_open))]
    async fn validate(&self, question: &str) -> GuardrailOutcome {
        let request = ChatRequest::new(vec![
            ChatMessage::system(GUARDRAIL_PROMPT),
            ChatMessage::user(question),
        ])
        .with_temperature(0.0);

        match self.model.chat(request).await {
            Ok(response) => match parse_verdict(&response.message.content) {
                Some(true) => GuardrailOutcome::Accepted,
                Some(false) => {
                    debug!("question rejected as off-topic");
                    self.rejected()
                }
                None => {
                    debug!(answer = %response.message.content, "unparseable guardrail answer, accepting");
                    GuardrailOutcome::Accepted
                }
            },
            Err(e) if self.fail_open => {
                warn!(error = %e, "guardrail check failed, accepting input");
                GuardrailOutcome::Accepted
            }
            Err(e) => {
                warn!(error = %e, "guardrail check failed, rejecting input");
                self.rejected()
            }
        }
    }
}

/// First `YES`/`NO` token in `answer`, case-insensitive.
fn parse_verdict(answer: &str) -> Option<bool> {
    answer
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|token| {
            if token.eq_ignore_ascii_case("yes") {
                Some(true)
            } else if token.eq_ignore_ascii_case("no") {
                Some(false)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;
    use milesdesk_shared::MilesdeskError;

    fn guardrail(model: Arc<ScriptedModel>, fail_open: bool) -> LlmGuardrail {
        LlmGuardrail::new(model, fail_open, "Off topic.")
    }

    #[test]
    fn parse_verdict_variants() {
        assert_eq!(parse_verdict("YES"), Some(true));
        assert_eq!(parse_verdict("yes."), Some(true));
        assert_eq!(parse_verdict("No, this is about cooking."), Some(false));
        assert_eq!(parse_verdict("**NO**"), Some(false));
        assert_eq!(parse_verdict("Not sure"), None);
        assert_eq!(parse_verdict(""), None);
    }

    #[tokio::test]
    async fn accepts_on_topic_question() {
        let model = Arc::new(ScriptedModel::replies(["YES"]));
        let outcome = guardrail(model.clone(), true).validate("How do I reach Gold?").await;

        assert!(outcome.is_accepted());
        let requests = model.requests();
        assert_eq!(requests[0].messages[0].content, GUARDRAIL_PROMPT);
        assert_eq!(requests[0].messages[1].content, "How do I reach Gold?");
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn rejects_off_topic_question() {
        let model = Arc::new(ScriptedModel::replies(["NO"]));
        let outcome = guardrail(model, true).validate("Best pasta recipe?").await;
        assert_eq!(
            outcome,
            GuardrailOutcome::Rejected {
                message: "Off topic.".into()
            }
        );
    }

    #[tokio::test]
    async fn unparseable_answer_is_accepted() {
        let model = Arc::new(ScriptedModel::replies(["I cannot tell."]));
        assert!(guardrail(model, false).validate("hmm").await.is_accepted());
    }

    #[tokio::test]
    async fn classification_error_fails_open() {
        let model = Arc::new(ScriptedModel::new([Err(MilesdeskError::Llm("timeout".into()))]));
        assert!(guardrail(model, true).validate("How do I reach Gold?").await.is_accepted());
    }

    #[tokio::test]
    async fn classification_error_rejects_when_fail_closed() {
        let model = Arc::new(ScriptedModel::new([Err(MilesdeskError::Llm("timeout".into()))]));
        let outcome = guardrail(model, false).validate("How do I reach Gold?").await;
        assert!(!outcome.is_accepted());
    }
}
