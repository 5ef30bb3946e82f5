//! Form, ask and health routes.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::{error, info, instrument};

use milesdesk_core::{Assistant, Reply};
use milesdesk_shared::MemoryId;

use crate::page::{self, Outcome};

/// Shared state of the web routes.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    /// Shown instead of any internal error.
    pub error_message: Arc<str>,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>, error_message: impl Into<Arc<str>>) -> Self {
        Self {
            assistant,
            error_message: error_message.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
    #[serde(default)]
    conversation: Option<String>,
}

async fn index() -> Html<String> {
    Html(page::render(MemoryId::new().as_str(), None, None))
}

#[instrument(skip_all, fields(conversation = tracing::field::Empty))]
async fn ask(State(state): State<AppState>, Form(form): Form<AskForm>) -> Html<String> {
    let memory_id = MemoryId::from_client(form.conversation.as_deref());
    tracing::Span::current().record("conversation", memory_id.as_str());

    let question = form.question.trim();
    let result = state.assistant.answer(&memory_id, question).await;

    let html = match &result {
        Ok(Reply::Answered { text }) => {
            info!("question answered");
            page::render(memory_id.as_str(), Some(question), Some(Outcome::Answer(text)))
        }
        Ok(Reply::Rejected { message }) => {
            page::render(memory_id.as_str(), Some(question), Some(Outcome::Rejected(message)))
        }
        Err(e) => {
            error!(error = %e, "failed to answer question");
            page::render(
                memory_id.as_str(),
                Some(question),
                Some(Outcome::Error(&state.error_message)),
            )
        }
    };
    Html(html)
}

async fn health() -> &'static str {
    "ok"
}
