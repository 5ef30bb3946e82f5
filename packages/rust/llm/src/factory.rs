use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use milesdesk_shared::{LlmConfig, ModelProvider, Result, resolve_api_key};

use crate::ollama::OllamaChatModel;
use crate::openai::OpenAiChatModel;
use crate::types::ChatModel;

/// Build the chat backend selected by `[llm]`.
///
/// The API key is read from the environment variable named by
/// `llm.api_key_env`; it is required for `openai` and ignored for `ollama`.
pub fn build_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    let base_url = config.effective_base_url();
    let timeout = Duration::from_secs(config.timeout_secs);
    let api_key = if config.provider.requires_api_key() {
        resolve_api_key(&config.api_key_env)?
    } else {
        String::new()
    };

    let model: Arc<dyn ChatModel> = match config.provider {
        ModelProvider::OpenAi => Arc::new(OpenAiChatModel::new(api_key, &base_url, &config.model, timeout)?),
        ModelProvider::Ollama => Arc::new(OllamaChatModel::new(&base_url, &config.model, timeout)?),
    };

    info!(provider = %config.provider, model = %config.model, %base_url, "chat model ready");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use milesdesk_shared::MilesdeskError;

    #[test]
    fn ollama_needs_no_api_key() {
        let config = LlmConfig {
            provider: ModelProvider::Ollama,
            model: "llama3.2".into(),
            api_key_env: "MILESDESK_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        let model = build_chat_model(&config).unwrap();
        assert_eq!(model.provider_name(), "ollama");
        assert_eq!(model.model(), "llama3.2");
    }

    #[test]
    fn openai_without_key_is_a_config_error() {
        let config = LlmConfig {
            provider: ModelProvider::OpenAi,
            api_key_env: "MILESDESK_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..LlmConfig::default()
        };
        let err = build_chat_model(&config).err().unwrap();
        assert!(matches!(err, MilesdeskError::Config { .. }));
        assert!(err.to_string().contains("MILESDESK_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
