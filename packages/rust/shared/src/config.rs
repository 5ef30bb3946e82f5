//! Application configuration for Milesdesk.
//!
//! User config lives at `~/.milesdesk/milesdesk.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored here: config only names the env var holding them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MilesdeskError, Result};
use crate::types::{FLYING_BLUE, MILES_AND_MORE, Source};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "milesdesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".milesdesk";

// ---------------------------------------------------------------------------
// Config structs (matching milesdesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat model backend.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding backend used for retrieval.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Conversation memory.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Retrieval augmentation.
    #[serde(default)]
    pub rag: RagConfig,

    /// Tool calling.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Input guardrail.
    #[serde(default)]
    pub guardrail: GuardrailConfig,

    /// Airline pages to scrape.
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            memory: MemoryConfig::default(),
            rag: RagConfig::default(),
            tools: ToolsConfig::default(),
            guardrail: GuardrailConfig::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> Vec<Source> {
    vec![
        Source {
            id: FLYING_BLUE.into(),
            airline: "Air France-KLM".into(),
            name: "Flying Blue".into(),
            url: "https://www.flyingblue.com/en/status/how-to-qualify".into(),
        },
        Source {
            id: MILES_AND_MORE.into(),
            airline: "Lufthansa Group".into(),
            name: "Miles & More".into(),
            url: "https://www.miles-and-more.com/row/en/program/status.html".into(),
        },
    ]
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Mount the MCP endpoint at `/mcp` next to the form endpoint.
    #[serde(default = "default_true")]
    pub mcp_enabled: bool,

    /// Message shown to the user when answering fails for any reason.
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mcp_enabled: true,
            error_message: default_error_message(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_error_message() -> String {
    "Sorry, something went wrong while answering your question. Please try again later.".into()
}

/// Which API flavour a model endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Hosted, OpenAI-compatible (`/chat/completions`, `/embeddings`).
    OpenAi,
    /// Local Ollama daemon (`/api/chat`, `/api/embed`).
    Ollama,
}

impl ModelProvider {
    /// Base URL used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Whether this provider needs an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: ModelProvider,

    /// Model endpoint URL (provider default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Overrides the built-in assistant system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_chat_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            system_prompt: None,
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

fn default_provider() -> ModelProvider {
    ModelProvider::OpenAi
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: ModelProvider,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Segments sent per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_batch_size() -> usize {
    32
}

/// `[memory]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Window size: older messages are evicted beyond this count.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Conversations kept at once; the least recently used is dropped first.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: default_max_messages(),
            max_conversations: default_max_conversations(),
        }
    }
}

fn default_max_messages() -> usize {
    10
}

fn default_max_conversations() -> u64 {
    1_000
}

/// `[rag]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum characters per segment.
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,

    /// Characters shared between consecutive segments.
    #[serde(default = "default_segment_overlap")]
    pub segment_overlap: usize,

    /// Top-k segments injected into the prompt.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Minimum cosine similarity for a segment to be injected.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            segment_size: default_segment_size(),
            segment_overlap: default_segment_overlap(),
            max_results: default_max_results(),
            min_score: default_min_score(),
        }
    }
}

fn default_segment_size() -> usize {
    500
}
fn default_segment_overlap() -> usize {
    50
}
fn default_max_results() -> usize {
    5
}
fn default_min_score() -> f32 {
    0.6
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Character ceiling for text returned by a tool.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Maximum model round-trips spent on tool calls per question.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Allow fetching localhost/private addresses (local mirrors, tests).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: default_max_chars(),
            max_rounds: default_max_rounds(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            allow_private_hosts: false,
        }
    }
}

fn default_max_chars() -> usize {
    4000
}
fn default_max_rounds() -> usize {
    5
}
fn default_fetch_timeout_secs() -> u64 {
    20
}

/// `[guardrail]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Treat a failed classification call as accepted.
    #[serde(default = "default_true")]
    pub fail_open: bool,

    #[serde(default = "default_rejection_message")]
    pub rejection_message: String,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_open: true,
            rejection_message: default_rejection_message(),
        }
    }
}

fn default_rejection_message() -> String {
    "I can only help with questions about airline loyalty programmes and status qualification."
        .into()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.memory.max_messages == 0 {
            return Err(MilesdeskError::config("memory.max_messages must be at least 1"));
        }
        if self.memory.max_conversations == 0 {
            return Err(MilesdeskError::config("memory.max_conversations must be at least 1"));
        }
        if self.rag.segment_size == 0 {
            return Err(MilesdeskError::config("rag.segment_size must be at least 1"));
        }
        if self.rag.segment_overlap >= self.rag.segment_size {
            return Err(MilesdeskError::config(format!(
                "rag.segment_overlap ({}) must be smaller than rag.segment_size ({})",
                self.rag.segment_overlap, self.rag.segment_size
            )));
        }
        if !(0.0..=1.0).contains(&self.rag.min_score) {
            return Err(MilesdeskError::config(format!(
                "rag.min_score must be within [0, 1], got {}",
                self.rag.min_score
            )));
        }
        if self.tools.max_chars == 0 {
            return Err(MilesdeskError::config("tools.max_chars must be at least 1"));
        }
        if self.embedding.batch_size == 0 {
            return Err(MilesdeskError::config("embedding.batch_size must be at least 1"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(MilesdeskError::config(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            url::Url::parse(&source.url).map_err(|e| {
                MilesdeskError::config(format!("source '{}' has invalid url: {e}", source.id))
            })?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.milesdesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MilesdeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.milesdesk/milesdesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MilesdeskError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        MilesdeskError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MilesdeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MilesdeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MilesdeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the named environment variable.
pub fn resolve_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(MilesdeskError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_messages"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("flying-blue"));
    }

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn rag_defaults_match_documented_values() {
        let rag = RagConfig::default();
        assert_eq!(rag.segment_size, 500);
        assert_eq!(rag.segment_overlap, 50);
        assert_eq!(rag.max_results, 5);
        assert!((rag.min_score - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[llm]
provider = "ollama"
model = "llama3.1"

[memory]
max_messages = 4
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.llm.provider, ModelProvider::Ollama);
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434");
        assert_eq!(config.memory.max_messages, 4);
        assert_eq!(config.memory.max_conversations, 1_000);
        assert!(config.memory.enabled);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.tools.max_chars, 4000);
    }

    #[test]
    fn config_with_custom_sources() {
        let toml_str = r#"
[[sources]]
id = "flying-blue"
airline = "KLM"
name = "Flying Blue"
url = "https://example.com/fb"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].id, "flying-blue");
        assert_eq!(config.sources[0].airline, "KLM");
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_size() {
        let mut config = AppConfig::default();
        config.rag.segment_overlap = 500;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("segment_overlap"));
    }

    #[test]
    fn validate_rejects_zero_window() {
        let mut config = AppConfig::default();
        config.memory.max_messages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_conversation_cap() {
        let mut config = AppConfig::default();
        config.memory.max_conversations = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_conversations"));
    }

    #[test]
    fn validate_rejects_duplicate_sources() {
        let mut config = AppConfig::default();
        let dup = config.sources[0].clone();
        config.sources.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn validate_rejects_out_of_range_score() {
        let mut config = AppConfig::default();
        config.rag.min_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("md-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("milesdesk.toml");
        std::fs::write(&path, "[server]\nport = 9090\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, MilesdeskError::Io { .. }));
    }

    #[test]
    fn api_key_resolution_fails_for_unset_var() {
        // Use a unique env var name to avoid interfering with other tests
        let result = resolve_api_key("MD_TEST_NONEXISTENT_KEY_12345");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn provider_serializes_lowercase() {
        let s = toml::to_string(&LlmConfig::default()).unwrap();
        assert!(s.contains("provider = \"openai\""));
    }
}
