//! Shared types, error model, and configuration for Milesdesk.
//!
//! This crate is the foundation depended on by all other Milesdesk crates.
//! It provides:
//! - [`MilesdeskError`]: the unified error type
//! - Domain types ([`Source`], [`MemoryId`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EmbeddingConfig, GuardrailConfig, LlmConfig, MemoryConfig, ModelProvider,
    RagConfig, ServerConfig, ToolsConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key,
};
pub use error::{MilesdeskError, Result};
pub use types::{FLYING_BLUE, MAX_CLIENT_ID_LEN, MILES_AND_MORE, MemoryId, Source};
