//! Error types for Milesdesk.
//!
//! Library crates use [`MilesdeskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Milesdesk operations.
#[derive(Debug, thiserror::Error)]
pub enum MilesdeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while scraping a source page.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Chat model error (transport, API status, or response decoding).
    #[error("llm error: {0}")]
    Llm(String),

    /// Embedding backend error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Tool execution error (unknown tool, bad arguments, failed fetch).
    #[error("tool error: {0}")]
    Tool(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty question, bad config value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MilesdeskError>;

impl MilesdeskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MilesdeskError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = MilesdeskError::Llm("HTTP 429".into());
        assert_eq!(err.to_string(), "llm error: HTTP 429");

        let err = MilesdeskError::validation("question must not be empty");
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = MilesdeskError::io(
            "/tmp/missing.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing.toml"));
    }
}
