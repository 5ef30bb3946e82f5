//! Core domain types for Milesdesk.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source id of the Air France-KLM Flying Blue programme.
pub const FLYING_BLUE: &str = "flying-blue";

/// Source id of the Lufthansa Group Miles & More programme.
pub const MILES_AND_MORE: &str = "miles-and-more";

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A scraped airline page: fed to retrieval at startup and to the tools on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier used by tools (e.g. `flying-blue`).
    pub id: String,
    /// Airline label attached to every segment of this source.
    pub airline: String,
    /// Loyalty programme name.
    pub name: String,
    /// Page to scrape.
    pub url: String,
}

impl Source {
    /// Human-readable label, e.g. `Flying Blue (Air France-KLM)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.airline)
    }
}

// ---------------------------------------------------------------------------
// MemoryId
// ---------------------------------------------------------------------------

/// Longest client-supplied conversation id that is accepted as is.
pub const MAX_CLIENT_ID_LEN: usize = 128;

/// Identifies one conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub String);

impl MemoryId {
    /// Generate a new time-sortable conversation identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parse a client-supplied id, issuing a fresh one when blank or longer
    /// than [`MAX_CLIENT_ID_LEN`] bytes.
    pub fn from_client(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if !s.is_empty() && s.len() <= MAX_CLIENT_ID_LEN => Self(s.to_string()),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_id_from_client_keeps_value() {
        let id = MemoryId::from_client(Some("  abc-123 "));
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn memory_id_from_client_issues_new_when_blank() {
        let a = MemoryId::from_client(Some("   "));
        let b = MemoryId::from_client(None);
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn memory_id_from_client_replaces_oversized_value() {
        let huge = "x".repeat(MAX_CLIENT_ID_LEN + 1);
        let id = MemoryId::from_client(Some(&huge));
        assert_ne!(id.as_str(), huge);
        assert!(id.as_str().len() <= MAX_CLIENT_ID_LEN);

        let longest = "y".repeat(MAX_CLIENT_ID_LEN);
        assert_eq!(MemoryId::from_client(Some(&longest)).as_str(), longest);
    }

    #[test]
    fn source_label() {
        let source = Source {
            id: FLYING_BLUE.into(),
            airline: "Air France-KLM".into(),
            name: "Flying Blue".into(),
            url: "https://example.com".into(),
        };
        assert_eq!(source.label(), "Flying Blue (Air France-KLM)");
    }
}
