//! Tools the model can call to fetch live qualification rules.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use milesdesk_llm::ToolSpec;
use milesdesk_scraper::{Fetcher, truncate_chars};
use milesdesk_shared::{AppConfig, FLYING_BLUE, MILES_AND_MORE, MilesdeskError, Result, Source};

pub const GET_FLYING_BLUE_QUALIFICATION: &str = "get_flying_blue_qualification";
pub const GET_MILES_AND_MORE_QUALIFICATION: &str = "get_miles_and_more_qualification";
pub const COMPARE_QUALIFICATION: &str = "compare_qualification";

const SECTION_SEPARATOR: &str = "\n\n";

/// Named functions the model may invoke.
#[async_trait]
pub trait ToolBox: Send + Sync {
    /// Tool definitions sent with each chat request.
    fn specs(&self) -> Vec<ToolSpec>;

    /// Run a tool and return its text result.
    ///
    /// Failures are reported as text starting with `Tool error:` so the model
    /// can recover.
    async fn call(&self, name: &str, arguments: &str) -> String;
}

/// Scrapes the configured loyalty programme pages on demand.
#[derive(Debug, Clone)]
pub struct QualificationTools {
    fetcher: Fetcher,
    sources: Vec<Source>,
    max_chars: usize,
}

impl QualificationTools {
    pub fn new(fetcher: Fetcher, sources: Vec<Source>, max_chars: usize) -> Self {
        Self {
            fetcher,
            sources,
            max_chars,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            Fetcher::from_config(&config.tools)?,
            config.sources.clone(),
            config.tools.max_chars,
        ))
    }

    fn source(&self, source_id: &str) -> Result<&Source> {
        self.sources
            .iter()
            .find(|s| s.id == source_id)
            .ok_or_else(|| MilesdeskError::Tool(format!("no source configured with id '{source_id}'")))
    }

    /// Current qualification text of one source, at most `max_chars` long.
    #[instrument(skip(self))]
    pub async fn fetch_qualification_info(&self, source_id: &str) -> Result<String> {
        let source = self.source(source_id)?;
        let page = self
            .fetcher
            .fetch(&source.url)
            .await
            .map_err(|e| MilesdeskError::Tool(format!("could not fetch {}: {e}", source.label())))?;

        Ok(section(source, &page.text, self.max_chars))
    }

    /// Flying Blue (Air France-KLM) qualification rules.
    pub async fn flying_blue(&self) -> Result<String> {
        self.fetch_qualification_info(FLYING_BLUE).await
    }

    /// Miles & More (Lufthansa Group) qualification rules.
    pub async fn miles_and_more(&self) -> Result<String> {
        self.fetch_qualification_info(MILES_AND_MORE).await
    }

    /// Rules of every configured programme, one labelled section each.
    ///
    /// Sources are fetched concurrently. A source that fails gets an
    /// "unavailable" section and the others are still returned. Each section
    /// gets an equal share of `max_chars`.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn compare_qualification(&self) -> Result<String> {
        if self.sources.is_empty() {
            return Err(MilesdeskError::Tool("no sources configured".into()));
        }

        let report = self.fetcher.fetch_all(&self.sources).await;
        if report.pages.is_empty() {
            return Err(MilesdeskError::Tool(
                "qualification information is unavailable for every programme".into(),
            ));
        }

        let separators = SECTION_SEPARATOR.len() * (self.sources.len() - 1);
        let budget = self.max_chars.saturating_sub(separators) / self.sources.len();

        let sections: Vec<String> = self
            .sources
            .iter()
            .map(|source| {
                match report.pages.iter().find(|p| p.source.id == source.id) {
                    Some(fetched) => section(source, &fetched.page.text, budget),
                    None => section(source, "Information is currently unavailable.", budget),
                }
            })
            .collect();

        let joined = sections.join(SECTION_SEPARATOR);
        Ok(truncate_chars(&joined, self.max_chars).to_string())
    }

    /// Dispatch a tool by name.
    pub async fn invoke(&self, name: &str) -> Result<String> {
        match name {
            GET_FLYING_BLUE_QUALIFICATION => self.flying_blue().await,
            GET_MILES_AND_MORE_QUALIFICATION => self.miles_and_more().await,
            COMPARE_QUALIFICATION => self.compare_qualification().await,
            other => Err(MilesdeskError::Tool(format!("unknown tool '{other}'"))),
        }
    }
}

/// `"{label}\n{text}"` cut to `max_chars` characters.
fn section(source: &Source, text: &str, max_chars: usize) -> String {
    let full = format!("{}\n{}", source.label(), text.trim());
    truncate_chars(&full, max_chars).to_string()
}

/// Definitions of the three qualification tools.
pub fn qualification_tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::without_arguments(
            GET_FLYING_BLUE_QUALIFICATION,
            "Fetch the current Flying Blue (Air France-KLM) rules for reaching each status level.",
        ),
        ToolSpec::without_arguments(
            GET_MILES_AND_MORE_QUALIFICATION,
            "Fetch the current Miles & More (Lufthansa Group) status qualification rules.",
        ),
        ToolSpec::without_arguments(
            COMPARE_QUALIFICATION,
            "Fetch the status qualification rules of Flying Blue and Miles & More side by side.",
        ),
    ]
}

#[async_trait]
impl ToolBox for QualificationTools {
    fn specs(&self) -> Vec<ToolSpec> {
        qualification_tool_specs()
    }

    async fn call(&self, name: &str, _arguments: &str) -> String {
        match self.invoke(name).await {
            Ok(text) => {
                debug!(tool = name, chars = text.chars().count(), "tool call succeeded");
                text
            }
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                format!("Tool error: {e}")
            }
        }
    }
}
