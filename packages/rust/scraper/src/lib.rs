//! Page fetching for the airline qualification sources.
//!
//! This crate provides:
//! - [`Fetcher`]: HTTP client with SSRF protection that turns a URL into page text
//! - [`Fetcher::fetch_all`]: concurrent fetch of every configured source, where a
//!   failing source is logged and dropped
//! - [`truncate_chars`]: character-ceiling truncation for prompt and tool output

pub mod fetcher;
mod truncate;

pub use fetcher::{FetchFailure, FetchReport, FetchedPage, Fetcher, SourcePage};
pub use truncate::truncate_chars;
