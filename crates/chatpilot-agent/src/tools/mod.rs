//! Built-in collaborators backing the model's tools.
//!
//! - Web search (Google Custom Search, or a disabled placeholder)
//! - URL fetching with HTML-to-text extraction
//! - CSV and Excel analysis for uploaded data

mod files;
mod web;

pub use files::{SAMPLE_ROWS, TabularFileAnalyzer};
pub use web::{
    DisabledWebSearch, GOOGLE_CSE_ENDPOINT, GoogleWebSearch, HttpWebFetcher, SEARCH_DISABLED,
    WebFetchConfig, WebSearchConfig, extract_text_from_html, extract_title, format_search_results,
    validate_url,
};
