//! Web tools: Google Custom Search and URL fetching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::error::{AgentError, Result};
use crate::tool::{WebFetch, WebSearch};

fn user_agent() -> String {
    concat!("ChatPilot/", env!("CARGO_PKG_VERSION")).to_string()
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent())
        .build()
        .map_err(|e| AgentError::internal(format!("Failed to build HTTP client: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Web Search
// ─────────────────────────────────────────────────────────────────────────────

/// Default Google Custom Search endpoint.
pub const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Returned by [`DisabledWebSearch`].
pub const SEARCH_DISABLED: &str =
    "Web search is not configured. Answer from existing knowledge and say so if unsure.";

/// Configuration for Google Custom Search.
#[derive(Debug, Clone)]
pub struct WebSearchConfig {
    pub api_key: String,
    /// Programmable Search Engine id (`cx`).
    pub cse_id: String,
    /// Maximum number of results to request.
    pub num_results: u32,
    pub timeout: Duration,
    pub endpoint: String,
}

impl WebSearchConfig {
    pub fn new(api_key: impl Into<String>, cse_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            cse_id: cse_id.into(),
            num_results: 5,
            timeout: Duration::from_secs(30),
            endpoint: GOOGLE_CSE_ENDPOINT.to_string(),
        }
    }

    pub fn with_num_results(mut self, num: u32) -> Self {
        self.num_results = num;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Web search backed by the Google Custom Search JSON API.
#[derive(Debug, Clone)]
pub struct GoogleWebSearch {
    client: Client,
    config: WebSearchConfig,
}

impl GoogleWebSearch {
    pub fn new(config: WebSearchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }

    async fn query(&self, query: &str) -> Result<Value> {
        let num = self.config.num_results.to_string();
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("q", query),
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.cse_id.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AgentError::tool(e.to_string()))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| AgentError::tool(e.to_string()))
    }
}

/// Format a Custom Search response body as tool text.
pub fn format_search_results(body: &Value) -> String {
    if let Some(err) = body.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return format!("Search error: {message}");
    }

    let items = body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if items.is_empty() {
        return "No search results found.".to_string();
    }

    items
        .iter()
        .map(|item| {
            let field = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or_default();
            format!(
                "Title: {}\nSnippet: {}\nLink: {}",
                field("title"),
                field("snippet"),
                field("link")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl WebSearch for GoogleWebSearch {
    async fn search(&self, query: &str) -> String {
        match self.query(query).await {
            Ok(body) => {
                let text = format_search_results(&body);
                info!(query = %query, chars = text.len(), "Web search complete");
                text
            }
            Err(e) => {
                error!(query = %query, error = %e, "Web search failed");
                format!("Search error: {}", e)
            }
        }
    }
}

/// Placeholder used when search is disabled or has no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    async fn search(&self, query: &str) -> String {
        debug!(query = %query, "Web search requested while disabled");
        SEARCH_DISABLED.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Web Fetch
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for web fetching.
#[derive(Debug, Clone)]
pub struct WebFetchConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum text length to return.
    pub max_text_length: usize,
}

impl Default for WebFetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_text_length: 50_000,
        }
    }
}

/// Fetches a URL and reduces it to readable text.
#[derive(Debug, Clone)]
pub struct HttpWebFetcher {
    client: Client,
    config: WebFetchConfig,
}

impl HttpWebFetcher {
    pub fn new(config: WebFetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
        })
    }

    fn truncate(&self, text: String) -> String {
        match text.char_indices().nth(self.config.max_text_length) {
            Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
            None => text,
        }
    }
}

/// Only absolute http(s) URLs are fetched.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AgentError::InvalidToolParams(format!("Invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(AgentError::InvalidToolParams(
            "Only HTTP and HTTPS URLs are supported".to_string(),
        )),
    }
}

/// Extract readable text from HTML.
///
/// Prefers main content containers and falls back to the whole body.
pub fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let content_selectors = [
        "article",
        "main",
        "[role='main']",
        ".content",
        "#content",
        "body",
    ];

    let mut text_parts = Vec::new();
    for selector_str in content_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<Vec<_>>().join(" ");
            if !text.trim().is_empty() {
                text_parts.push(text);
            }
        }
        if !text_parts.is_empty() {
            break;
        }
    }

    text_parts
        .join("\n")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the page title.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl WebFetch for HttpWebFetcher {
    async fn fetch(&self, raw_url: &str) -> Result<String> {
        let url = validate_url(raw_url)?;

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| AgentError::tool(format!("Failed to fetch URL: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::tool(format!("HTTP {status} fetching {url}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_lowercase();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AgentError::tool(format!("Failed to read response: {e}")))?;
        debug!(url = %url, content_type = %content_type, bytes = bytes.len(), "Fetched URL");

        let text = if content_type.contains("html") {
            let html = String::from_utf8_lossy(&bytes);
            let body = extract_text_from_html(&html);
            match extract_title(&html) {
                Some(title) => format!("{title}\n\n{body}"),
                None => body,
            }
        } else if content_type.starts_with("text/")
            || content_type.contains("json")
            || content_type.contains("xml")
        {
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            format!(
                "Fetched {} bytes of '{}' content from {}, which cannot be shown as text.",
                bytes.len(),
                content_type,
                url
            )
        };

        Ok(self.truncate(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_search_results() {
        let body = json!({
            "items": [
                {"title": "Rust", "snippet": "A language", "link": "https://rust-lang.org"},
                {"title": "Tokio", "snippet": "Async runtime", "link": "https://tokio.rs"}
            ]
        });
        assert_eq!(
            format_search_results(&body),
            "Title: Rust\nSnippet: A language\nLink: https://rust-lang.org\n\n\
             Title: Tokio\nSnippet: Async runtime\nLink: https://tokio.rs"
        );
    }

    #[test]
    fn test_format_search_empty_and_error() {
        assert_eq!(format_search_results(&json!({})), "No search results found.");
        assert_eq!(
            format_search_results(&json!({"items": []})),
            "No search results found."
        );
        assert_eq!(
            format_search_results(&json!({"error": {"code": 403, "message": "quota"}})),
            "Search error: quota"
        );
    }

    #[tokio::test]
    async fn test_disabled_search() {
        assert_eq!(DisabledWebSearch.search("rust").await, SEARCH_DISABLED);
    }

    #[tokio::test]
    async fn test_google_search_unreachable_endpoint_is_text() {
        let search = GoogleWebSearch::new(
            WebSearchConfig::new("key", "cx")
                .with_endpoint("http://127.0.0.1:1/customsearch")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        assert!(search.search("rust").await.starts_with("Search error: "));
    }

    #[test]
    fn test_extract_text_prefers_main() {
        let html = r#"
            <html>
            <head><title>Test Page</title></head>
            <body>
                <nav>Navigation</nav>
                <main>
                    <h1>Hello World</h1>
                    <p>This is the   main content.</p>
                </main>
                <footer>Footer</footer>
            </body>
            </html>
        "#;
        let text = extract_text_from_html(html);
        assert_eq!(text, "Hello World This is the main content.");
        assert_eq!(extract_title(html).as_deref(), Some("Test Page"));
    }

    #[test]
    fn test_extract_text_falls_back_to_body() {
        let text = extract_text_from_html("<html><body><p>Just a body</p></body></html>");
        assert_eq!(text, "Just a body");
        assert_eq!(extract_title("<html><body></body></html>"), None);
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/a").is_ok());
        assert!(matches!(
            validate_url("not a url"),
            Err(AgentError::InvalidToolParams(_))
        ));
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(AgentError::InvalidToolParams(_))
        ));
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let fetcher = HttpWebFetcher::new(WebFetchConfig {
            max_text_length: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(fetcher.truncate("héllo".into()), "hél...[truncated]");
        assert_eq!(fetcher.truncate("hé".into()), "hé");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http() {
        let fetcher = HttpWebFetcher::new(WebFetchConfig::default()).unwrap();
        let err = fetcher.fetch("ftp://example.com/file").await.unwrap_err();
        assert!(err.to_string().contains("Only HTTP and HTTPS"));
    }
}
