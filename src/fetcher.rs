use std::time::Duration;

use feed_rs::parser;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::normalize::{normalize, Article};

/// Why a single feed contributed nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

/// Retrieves and normalizes a single feed.
///
/// Cheap to clone; clones share the underlying connection pool, which lives
/// only as long as the last clone.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("NewsAggregator/1.0 (RSS Aggregator)")
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<Article>, FetchError> {
        debug!(url = %url, "Fetching feed");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let bytes = response.bytes().await?;

        let parsed = parser::parse(&bytes[..]).map_err(|e| FetchError::Parse(e.to_string()))?;

        if parsed.entries.is_empty() {
            info!(url = %url, "Feed has no entries");
            return Ok(Vec::new());
        }

        let feed_title = parsed.title.map(|t| t.content);
        let articles: Vec<Article> = parsed
            .entries
            .into_iter()
            .map(|entry| normalize(entry, feed_title.as_deref(), url))
            .collect();

        info!(url = %url, count = articles.len(), "Fetched feed");
        Ok(articles)
    }

    /// Like [`Fetcher::fetch`], but a failed feed is logged and yields nothing.
    pub async fn fetch_or_empty(&self, url: &str) -> Vec<Article> {
        match self.fetch(url).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to fetch feed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mock Feed</title>
    <item><title>First</title><link>https://mock.example/1</link></item>
    <item><title>Second</title><link>https://mock.example/2</link></item>
</channel></rss>"#;

    const EMPTY_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Quiet Feed</title></channel></rss>"#;

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5)).unwrap()
    }

    async fn serve(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = serve(200, VALID_RSS).await;
        let url = format!("{}/feed", mock_server.uri());

        let articles = fetcher().fetch(&url).await.unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "First");
        assert_eq!(articles[0].source, "Mock Feed");
        assert_eq!(articles[1].link, "https://mock.example/2");
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = serve(404, "not here").await;
        let url = format!("{}/feed", mock_server.uri());

        match fetcher().fetch(&url).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_error() {
        let mock_server = serve(500, "").await;
        let url = format!("{}/feed", mock_server.uri());

        match fetcher().fetch(&url).await {
            Err(FetchError::HttpStatus(500)) => {}
            other => panic!("Expected HttpStatus(500), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_unparseable_body() {
        let mock_server = serve(200, "<html><body>definitely not a feed</body></html>").await;
        let url = format!("{}/feed", mock_server.uri());

        match fetcher().fetch(&url).await {
            Err(FetchError::Parse(_)) => {}
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_feed_is_not_an_error() {
        let mock_server = serve(200, EMPTY_RSS).await;
        let url = format!("{}/feed", mock_server.uri());

        let articles = fetcher().fetch(&url).await.unwrap();
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(Duration::from_millis(200)).unwrap();
        let url = format!("{}/feed", mock_server.uri());

        match fetcher.fetch(&url).await {
            Err(FetchError::Timeout) => {}
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Nothing listens on port 9 (discard) in test environments.
        let result = fetcher().fetch("http://127.0.0.1:9/feed").await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_fetch_or_empty_swallows_errors() {
        let mock_server = serve(503, "").await;
        let url = format!("{}/feed", mock_server.uri());

        assert!(fetcher().fetch_or_empty(&url).await.is_empty());
    }

    #[tokio::test]
    async fn test_source_falls_back_to_url_without_feed_title() {
        let body = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>Lonely</title><link>https://mock.example/lonely</link></item>
</channel></rss>"#;
        let mock_server = serve(200, body).await;
        let url = format!("{}/feed", mock_server.uri());

        let articles = fetcher().fetch(&url).await.unwrap();
        assert_eq!(articles[0].source, url);
    }
}
