use std::collections::HashSet;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::fetcher::Fetcher;
use crate::normalize::Article;

/// A fault in the fan-out itself, as opposed to a single feed failing.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Feed task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Fetch every URL concurrently and merge the results.
///
/// Each feed runs in its own task. A feed that fails contributes nothing;
/// only a task that panics or is cancelled fails the whole call.
pub async fn aggregate(
    fetcher: &Fetcher,
    urls: &[String],
    limit: Option<usize>,
) -> Result<Vec<Article>, AggregateError> {
    let urls = unique_urls(urls);

    let mut tasks = JoinSet::new();
    for (idx, url) in urls.iter().cloned().enumerate() {
        let fetcher = fetcher.clone();
        tasks.spawn(async move { (idx, fetcher.fetch_or_empty(&url).await) });
    }

    let mut per_feed: Vec<Vec<Article>> = vec![Vec::new(); urls.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, articles)) => per_feed[idx] = articles,
            Err(e) => {
                error!(error = %e, "Feed task failed");
                tasks.abort_all();
                return Err(AggregateError::Task(e));
            }
        }
    }

    let articles = merge(per_feed.into_iter().flatten(), limit);
    info!(
        feeds = urls.len(),
        articles = articles.len(),
        "Aggregated feeds"
    );
    Ok(articles)
}

/// Dedupe by link, order newest first, then truncate.
pub fn merge(articles: impl IntoIterator<Item = Article>, limit: Option<usize>) -> Vec<Article> {
    let mut articles = dedupe_by_link(articles);
    sort_newest_first(&mut articles);
    if let Some(limit) = limit {
        articles.truncate(limit);
    }
    articles
}

/// Keeps the first article seen for each link.
pub fn dedupe_by_link(articles: impl IntoIterator<Item = Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.link.clone()))
        .collect()
}

/// Stable sort, most recent first. Missing or unparsable dates go last.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by_cached_key(|a| std::cmp::Reverse(a.published_at()));
}

fn unique_urls(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|u| seen.insert(u.as_str()))
        .cloned()
        .collect()
}
