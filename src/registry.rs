use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::config::FeedConfig;

/// An allow-listed feed as exposed by `/api/feeds`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegisteredFeed {
    pub name: String,
    pub url: String,
}

/// The fixed set of feed URLs the service may fetch.
///
/// Built once at startup and never mutated. Lookups compare canonical
/// forms, so a percent-encoded URL matches its decoded registry entry.
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: Vec<RegisteredFeed>,
    by_key: HashMap<String, usize>,
}

impl FeedRegistry {
    pub fn new(configs: &[FeedConfig]) -> Self {
        let mut registry = Self::default();
        for config in configs {
            let key = canonical_url(&config.url);
            if registry.by_key.contains_key(&key) {
                continue;
            }
            let name = config
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| config.url.clone());
            registry.by_key.insert(key, registry.feeds.len());
            registry.feeds.push(RegisteredFeed {
                name,
                url: config.url.clone(),
            });
        }
        registry
    }

    /// Returns the registry entry matching `raw`, if allow-listed.
    pub fn resolve(&self, raw: &str) -> Option<&RegisteredFeed> {
        self.by_key
            .get(&canonical_url(raw))
            .map(|&idx| &self.feeds[idx])
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_some()
    }

    pub fn feeds(&self) -> &[RegisteredFeed] {
        &self.feeds
    }

    pub fn urls(&self) -> Vec<String> {
        self.feeds.iter().map(|f| f.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

/// Canonical comparison form of a feed URL.
///
/// `Url` lowercases the host and encodes non-ASCII path segments; the result
/// is then percent-decoded, so `%69t.rss`, `it.rss` and upper or lower case
/// hex escapes all agree. Only used as a lookup key: the registry's own
/// spelling is what gets fetched. Strings that do not parse are compared
/// trimmed.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) => percent_decode_str(url.as_str())
            .decode_utf8_lossy()
            .into_owned(),
        Err(_) => trimmed.to_string(),
    }
}
