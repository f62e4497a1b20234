use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Link};
use serde::{Deserialize, Serialize};

use crate::dates::{format_timestamp, parse_lenient};

pub const NO_TITLE: &str = "No Title";

/// A feed entry flattened into the service's wire representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// The link as feed-rs resolves it, so a bare `https://host` gains a
    /// trailing `/`. Not the raw feed text.
    pub link: String,
    /// RFC 3339 UTC timestamp, or empty when the entry carried no usable date
    pub published: String,
    pub summary: String,
    pub source: String,
}

impl Article {
    /// Sort key for `published`; `None` orders before every real date.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_lenient(&self.published)
    }
}

/// Turn one parsed entry into an [`Article`], substituting defaults for
/// anything missing. Never fails, so a sparse entry cannot take its
/// siblings down with it.
pub fn normalize(entry: Entry, feed_title: Option<&str>, source_url: &str) -> Article {
    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let link = primary_link(&entry.links)
        .map(|l| l.href.trim().to_string())
        .unwrap_or_default();

    let published = entry
        .published
        .or(entry.updated)
        .map(format_timestamp)
        .unwrap_or_default();

    let summary = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    let source = feed_title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(source_url)
        .to_string();

    Article {
        title,
        link,
        published,
        summary,
        source,
    }
}

/// The entry's alternate link, falling back to whatever comes first.
fn primary_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| match l.rel.as_deref() {
            None => true,
            Some(rel) => rel.eq_ignore_ascii_case("alternate"),
        })
        .or_else(|| links.first())
}
