//! Google News RSS adapter. Feed-style: one request per query, never paginated.

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, read_bytes, transport_error};
use super::{Page, RawItem, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://news.google.com/rss/search";

/// One feed entry. `published` falls back to the entry's `updated` date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawNewsEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct NewsApi {
    client: Client,
    base_url: String,
    locale: NewsLocale,
}

/// Edition parameters sent with every search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsLocale {
    pub hl: String,
    pub gl: String,
    pub ceid: String,
}

impl Default for NewsLocale {
    fn default() -> Self {
        Self {
            hl: "en-US".into(),
            gl: "US".into(),
            ceid: "US:en".into(),
        }
    }
}

impl NewsApi {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(user_agent)?,
            base_url: base_url.into(),
            locale: NewsLocale::default(),
        })
    }

    pub fn with_locale(mut self, locale: NewsLocale) -> Self {
        self.locale = locale;
        self
    }

    /// Run one feed search. Always a terminal page.
    pub fn search(&self, query: &str) -> Result<Page, SourceError> {
        tracing::debug!(query, "news: feed search");
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("hl", self.locale.hl.as_str()),
                ("gl", self.locale.gl.as_str()),
                ("ceid", self.locale.ceid.as_str()),
            ])
            .send()
            .map_err(transport_error)?;

        parse_feed(&read_bytes(resp)?)
    }
}

/// Parse an RSS/Atom document into a terminal page of entries.
pub fn parse_feed(bytes: &[u8]) -> Result<Page, SourceError> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| SourceError::Decode(format!("news feed: {e}")))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            RawItem::NewsEntry(RawNewsEntry {
                id: Some(entry.id).filter(|id| !id.is_empty()),
                title: entry.title.map(|t| t.content),
                link: entry.links.first().map(|l| l.href.clone()),
                published: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc)),
            })
        })
        .collect();

    Ok(Page::last(items))
}
