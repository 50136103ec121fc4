//! Source adapters: one page request in, raw items plus a continuation out.
//!
//! The [`PageSource`] trait abstracts over the fixed set of upstream APIs so the
//! pagination driver can be exercised against stubs. Real adapters live in a
//! closed [`SourceAdapter`] enum selected by `(source, query kind)`; there is no
//! open-ended plugin loading.

pub mod http;
pub mod news;
pub mod reddit;
pub mod registry;
pub mod x;

pub use news::{NewsApi, RawNewsEntry};
pub use reddit::{RawRedditComment, RawRedditPost, RedditApi, RedditCredentials};
pub use registry::SourceRegistry;
pub use x::{RawTweet, XApi};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{QueryKind, QueryUnit, SourceKind};

/// Opaque continuation token handed back by a source between pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A source item before normalization. Field shapes follow the upstream payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Tweet(RawTweet),
    RedditPost(RawRedditPost),
    RedditComment(RawRedditComment),
    NewsEntry(RawNewsEntry),
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<RawItem>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

impl Page {
    /// A terminal page: no continuation regardless of content.
    pub fn last(items: Vec<RawItem>) -> Self {
        Self {
            items,
            next_cursor: None,
            has_more: false,
        }
    }

    /// A page followed by at least one more, reachable via `cursor`.
    pub fn more(items: Vec<RawItem>, cursor: Cursor) -> Self {
        Self {
            items,
            next_cursor: Some(cursor),
            has_more: true,
        }
    }
}

/// Errors a single page fetch can fail with. Never retried by the adapter.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("rate limited (HTTP {status}){}", retry_hint(.retry_after_secs))]
    RateLimited {
        status: u16,
        retry_after_secs: Option<u64>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream API error: {0}")]
    Api(String),

    #[error("response format changed: {0}")]
    Decode(String),

    #[error("no adapter for {source_kind}/{query_kind} queries")]
    Unsupported {
        source_kind: SourceKind,
        query_kind: QueryKind,
    },
}

fn retry_hint(secs: &Option<u64>) -> String {
    secs.map(|s| format!(", retry after {s}s")).unwrap_or_default()
}

impl SourceError {
    /// HTTP status carried by the error, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Http { status, .. }
            | SourceError::Auth { status, .. }
            | SourceError::RateLimited { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Capability shared by every adapter: fetch exactly one page.
///
/// An empty page is not an error. Implementations must be deterministic in
/// their request construction so page N+1 only depends on page N's cursor.
pub trait PageSource: Send + Sync {
    /// Human-readable adapter name.
    fn name(&self) -> &str;

    fn fetch_page(&self, unit: &QueryUnit, cursor: Option<&Cursor>) -> Result<Page, SourceError>;
}

/// The closed set of real adapters.
#[derive(Clone)]
pub enum SourceAdapter {
    XSearch(XApi),
    XTimeline(XApi),
    RedditListing(RedditApi),
    RedditComments(RedditApi),
    NewsFeed(NewsApi),
}

impl SourceAdapter {
    /// The `(source, kind)` slot this adapter serves.
    pub fn route(&self) -> (SourceKind, QueryKind) {
        match self {
            SourceAdapter::XSearch(_) => (SourceKind::X, QueryKind::Search),
            SourceAdapter::XTimeline(_) => (SourceKind::X, QueryKind::Timeline),
            SourceAdapter::RedditListing(_) => (SourceKind::Reddit, QueryKind::Timeline),
            SourceAdapter::RedditComments(_) => (SourceKind::Reddit, QueryKind::Feed),
            SourceAdapter::NewsFeed(_) => (SourceKind::News, QueryKind::Feed),
        }
    }
}

impl PageSource for SourceAdapter {
    fn name(&self) -> &str {
        match self {
            SourceAdapter::XSearch(_) => "x_search",
            SourceAdapter::XTimeline(_) => "x_timeline",
            SourceAdapter::RedditListing(_) => "reddit_listing",
            SourceAdapter::RedditComments(_) => "reddit_comments",
            SourceAdapter::NewsFeed(_) => "google_news",
        }
    }

    fn fetch_page(&self, unit: &QueryUnit, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        match self {
            SourceAdapter::XSearch(api) => api.search(&unit.target, cursor),
            SourceAdapter::XTimeline(api) => api.user_timeline(&unit.target, cursor),
            SourceAdapter::RedditListing(api) => api.listing(&unit.target, cursor),
            SourceAdapter::RedditComments(api) => api.comments(&unit.target),
            SourceAdapter::NewsFeed(api) => api.search(&unit.target),
        }
    }
}
