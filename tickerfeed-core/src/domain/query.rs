//! Source kinds, query kinds, and the per-run unit of fan-out work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream system a record came from. Part of every natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Reddit,
    X,
    News,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Reddit, SourceKind::X, SourceKind::News];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Reddit => "reddit",
            SourceKind::X => "x",
            SourceKind::News => "news",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reddit" => Ok(SourceKind::Reddit),
            "x" | "twitter" => Ok(SourceKind::X),
            "news" => Ok(SourceKind::News),
            other => Err(format!("unknown source '{other}' (expected reddit, x, news)")),
        }
    }
}

/// Shape of the fetch: how a source is paged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Free-text query, cursor paginated.
    Search,
    /// A user's (or community's) item stream, cursor paginated.
    Timeline,
    /// One-shot fetch, never paginated.
    Feed,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Search => "search",
            QueryKind::Timeline => "timeline",
            QueryKind::Feed => "feed",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independent fetch task.
///
/// Built fresh by the planner each run and owned by the pagination that
/// consumes it. `target` is the query string, user id, community name, or
/// parent post id depending on `kind` and `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryUnit {
    /// Ticker, subreddit, or empty for market-wide queries.
    pub tag: String,
    pub source: SourceKind,
    pub kind: QueryKind,
    pub target: String,
    /// Lower time bound already embedded into `target` where the source supports it.
    pub since: Option<DateTime<Utc>>,
    pub page_cap: u32,
    /// Parent post id for phase-two comment units.
    pub parent: Option<String>,
}

impl QueryUnit {
    pub fn new(source: SourceKind, kind: QueryKind, tag: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            source,
            kind,
            target: target.into(),
            since: None,
            page_cap: 1,
            parent: None,
        }
    }

    pub fn with_page_cap(mut self, page_cap: u32) -> Self {
        self.page_cap = page_cap;
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Phase-two unit fetching the comment tree of one post.
    pub fn comments_of(post_id: &str, tag: impl Into<String>) -> Self {
        let mut unit = Self::new(SourceKind::Reddit, QueryKind::Feed, tag, post_id);
        unit.parent = Some(post_id.to_string());
        unit
    }

    /// Short human-readable identity used in logs and run reports.
    pub fn label(&self) -> String {
        const MAX_TARGET: usize = 48;
        let target: String = if self.target.chars().count() > MAX_TARGET {
            let head: String = self.target.chars().take(MAX_TARGET).collect();
            format!("{head}…")
        } else {
            self.target.clone()
        };
        if self.tag.is_empty() {
            format!("{}/{} {target}", self.source, self.kind)
        } else {
            format!("{}/{}[{}] {target}", self.source, self.kind, self.tag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_parses_aliases() {
        assert_eq!("twitter".parse::<SourceKind>().unwrap(), SourceKind::X);
        assert_eq!("Reddit".parse::<SourceKind>().unwrap(), SourceKind::Reddit);
        assert!("mastodon".parse::<SourceKind>().is_err());
    }

    #[test]
    fn label_truncates_long_targets() {
        let unit = QueryUnit::new(SourceKind::X, QueryKind::Search, "AAPL", "a".repeat(200));
        let label = unit.label();
        assert!(label.starts_with("x/search[AAPL] "));
        assert!(label.chars().count() < 80);
    }

    #[test]
    fn comment_unit_records_parent() {
        let unit = QueryUnit::comments_of("p1", "wallstreetbets");
        assert_eq!(unit.kind, QueryKind::Feed);
        assert_eq!(unit.parent.as_deref(), Some("p1"));
        assert_eq!(unit.target, "p1");
    }
}
