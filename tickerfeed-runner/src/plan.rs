//! Query planning: config → the run's ordered list of units.
//!
//! Units are built fresh for every run. The lookback bound is baked into X
//! search strings (`since:` operator); other sources have no server-side time
//! filter and are bounded by their page caps instead.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tickerfeed_core::domain::{QueryKind, QueryUnit, SourceKind};

use crate::config::IngestConfig;

/// The planned units of one run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub since: DateTime<Utc>,
    pub units: Vec<QueryUnit>,
}

impl QueryPlan {
    /// Plan a run starting at `now`. `only` restricts sources; empty means all
    /// enabled sources.
    pub fn build(config: &IngestConfig, now: DateTime<Utc>, only: &[SourceKind]) -> Self {
        let since = config.since(now);
        let wanted =
            |source: SourceKind| config.source_enabled(source) && (only.is_empty() || only.contains(&source));
        let page_cap = config.run.page_cap;
        let mut units = Vec::new();

        if wanted(SourceKind::News) {
            for ticker in &config.tickers {
                units.push(QueryUnit::new(
                    SourceKind::News,
                    QueryKind::Feed,
                    &ticker.symbol,
                    news_query(&ticker.company),
                ));
            }
        }

        if wanted(SourceKind::X) {
            for ticker in config.tickers.iter().filter(|t| !t.keywords.is_empty()) {
                let query = ticker.keywords.join(" OR ");
                units.push(x_search(&ticker.symbol, &query, since, page_cap));
            }
            for query in &config.x.queries {
                units.push(x_search("", query, since, page_cap));
            }
            for user in &config.x.users {
                units.push(
                    QueryUnit::new(SourceKind::X, QueryKind::Timeline, &user.tag, &user.user_id)
                        .with_since(since)
                        .with_page_cap(page_cap),
                );
            }
        }

        if wanted(SourceKind::Reddit) {
            for sub in &config.reddit.subreddits {
                units.push(
                    QueryUnit::new(SourceKind::Reddit, QueryKind::Timeline, sub, sub)
                        .with_since(since)
                        .with_page_cap(page_cap),
                );
            }
        }

        Self { since, units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units_for(&self, source: SourceKind) -> usize {
        self.units.iter().filter(|u| u.source == source).count()
    }
}

fn x_search(tag: &str, query: &str, since: DateTime<Utc>, page_cap: u32) -> QueryUnit {
    let target = format!("{query}{}", x_since_clause(since));
    QueryUnit::new(SourceKind::X, QueryKind::Search, tag, target)
        .with_since(since)
        .with_page_cap(page_cap)
}

/// ` since:YYYY-MM-DD_HH:MM:SS_UTC`, appended to X search strings.
pub fn x_since_clause(since: DateTime<Utc>) -> String {
    format!(" since:{}", since.format("%Y-%m-%d_%H:%M:%S_UTC"))
}

pub fn news_query(company: &str) -> String {
    format!("{company} stock OR {company} financial news")
}
