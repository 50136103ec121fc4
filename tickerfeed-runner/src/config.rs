//! Serializable run configuration.
//!
//! One TOML file drives a run: lookback window and work bounds, store
//! location, and the per-source query lists. Every section has defaults, so
//! an empty file is a valid config that reproduces the stock query set.
//! Credentials never live here; see [`Credentials`].

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tickerfeed_core::domain::SourceKind;
use tickerfeed_core::source::http::DEFAULT_USER_AGENT;
use tickerfeed_core::source::news::NewsLocale;
use tickerfeed_core::source::x::XQueryType;
use tickerfeed_core::source::RedditCredentials;
use tickerfeed_core::store::TableNames;

pub const ENV_X_API_KEY: &str = "TWITTER_API_KEY";
pub const ENV_REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse config TOML: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("{source_kind} has {units} planned units but {var} is not set")]
    MissingCredential {
        source_kind: SourceKind,
        var: &'static str,
        units: usize,
    },

    #[error("failed to set up {source_kind} client: {message}")]
    Client {
        source_kind: SourceKind,
        message: String,
    },
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub run: RunSettings,
    pub store: StoreSettings,
    pub x: XSettings,
    pub reddit: RedditSettings,
    pub news: NewsSettings,
    pub tickers: Vec<TickerConfig>,
}

/// Work bounds for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// `since = now - lookback_hours`.
    pub lookback_hours: u32,
    /// Page ceiling for paginated units.
    pub page_cap: u32,
    pub max_items_per_unit: usize,
    /// Wall-clock budget, checked between units.
    pub deadline_secs: Option<u64>,
    /// Fetch comment trees of newly written posts.
    pub fetch_comments: bool,
    pub user_agent: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 12,
            page_cap: 1,
            max_items_per_unit: 500,
            deadline_secs: Some(900),
            fetch_comments: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub root: PathBuf,
    pub dataset: String,
    pub tables: TableNames,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            dataset: "market_pulse".into(),
            tables: TableNames::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XSettings {
    pub enabled: bool,
    pub base_url: String,
    pub query_type: XQueryType,
    /// Market-wide queries, planned untagged.
    pub queries: Vec<String>,
    pub users: Vec<XUser>,
}

impl Default for XSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: tickerfeed_core::source::x::DEFAULT_BASE_URL.into(),
            query_type: XQueryType::Top,
            queries: default_x_queries(),
            users: Vec::new(),
        }
    }
}

/// An account whose latest posts are fetched as a timeline unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XUser {
    #[serde(default)]
    pub tag: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub enabled: bool,
    pub subreddits: Vec<String>,
    /// Listing page size, 1..=100.
    pub posts_limit: u32,
    pub comment_limit: u32,
    pub comment_depth: u32,
    /// `more` placeholders expanded per post.
    pub more_limit: u32,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            subreddits: vec!["wallstreetbets".into()],
            posts_limit: 10,
            comment_limit: 100,
            comment_depth: 5,
            more_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Edition sent as `hl`, `gl` and `ceid`.
    pub locale: NewsLocale,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: tickerfeed_core::source::news::DEFAULT_BASE_URL.into(),
            locale: NewsLocale::default(),
        }
    }
}

/// A tracked ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerConfig {
    pub symbol: String,
    pub company: String,
    /// X search keywords, e.g. `$AAPL`. Empty means no ticker-tagged X unit.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TickerConfig {
    pub fn new(symbol: &str, company: &str) -> Self {
        Self {
            symbol: symbol.into(),
            company: company.into(),
            keywords: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// Defaults plus the stock ticker list.
    pub fn starter() -> Self {
        Self {
            tickers: default_tickers(),
            ..Self::default()
        }
    }

    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.run.page_cap == 0 {
            return invalid("run.page_cap must be at least 1".into());
        }
        if self.run.max_items_per_unit == 0 {
            return invalid("run.max_items_per_unit must be at least 1".into());
        }
        if !(1..=100).contains(&self.reddit.posts_limit) {
            return invalid(format!(
                "reddit.posts_limit must be within 1..=100, got {}",
                self.reddit.posts_limit
            ));
        }
        if let Some(table) = self.store.tables.duplicates().first() {
            return invalid(format!("store.tables maps more than one record kind to '{table}'"));
        }
        if let Some(t) = self
            .tickers
            .iter()
            .find(|t| t.symbol.trim().is_empty() || t.company.trim().is_empty())
        {
            return invalid(format!("ticker entry {t:?} needs a symbol and a company"));
        }
        if let Some(sub) = self.reddit.subreddits.iter().find(|s| s.trim().is_empty()) {
            return invalid(format!("empty subreddit name {sub:?}"));
        }
        if let Some(user) = self.x.users.iter().find(|u| u.user_id.trim().is_empty()) {
            return invalid(format!("x user {user:?} has no user_id"));
        }
        Ok(())
    }

    /// Lower time bound of a run started at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::hours(i64::from(self.run.lookback_hours))
    }

    pub fn source_enabled(&self, source: SourceKind) -> bool {
        match source {
            SourceKind::X => self.x.enabled,
            SourceKind::Reddit => self.reddit.enabled,
            SourceKind::News => self.news.enabled,
        }
    }
}

/// API credentials, taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub x_api_key: Option<String>,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        Self {
            x_api_key: get(ENV_X_API_KEY),
            reddit_client_id: get(ENV_REDDIT_CLIENT_ID),
            reddit_client_secret: get(ENV_REDDIT_CLIENT_SECRET),
        }
    }

    /// The Reddit app credentials, or the name of the first unset variable.
    pub fn reddit(&self) -> Result<RedditCredentials, &'static str> {
        let client_id = self.reddit_client_id.clone().ok_or(ENV_REDDIT_CLIENT_ID)?;
        let client_secret = self
            .reddit_client_secret
            .clone()
            .ok_or(ENV_REDDIT_CLIENT_SECRET)?;
        Ok(RedditCredentials {
            client_id,
            client_secret,
        })
    }
}

fn default_tickers() -> Vec<TickerConfig> {
    [
        ("AAPL", "Apple"),
        ("GOOGL", "Google"),
        ("AMZN", "Amazon"),
        ("TSLA", "Tesla"),
        ("MSFT", "Microsoft"),
    ]
    .into_iter()
    .map(|(symbol, company)| TickerConfig::new(symbol, company))
    .collect()
}

fn default_x_queries() -> Vec<String> {
    [
        "Federal Reserve OR interest rates OR inflation OR recession OR economic growth OR GDP \
         OR CPI OR PPI OR stock market crash OR stock market rally OR Wall Street reaction",
        "bought stock OR sold stock OR investing in OR stock went up OR stock went down \
         OR stock trading OR buying stocks OR stock prediction",
        "#StockMarket OR #Stocks OR #Investing OR #OptionsTrading OR #Earnings OR #WallStreet \
         #Bullish OR #Bearish OR #MarketCrash OR #Recession OR #Inflation OR #FederalReserve",
        "stock market OR stocks OR trading OR investing OR Wall Street OR bull market OR bull \
         OR bear OR bear market OR economic crash OR interest rates OR Federal Reserve OR rate \
         hike OR GDP OR CPI OR PPI OR earnings report OR inflation data OR bond yields OR market \
         volatility",
        "from:CNBC OR from:WSJMarkets OR from:Bloomberg OR from:FinancialTimes OR from:ReutersBiz \
         OR from:Stocktwits OR from:zerohedge OR from:business OR from:realDonaldTrump",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
