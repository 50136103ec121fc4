//! X (Twitter) adapter over the twitterapi.io REST endpoints.
//!
//! Two paginated endpoints share one client: advanced search (query string)
//! and a user's latest posts (user id). Both return a `next_cursor` plus a
//! `has_next_page` flag; the cursor is only honored while the flag is set.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, read_text, transport_error};
use super::{Cursor, Page, RawItem, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://api.twitterapi.io";

/// Ranking requested from the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum XQueryType {
    Latest,
    #[default]
    Top,
}

impl XQueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            XQueryType::Latest => "Latest",
            XQueryType::Top => "Top",
        }
    }
}

/// A tweet as returned by the API. Every field is optional; the normalizer decides
/// what is required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTweet {
    pub id: Option<String>,
    pub url: Option<String>,
    pub text: Option<String>,
    pub created_at: Option<String>,
    pub like_count: Option<i64>,
    pub retweet_count: Option<i64>,
    pub reply_count: Option<i64>,
    pub view_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tweets: Option<Vec<RawTweet>>,
    has_next_page: Option<bool>,
    next_cursor: Option<String>,
    status: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    data: Option<TimelineData>,
    tweets: Option<Vec<RawTweet>>,
    has_next_page: Option<bool>,
    next_cursor: Option<String>,
    status: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimelineData {
    tweets: Option<Vec<RawTweet>>,
}

/// Client for the X endpoints.
#[derive(Clone)]
pub struct XApi {
    client: Client,
    base_url: String,
    api_key: String,
    query_type: XQueryType,
}

impl XApi {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        query_type: XQueryType,
        user_agent: &str,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(user_agent)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            query_type,
        })
    }

    /// One page of advanced search results.
    pub fn search(&self, query: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        let url = format!("{}/twitter/tweet/advanced_search", self.base_url);
        let cursor = cursor.map(Cursor::as_str).unwrap_or("");
        tracing::debug!(query, cursor, "x: search page");

        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[
                ("query", query),
                ("queryType", self.query_type.as_str()),
                ("cursor", cursor),
            ])
            .send()
            .map_err(transport_error)?;

        parse_search_page(&read_text(resp)?)
    }

    /// One page of a user's latest posts.
    pub fn user_timeline(&self, user_id: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        let url = format!("{}/twitter/user/last_tweets", self.base_url);
        let cursor = cursor.map(Cursor::as_str).unwrap_or("");
        tracing::debug!(user_id, cursor, "x: timeline page");

        let resp = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("userId", user_id), ("cursor", cursor)])
            .send()
            .map_err(transport_error)?;

        parse_timeline_page(&read_text(resp)?)
    }
}

/// Parse an advanced-search response body.
pub fn parse_search_page(body: &str) -> Result<Page, SourceError> {
    let resp: SearchResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Decode(format!("x search response: {e}")))?;
    check_api_status(resp.status.as_deref(), resp.msg)?;
    Ok(to_page(
        resp.tweets.unwrap_or_default(),
        resp.has_next_page.unwrap_or(false),
        resp.next_cursor,
    ))
}

/// Parse a user-timeline response body. Tweets usually sit under `data.tweets`;
/// a top-level `tweets` array is accepted as well. A `null` array is an empty page.
pub fn parse_timeline_page(body: &str) -> Result<Page, SourceError> {
    let resp: TimelineResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::Decode(format!("x timeline response: {e}")))?;
    check_api_status(resp.status.as_deref(), resp.msg)?;
    let nested = resp.data.and_then(|d| d.tweets).unwrap_or_default();
    let tweets = if nested.is_empty() {
        resp.tweets.unwrap_or_default()
    } else {
        nested
    };
    Ok(to_page(
        tweets,
        resp.has_next_page.unwrap_or(false),
        resp.next_cursor,
    ))
}

fn check_api_status(status: Option<&str>, msg: Option<String>) -> Result<(), SourceError> {
    if status == Some("error") {
        return Err(SourceError::Api(
            msg.unwrap_or_else(|| "unspecified error".into()),
        ));
    }
    Ok(())
}

fn to_page(tweets: Vec<RawTweet>, has_next_page: bool, next_cursor: Option<String>) -> Page {
    let items = tweets.into_iter().map(RawItem::Tweet).collect();
    match next_cursor.filter(|c| !c.is_empty()) {
        Some(cursor) if has_next_page => Page::more(items, Cursor::new(cursor)),
        _ => Page::last(items),
    }
}
