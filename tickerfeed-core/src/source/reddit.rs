//! Reddit adapter: community listings and per-post comment trees.
//!
//! Uses application-only OAuth (client credentials). The bearer token is
//! requested lazily on the first call and reused for the lifetime of the
//! adapter; clones share the cached token.
//!
//! - Listing: `GET /r/{community}/new?limit=&after=`, paginated by `after`.
//! - Comments: `GET /comments/{post}?limit=&depth=`, one shot, the tree is
//!   flattened depth-first. Up to `more_limit` of its `more` placeholders are
//!   expanded through `GET /api/morechildren`; the rest are skipped.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use super::http::{build_client, read_text, transport_error};
use super::{Cursor, Page, RawItem, SourceError};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";

/// Child ids accepted by one `morechildren` request.
const MORE_CHILDREN_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// A submission from a listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRedditPost {
    pub id: Option<String>,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub created_utc: Option<f64>,
    pub permalink: Option<String>,
    pub url: Option<String>,
}

/// One comment of a post's tree. `post_id` is filled by the adapter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRedditComment {
    pub id: Option<String>,
    pub body: Option<String>,
    pub score: Option<i64>,
    pub created_utc: Option<f64>,
    pub link_id: Option<String>,
    #[serde(skip)]
    pub post_id: String,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Thing<T>>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Client for the Reddit OAuth API.
#[derive(Clone)]
pub struct RedditApi {
    client: Client,
    credentials: RedditCredentials,
    api_base: String,
    token: Arc<Mutex<Option<String>>>,
    listing_limit: u32,
    comment_limit: u32,
    comment_depth: u32,
    more_limit: u32,
}

/// A post's comments after the first request: flattened comments plus the
/// child ids of each `more` placeholder, in tree order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentTree {
    pub items: Vec<RawItem>,
    pub more: Vec<Vec<String>>,
}

impl RedditApi {
    pub fn new(credentials: RedditCredentials, user_agent: &str) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(user_agent)?,
            credentials,
            api_base: DEFAULT_API_BASE.to_string(),
            token: Arc::new(Mutex::new(None)),
            listing_limit: 10,
            comment_limit: 100,
            comment_depth: 5,
            more_limit: 5,
        })
    }

    /// Items per listing page (Reddit caps this at 100).
    pub fn with_listing_limit(mut self, limit: u32) -> Self {
        self.listing_limit = limit.clamp(1, 100);
        self
    }

    pub fn with_comment_limits(mut self, limit: u32, depth: u32) -> Self {
        self.comment_limit = limit;
        self.comment_depth = depth;
        self
    }

    /// How many `more` placeholders per post get expanded. Zero skips them all.
    pub fn with_more_limit(mut self, more_limit: u32) -> Self {
        self.more_limit = more_limit;
        self
    }

    /// One page of the newest submissions in a community.
    pub fn listing(&self, community: &str, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        let url = format!("{}/r/{}/new", self.api_base, community);
        let limit = self.listing_limit.to_string();
        let mut query = vec![("limit", limit.as_str()), ("raw_json", "1")];
        if let Some(after) = cursor {
            query.push(("after", after.as_str()));
        }
        tracing::debug!(community, after = ?cursor.map(Cursor::as_str), "reddit: listing page");

        let body = self.get(&url, &query)?;
        parse_listing_page(&body)
    }

    /// The comment tree of one post, bounded by limit, depth and `more_limit`.
    pub fn comments(&self, post_id: &str) -> Result<Page, SourceError> {
        let url = format!("{}/comments/{}", self.api_base, post_id);
        let limit = self.comment_limit.to_string();
        let depth = self.comment_depth.to_string();
        tracing::debug!(post_id, "reddit: comment tree");

        let body = self.get(
            &url,
            &[
                ("limit", limit.as_str()),
                ("depth", depth.as_str()),
                ("raw_json", "1"),
            ],
        )?;
        let tree = parse_comment_tree(&body, post_id)?;
        let mut items = tree.items;

        let link_id = format!("t3_{post_id}");
        let url = format!("{}/api/morechildren", self.api_base);
        for children in tree
            .more
            .into_iter()
            .filter(|c| !c.is_empty())
            .take(self.more_limit as usize)
        {
            let ids = children
                .iter()
                .take(MORE_CHILDREN_BATCH)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",");
            tracing::debug!(post_id, children = children.len(), "reddit: expanding more");
            let body = self.get(
                &url,
                &[
                    ("api_type", "json"),
                    ("link_id", link_id.as_str()),
                    ("children", ids.as_str()),
                    ("raw_json", "1"),
                ],
            )?;
            items.extend(parse_more_children(&body, post_id)?);
        }

        Ok(Page::last(items))
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, SourceError> {
        let token = self.access_token()?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .map_err(transport_error)?;

        let result = read_text(resp);
        if matches!(result, Err(SourceError::Auth { .. })) {
            // Expired or revoked; the next call fetches a fresh token.
            *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }
        result
    }

    fn access_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let resp = self
            .client
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .map_err(transport_error)?;

        let body = read_text(resp)?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Decode(format!("reddit token response: {e}")))?;

        match parsed.access_token {
            Some(token) => {
                *cached = Some(token.clone());
                Ok(token)
            }
            None => Err(SourceError::Auth {
                status: 200,
                message: parsed
                    .error
                    .unwrap_or_else(|| "token response without access_token".into()),
            }),
        }
    }
}

/// Parse a community listing. Only `t3` (submission) children are kept.
pub fn parse_listing_page(body: &str) -> Result<Page, SourceError> {
    let listing: Listing<RawRedditPost> = serde_json::from_str(body)
        .map_err(|e| SourceError::Decode(format!("reddit listing: {e}")))?;

    let items = listing
        .data
        .children
        .into_iter()
        .filter(|thing| thing.kind == "t3")
        .map(|thing| RawItem::RedditPost(thing.data))
        .collect();

    Ok(match listing.data.after.filter(|a| !a.is_empty()) {
        Some(after) => Page::more(items, Cursor::new(after)),
        None => Page::last(items),
    })
}

/// Parse a `/comments/{post}` response: `[post_listing, comment_listing]`.
pub fn parse_comment_tree(body: &str, post_id: &str) -> Result<CommentTree, SourceError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SourceError::Decode(format!("reddit comments: {e}")))?;

    let comment_listing = value
        .as_array()
        .and_then(|parts| parts.get(1))
        .ok_or_else(|| {
            SourceError::Decode("reddit comments: expected [post, comments] array".into())
        })?;

    let mut tree = CommentTree::default();
    collect_comments(comment_listing, post_id, &mut tree);
    Ok(tree)
}

/// Parse a `/api/morechildren` response. Things arrive flat; nested `more`
/// entries are not followed.
pub fn parse_more_children(body: &str, post_id: &str) -> Result<Vec<RawItem>, SourceError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SourceError::Decode(format!("reddit morechildren: {e}")))?;

    if let Some(errors) = value
        .pointer("/json/errors")
        .and_then(Value::as_array)
        .filter(|e| !e.is_empty())
    {
        return Err(SourceError::Api(format!("reddit morechildren: {errors:?}")));
    }

    let things = value
        .pointer("/json/data/things")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Decode("reddit morechildren: missing json.data.things".into()))?;

    Ok(things
        .iter()
        .filter(|thing| thing.get("kind").and_then(Value::as_str) == Some("t1"))
        .filter_map(|thing| thing.get("data"))
        .filter_map(|data| comment_from(data, post_id))
        .map(RawItem::RedditComment)
        .collect())
}

fn collect_comments(listing: &Value, post_id: &str, tree: &mut CommentTree) {
    let Some(children) = listing.pointer("/data/children").and_then(Value::as_array) else {
        return;
    };

    for child in children {
        let Some(data) = child.get("data") else {
            continue;
        };
        match child.get("kind").and_then(Value::as_str) {
            Some("t1") => {}
            Some("more") => {
                let ids: Vec<String> = data
                    .get("children")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                tree.more.push(ids);
                continue;
            }
            _ => continue,
        }

        if let Some(comment) = comment_from(data, post_id) {
            tree.items.push(RawItem::RedditComment(comment));
        }

        // `replies` is an empty string for leaves and a nested listing otherwise.
        if let Some(replies) = data.get("replies").filter(|r| r.is_object()) {
            collect_comments(replies, post_id, tree);
        }
    }
}

fn comment_from(data: &Value, post_id: &str) -> Option<RawRedditComment> {
    match RawRedditComment::deserialize(data) {
        Ok(mut comment) => {
            comment.post_id = comment
                .link_id
                .as_deref()
                .map(|l| l.trim_start_matches("t3_").to_string())
                .unwrap_or_else(|| post_id.to_string());
            Some(comment)
        }
        Err(e) => {
            tracing::debug!(post_id, error = %e, "reddit: skipping malformed comment");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_page_keeps_submissions_and_cursor() {
        let body = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_abc",
                "children": [
                    {"kind": "t3", "data": {"id": "abc", "title": "GME to the moon", "selftext": "",
                        "score": 120, "num_comments": 45, "created_utc": 1741700000.0,
                        "permalink": "/r/wallstreetbets/comments/abc/gme/", "url": "https://i.redd.it/x.png"}},
                    {"kind": "t5", "data": {"id": "sub"}}
                ]
            }
        }"#;
        let page = parse_listing_page(body).unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(Cursor::new("t3_abc")));
        assert_eq!(page.items.len(), 1);
        match &page.items[0] {
            RawItem::RedditPost(p) => {
                assert_eq!(p.id.as_deref(), Some("abc"));
                assert_eq!(p.num_comments, Some(45));
            }
            other => panic!("expected post, got {other:?}"),
        }
    }

    #[test]
    fn listing_without_after_is_last_page() {
        let body = r#"{"data": {"after": null, "children": []}}"#;
        let page = parse_listing_page(body).unwrap();
        assert!(!page.has_more);
        assert!(page.items.is_empty());
    }

    #[test]
    fn comment_tree_is_flattened_depth_first() {
        let body = r#"[
            {"data": {"children": [{"kind": "t3", "data": {"id": "abc"}}]}},
            {"data": {"children": [
                {"kind": "t1", "data": {"id": "c1", "body": "first", "score": 5,
                    "created_utc": 1741700100, "link_id": "t3_abc",
                    "replies": {"data": {"children": [
                        {"kind": "t1", "data": {"id": "c2", "body": "reply", "created_utc": 1741700200,
                            "link_id": "t3_abc", "replies": ""}}
                    ]}}}},
                {"kind": "more", "data": {"count": 12, "children": ["c9"]}},
                {"kind": "t1", "data": {"id": "c3", "body": "second", "created_utc": 1741700300, "replies": ""}}
            ]}}
        ]"#;
        let tree = parse_comment_tree(body, "abc").unwrap();
        assert_eq!(tree.more, vec![vec!["c9".to_string()]]);
        let ids: Vec<_> = tree
            .items
            .iter()
            .map(|item| match item {
                RawItem::RedditComment(c) => (c.id.clone().unwrap(), c.post_id.clone()),
                other => panic!("expected comment, got {other:?}"),
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                ("c1".to_string(), "abc".to_string()),
                ("c2".to_string(), "abc".to_string()),
                ("c3".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn more_children_are_parsed_flat() {
        let body = r#"{"json": {"errors": [], "data": {"things": [
            {"kind": "t1", "data": {"id": "c9", "body": "late reply", "created_utc": 1741700400,
                "link_id": "t3_abc", "parent_id": "t1_c1", "replies": ""}},
            {"kind": "more", "data": {"count": 3, "children": ["c10"]}},
            {"kind": "t1", "data": {"id": "c11", "body": "another", "created_utc": 1741700500}}
        ]}}}"#;
        let items = parse_more_children(body, "abc").unwrap();
        let ids: Vec<_> = items
            .iter()
            .map(|item| match item {
                RawItem::RedditComment(c) => (c.id.clone().unwrap(), c.post_id.clone()),
                other => panic!("expected comment, got {other:?}"),
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                ("c9".to_string(), "abc".to_string()),
                ("c11".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn more_children_errors_are_reported() {
        let body = r#"{"json": {"errors": [["RATELIMIT", "slow down", "ratelimit"]]}}"#;
        assert!(matches!(
            parse_more_children(body, "abc"),
            Err(SourceError::Api(_))
        ));
    }

    #[test]
    fn comment_response_must_be_pair() {
        assert!(matches!(
            parse_comment_tree(r#"{"data": {}}"#, "abc"),
            Err(SourceError::Decode(_))
        ));
    }
}
