//! Raw source items → canonical [`Record`]s.
//!
//! A pure mapping: missing optional fields become `None`, nothing panics. An
//! item without an id or a usable timestamp cannot be windowed or deduplicated
//! downstream, so it is dropped and counted instead of propagated.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Annotations, Comment, NewsItem, Post, Record, SocialMessage, SourceKind,
};
use crate::source::{RawItem, RawNewsEntry, RawRedditComment, RawRedditPost, RawTweet};

/// X timestamp layout, e.g. `Tue Mar 11 14:02:11 +0000 2025`.
const X_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

const IMAGE_SUFFIXES: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

const REDDIT_ORIGIN: &str = "https://www.reddit.com";

/// Provenance attached to every record of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeContext {
    pub source: SourceKind,
    pub tag: String,
}

impl NormalizeContext {
    pub fn new(source: SourceKind, tag: impl Into<String>) -> Self {
        Self {
            source,
            tag: tag.into(),
        }
    }
}

/// Why an item was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("item has no id")]
    MissingId,

    #[error("item {id} has no timestamp")]
    MissingTimestamp { id: String },

    #[error("item {id} has unparsable timestamp '{raw}'")]
    BadTimestamp { id: String, raw: String },
}

/// Output of normalizing one page worth of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<Record>,
    pub dropped: usize,
}

/// Normalize one item.
pub fn normalize(raw: RawItem, ctx: &NormalizeContext) -> Result<Record, NormalizeError> {
    match raw {
        RawItem::Tweet(t) => normalize_tweet(t, ctx).map(Record::SocialMessage),
        RawItem::RedditPost(p) => normalize_post(p, ctx).map(Record::Post),
        RawItem::RedditComment(c) => normalize_comment(c, ctx).map(Record::Comment),
        RawItem::NewsEntry(n) => normalize_news(n, ctx).map(Record::NewsItem),
    }
}

/// Normalize a page of items, dropping (and counting) the ones that fail.
pub fn normalize_batch(
    items: impl IntoIterator<Item = RawItem>,
    ctx: &NormalizeContext,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for item in items {
        match normalize(item, ctx) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::debug!(source = %ctx.source, tag = %ctx.tag, reason = %e, "dropping item");
                batch.dropped += 1;
            }
        }
    }
    batch
}

fn normalize_tweet(t: RawTweet, ctx: &NormalizeContext) -> Result<SocialMessage, NormalizeError> {
    let id = required_id(t.id)?;
    let created_at = match t.created_at.as_deref() {
        None => return Err(NormalizeError::MissingTimestamp { id }),
        Some(raw) => parse_x_timestamp(raw).ok_or_else(|| NormalizeError::BadTimestamp {
            id: id.clone(),
            raw: raw.to_string(),
        })?,
    };

    Ok(SocialMessage {
        id,
        created_at,
        source_kind: ctx.source,
        tag: ctx.tag.clone(),
        text: t.text,
        likes: t.like_count,
        retweets: t.retweet_count,
        replies: t.reply_count,
        views: t.view_count,
        url: t.url,
        annotations: Annotations::default(),
    })
}

fn normalize_post(p: RawRedditPost, ctx: &NormalizeContext) -> Result<Post, NormalizeError> {
    let id = required_id(p.id)?;
    let created_at = epoch_timestamp(&id, p.created_utc)?;
    let image_url = p.url.filter(|u| is_image_url(u));

    Ok(Post {
        id,
        created_at,
        source_kind: ctx.source,
        tag: ctx.tag.clone(),
        title: p.title.unwrap_or_default(),
        body: p.selftext.filter(|s| !s.is_empty()),
        upvotes: p.score,
        comments_count: p.num_comments,
        url: p.permalink.map(|link| absolute_permalink(&link)),
        image_url,
        annotations: Annotations::default(),
    })
}

fn normalize_comment(
    c: RawRedditComment,
    ctx: &NormalizeContext,
) -> Result<Comment, NormalizeError> {
    let id = required_id(c.id)?;
    let created_at = epoch_timestamp(&id, c.created_utc)?;

    Ok(Comment {
        id,
        created_at,
        source_kind: ctx.source,
        tag: ctx.tag.clone(),
        post_id: c.post_id,
        body: c.body,
        upvotes: c.score,
        annotations: Annotations::default(),
        agrees_with_post: None,
    })
}

fn normalize_news(n: RawNewsEntry, ctx: &NormalizeContext) -> Result<NewsItem, NormalizeError> {
    let raw_title = n.title.unwrap_or_default();
    let id = match n.id {
        Some(id) => id,
        None if !raw_title.is_empty() => blake3::hash(raw_title.as_bytes()).to_hex().to_string(),
        None => return Err(NormalizeError::MissingId),
    };
    let created_at = n
        .published
        .ok_or_else(|| NormalizeError::MissingTimestamp { id: id.clone() })?;
    let (title, publisher) = split_publisher(&raw_title);

    Ok(NewsItem {
        id,
        created_at,
        source_kind: ctx.source,
        tag: ctx.tag.clone(),
        title,
        publisher,
        url: n.link,
        annotations: Annotations::default(),
    })
}

fn required_id(id: Option<String>) -> Result<String, NormalizeError> {
    id.filter(|id| !id.trim().is_empty())
        .ok_or(NormalizeError::MissingId)
}

fn epoch_timestamp(id: &str, secs: Option<f64>) -> Result<DateTime<Utc>, NormalizeError> {
    let secs = secs.ok_or_else(|| NormalizeError::MissingTimestamp { id: id.to_string() })?;
    parse_epoch_seconds(secs).ok_or_else(|| NormalizeError::BadTimestamp {
        id: id.to_string(),
        raw: secs.to_string(),
    })
}

/// Parse X's `createdAt` layout into UTC.
pub fn parse_x_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), X_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fractional epoch seconds (Reddit's `created_utc`) into UTC.
pub fn parse_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

/// Whether a link points straight at an image, judged by its path suffix.
pub fn is_image_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    IMAGE_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

fn absolute_permalink(link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else {
        format!("{REDDIT_ORIGIN}{link}")
    }
}

/// Google News titles read `"Headline - Publisher"`; split the publisher off.
fn split_publisher(raw: &str) -> (String, String) {
    match raw.rsplit_once(" - ") {
        Some((headline, publisher)) if !headline.trim().is_empty() && !publisher.trim().is_empty() => {
            (headline.trim().to_string(), publisher.trim().to_string())
        }
        _ => (raw.trim().to_string(), "Unknown".to_string()),
    }
}
