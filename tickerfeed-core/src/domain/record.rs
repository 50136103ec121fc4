//! Canonical normalized records.
//!
//! Every source item becomes one of four record variants. Records are built
//! once by the normalizer and handed along by value; nothing mutates them
//! afterwards. The annotation slots are filled by a downstream stage, so the
//! ingestion core always leaves them empty.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use super::key::NaturalKey;
use super::query::SourceKind;

/// A store row: column name → JSON value. Timestamps are RFC 3339 strings.
pub type Row = Map<String, Value>;

/// Reserved output slots, populated downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub sentiment: Option<String>,
    pub market_reference: Option<String>,
}

/// A top-level community post (Reddit submission).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    pub tag: String,
    pub title: String,
    pub body: Option<String>,
    pub upvotes: Option<i64>,
    pub comments_count: Option<i64>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub annotations: Annotations,
}

/// A reply inside a post's comment tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    pub tag: String,
    pub post_id: String,
    pub body: Option<String>,
    pub upvotes: Option<i64>,
    pub annotations: Annotations,
    pub agrees_with_post: Option<bool>,
}

/// A short-form social message (tweet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    pub tag: String,
    pub text: Option<String>,
    pub likes: Option<i64>,
    pub retweets: Option<i64>,
    pub replies: Option<i64>,
    pub views: Option<i64>,
    pub url: Option<String>,
    pub annotations: Annotations,
}

/// A headline from a news feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    pub tag: String,
    pub title: String,
    pub publisher: String,
    pub url: Option<String>,
    pub annotations: Annotations,
}

/// Which record variant; selects the destination table and its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Post,
    Comment,
    SocialMessage,
    NewsItem,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Post,
        RecordKind::Comment,
        RecordKind::SocialMessage,
        RecordKind::NewsItem,
    ];
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Post => "post",
            RecordKind::Comment => "comment",
            RecordKind::SocialMessage => "social_message",
            RecordKind::NewsItem => "news_item",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Post(Post),
    Comment(Comment),
    SocialMessage(SocialMessage),
    NewsItem(NewsItem),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Post(_) => RecordKind::Post,
            Record::Comment(_) => RecordKind::Comment,
            Record::SocialMessage(_) => RecordKind::SocialMessage,
            Record::NewsItem(_) => RecordKind::NewsItem,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Post(r) => &r.id,
            Record::Comment(r) => &r.id,
            Record::SocialMessage(r) => &r.id,
            Record::NewsItem(r) => &r.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Post(r) => r.created_at,
            Record::Comment(r) => r.created_at,
            Record::SocialMessage(r) => r.created_at,
            Record::NewsItem(r) => r.created_at,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        match self {
            Record::Post(r) => r.source_kind,
            Record::Comment(r) => r.source_kind,
            Record::SocialMessage(r) => r.source_kind,
            Record::NewsItem(r) => r.source_kind,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Record::Post(r) => &r.tag,
            Record::Comment(r) => &r.tag,
            Record::SocialMessage(r) => &r.tag,
            Record::NewsItem(r) => &r.tag,
        }
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.source_kind(), self.id())
    }

    /// Flatten into a store row. Column names match [`crate::store::TableSchema::for_kind`].
    pub fn to_row(&self) -> Row {
        let value = match self {
            Record::Post(p) => json!({
                "id": p.id,
                "source_kind": p.source_kind.as_str(),
                "tag": p.tag,
                "created_utc": timestamp(p.created_at),
                "title": p.title,
                "body": p.body,
                "upvotes": p.upvotes,
                "comments_count": p.comments_count,
                "url": p.url,
                "image_url": p.image_url,
                "sentiment": p.annotations.sentiment,
                "market_reference": p.annotations.market_reference,
            }),
            Record::Comment(c) => json!({
                "id": c.id,
                "source_kind": c.source_kind.as_str(),
                "tag": c.tag,
                "created_utc": timestamp(c.created_at),
                "post_id": c.post_id,
                "body": c.body,
                "upvotes": c.upvotes,
                "sentiment": c.annotations.sentiment,
                "market_reference": c.annotations.market_reference,
                "agrees_with_post": c.agrees_with_post,
            }),
            Record::SocialMessage(m) => json!({
                "id": m.id,
                "source_kind": m.source_kind.as_str(),
                "tag": m.tag,
                "created_utc": timestamp(m.created_at),
                "text": m.text,
                "likes": m.likes,
                "retweets": m.retweets,
                "replies": m.replies,
                "views": m.views,
                "url": m.url,
                "sentiment": m.annotations.sentiment,
                "market_reference": m.annotations.market_reference,
            }),
            Record::NewsItem(n) => json!({
                "id": n.id,
                "source_kind": n.source_kind.as_str(),
                "tag": n.tag,
                "created_utc": timestamp(n.created_at),
                "title": n.title,
                "source": n.publisher,
                "url": n.url,
                "sentiment": n.annotations.sentiment,
                "market_reference": n.annotations.market_reference,
            }),
        };
        match value {
            Value::Object(row) => row,
            _ => Row::new(),
        }
    }
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
