//! Domain types for tickerfeed

pub mod key;
pub mod query;
pub mod record;

pub use key::{KeySnapshot, NaturalKey};
pub use query::{QueryKind, QueryUnit, SourceKind};
pub use record::{
    Annotations, Comment, NewsItem, Post, Record, RecordKind, Row, SocialMessage,
};
