//! Integration tests for the write path: normalize → dedup → writer → Parquet.

use chrono::{TimeZone, Utc};
use tickerfeed_core::domain::{Annotations, Comment, Post, Record, RecordKind, SourceKind};
use tickerfeed_core::normalize::{normalize_batch, NormalizeContext};
use tickerfeed_core::source::{RawItem, RawRedditPost};
use tickerfeed_core::store::{ParquetStore, RecordStore, TableNames};
use tickerfeed_core::{DedupGate, StoreWriter};

fn raw_post(id: &str, created: f64) -> RawItem {
    RawItem::RedditPost(RawRedditPost {
        id: Some(id.into()),
        title: Some(format!("post {id}")),
        selftext: Some(String::new()),
        score: Some(10),
        num_comments: Some(2),
        created_utc: Some(created),
        permalink: Some(format!("/r/wallstreetbets/comments/{id}/x/")),
        url: Some(format!("https://i.redd.it/{id}.png?width=640")),
    })
}

fn comment(id: &str, post_id: &str) -> Record {
    Record::Comment(Comment {
        id: id.into(),
        created_at: Utc.with_ymd_and_hms(2025, 3, 11, 15, 0, 0).unwrap(),
        source_kind: SourceKind::Reddit,
        tag: "wallstreetbets".into(),
        post_id: post_id.into(),
        body: Some("calls".into()),
        upvotes: None,
        annotations: Annotations::default(),
        agrees_with_post: None,
    })
}

#[test]
fn second_run_writes_nothing_already_stored() {
    let dir = tempfile::tempdir().unwrap();
    let tables = TableNames::default();
    let posts = tables.for_kind(RecordKind::Post).to_string();
    let ctx = NormalizeContext::new(SourceKind::Reddit, "wallstreetbets");

    // Run one
    {
        let store = ParquetStore::new(dir.path(), "market_pulse", tables.clone());
        let mut gate = DedupGate::load(&store, tables.iter().map(|(_, t)| t)).unwrap();
        let batch = normalize_batch(vec![raw_post("p1", 1.7417e9), raw_post("p2", 1.7417e9)], &ctx);
        let fresh = gate.filter(&posts, batch.records);
        let result = StoreWriter::new(&store).write(&posts, fresh);
        assert_eq!(result.accepted_count, 2);
    }

    // Run two: fresh store handle, snapshot reloaded from disk
    let store = ParquetStore::new(dir.path(), "market_pulse", tables.clone());
    let mut gate = DedupGate::load(&store, tables.iter().map(|(_, t)| t)).unwrap();
    assert_eq!(gate.snapshot(&posts).map(|s| s.len()), Some(2));

    let batch = normalize_batch(
        vec![raw_post("p2", 1.7417e9), raw_post("p3", 1.7418e9), raw_post("p3", 1.7418e9)],
        &ctx,
    );
    let fresh = gate.filter(&posts, batch.records);
    let ids: Vec<_> = fresh.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, vec!["p3"]);

    let result = StoreWriter::new(&store).write(&posts, fresh);
    assert_eq!(result.accepted_count, 1);
    assert_eq!(store.row_count(&posts).unwrap(), 3);
    assert_eq!(store.part_files(&posts).unwrap().len(), 2);
}

#[test]
fn posts_keep_image_and_absolute_permalink() {
    let ctx = NormalizeContext::new(SourceKind::Reddit, "wallstreetbets");
    let batch = normalize_batch(vec![raw_post("p9", 1.7417e9)], &ctx);
    match &batch.records[0] {
        Record::Post(Post { url, image_url, body, .. }) => {
            assert_eq!(
                url.as_deref(),
                Some("https://www.reddit.com/r/wallstreetbets/comments/p9/x/")
            );
            assert_eq!(image_url.as_deref(), Some("https://i.redd.it/p9.png?width=640"));
            assert!(body.is_none());
        }
        other => panic!("expected post, got {other:?}"),
    }
}

#[test]
fn comments_land_in_their_own_table() {
    let dir = tempfile::tempdir().unwrap();
    let tables = TableNames::default();
    let store = ParquetStore::new(dir.path(), "market_pulse", tables.clone());
    let table = tables.for_kind(RecordKind::Comment);

    let result = StoreWriter::new(&store).write(table, vec![comment("c1", "p1"), comment("c2", "p1")]);
    assert_eq!(result.accepted_count, 2);
    assert!(dir
        .path()
        .join("market_pulse")
        .join("table=wsb_comments")
        .is_dir());
    assert_eq!(store.existing_keys(table).unwrap().len(), 2);
    assert_eq!(store.row_count(tables.for_kind(RecordKind::Post)).unwrap(), 0);
}
