//! Property tests for ingestion invariants.
//!
//! Uses proptest to verify:
//! 1. Dedup idempotence: a second pass over the same batch passes nothing
//! 2. Dedup output never repeats a key and never contains a snapshot key
//! 3. Pagination yields every page's items in page order, then stops
//! 4. The page cap bounds the number of requests

use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use tickerfeed_core::domain::{
    Annotations, KeySnapshot, NaturalKey, QueryKind, QueryUnit, Record, SocialMessage, SourceKind,
};
use tickerfeed_core::source::{Cursor, Page, PageSource, RawItem, RawTweet, SourceError};
use tickerfeed_core::{filter_new, paginate};

// ── Strategies (proptest) ────────────────────────────────────────────

fn message(id: u8) -> Record {
    Record::SocialMessage(SocialMessage {
        id: id.to_string(),
        created_at: chrono::DateTime::from_timestamp(1_741_700_000 + i64::from(id), 0).unwrap(),
        source_kind: SourceKind::X,
        tag: String::new(),
        text: None,
        likes: None,
        retweets: None,
        replies: None,
        views: None,
        url: None,
        annotations: Annotations::default(),
    })
}

fn arb_batch() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(0u8..40, 0..60).prop_map(|ids| ids.into_iter().map(message).collect())
}

fn arb_snapshot() -> impl Strategy<Value = KeySnapshot> {
    prop::collection::vec(0u8..40, 0..20).prop_map(|ids| {
        ids.into_iter()
            .map(|id| NaturalKey::new(SourceKind::X, id.to_string()))
            .collect()
    })
}

/// Serves `pages[n]` on the n-th request, chaining cursors between them.
struct PagedStub {
    pages: Vec<Vec<u8>>,
    calls: AtomicU32,
}

impl PagedStub {
    fn new(pages: Vec<Vec<u8>>) -> Self {
        Self {
            pages,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageSource for PagedStub {
    fn name(&self) -> &str {
        "paged_stub"
    }

    fn fetch_page(&self, _: &QueryUnit, cursor: Option<&Cursor>) -> Result<Page, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let expected = (n > 0).then(|| Cursor::new(format!("page-{n}")));
        assert_eq!(cursor, expected.as_ref(), "pages must be requested in cursor order");

        let items = self.pages[n]
            .iter()
            .map(|&id| {
                RawItem::Tweet(RawTweet {
                    id: Some(format!("{n}-{id}")),
                    created_at: Some("Tue Mar 11 14:02:11 +0000 2025".into()),
                    ..Default::default()
                })
            })
            .collect();

        Ok(if n + 1 < self.pages.len() {
            Page::more(items, Cursor::new(format!("page-{}", n + 1)))
        } else {
            Page::last(items)
        })
    }
}

fn arb_pages() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..6), 1..6)
}

fn search_unit(page_cap: u32) -> QueryUnit {
    QueryUnit::new(SourceKind::X, QueryKind::Search, "", "$SPY").with_page_cap(page_cap)
}

// ── 1 + 2. Dedup ─────────────────────────────────────────────────────

proptest! {
    /// Running the same batch through the same snapshot twice yields nothing new.
    #[test]
    fn dedup_is_idempotent(batch in arb_batch(), snapshot in arb_snapshot()) {
        let mut seen = snapshot;
        let first = filter_new(batch.clone(), &mut seen);
        let size_after_first = seen.len();
        let second = filter_new(batch, &mut seen);

        prop_assert!(second.is_empty());
        prop_assert_eq!(seen.len(), size_after_first);
        prop_assert!(first.len() <= size_after_first);
    }

    /// Output keys are unique, absent from the prior snapshot, and keep input order.
    #[test]
    fn dedup_output_is_new_and_unique(batch in arb_batch(), snapshot in arb_snapshot()) {
        let prior = snapshot.clone();
        let mut seen = snapshot;
        let out = filter_new(batch.clone(), &mut seen);

        let mut keys: Vec<_> = out.iter().map(Record::key).collect();
        prop_assert!(keys.iter().all(|k| !prior.contains(k)));

        let expected_order: Vec<_> = batch
            .iter()
            .map(Record::key)
            .filter(|k| !prior.contains(k))
            .fold(Vec::new(), |mut acc, k| {
                if !acc.contains(&k) {
                    acc.push(k);
                }
                acc
            });
        prop_assert_eq!(&keys, &expected_order);

        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), out.len());
    }
}

// ── 3 + 4. Pagination ────────────────────────────────────────────────

proptest! {
    /// With the cap at or above the page count, every item arrives once, in
    /// page order, and exactly K requests are made.
    #[test]
    fn pagination_yields_union_in_page_order(pages in arb_pages(), slack in 0u32..3) {
        let k = pages.len() as u32;
        let expected: Vec<String> = pages
            .iter()
            .enumerate()
            .flat_map(|(n, ids)| ids.iter().map(move |id| format!("{n}-{id}")))
            .collect();

        let stub = PagedStub::new(pages);
        let unit = search_unit(k + slack);
        let mut pagination = paginate(&stub, &unit);
        let ids: Vec<String> = pagination
            .by_ref()
            .map(|r| r.map(|rec| rec.id().to_string()))
            .collect::<Result<_, _>>()
            .unwrap();

        prop_assert_eq!(ids, expected);
        prop_assert_eq!(stub.calls(), k);
        prop_assert_eq!(pagination.stats().pages, k);
        prop_assert!(pagination.next().is_none());
    }

    /// A cap below the page count stops after exactly `cap` requests.
    #[test]
    fn page_cap_bounds_requests(pages in arb_pages(), cap in 1u32..6) {
        let k = pages.len() as u32;
        let stub = PagedStub::new(pages);
        let unit = search_unit(cap);
        let _ = paginate(&stub, &unit).count();
        prop_assert_eq!(stub.calls(), cap.min(k));
    }
}
