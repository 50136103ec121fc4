//! Pagination driver: walks one query unit across pages.
//!
//! [`paginate`] returns a lazy iterator. Pages are fetched on demand, strictly
//! in cursor order, so a consumer that stops early (item ceiling, deadline)
//! never triggers the next request. Termination, whichever comes first:
//!
//! 1. the source reports no further page (`has_more == false` or no cursor),
//! 2. `page_cap` pages were fetched,
//! 3. a page came back with zero items, even if it claimed more would follow,
//! 4. a fetch failed; the error is yielded once and the iterator is fused.

use std::collections::VecDeque;
use std::iter::FusedIterator;
use thiserror::Error;

use crate::domain::{QueryUnit, Record};
use crate::normalize::{normalize_batch, NormalizeContext};
use crate::source::{Cursor, PageSource, SourceError};

/// A source failure tagged with the unit it aborted.
#[derive(Debug, Error)]
#[error("{unit}: {source}")]
pub struct UnitError {
    pub unit: String,
    #[source]
    pub source: SourceError,
}

/// Counters for one pagination run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub pages: u32,
    pub raw_items: usize,
    pub dropped: usize,
}

#[derive(Debug)]
enum CursorState {
    Start,
    Next(Cursor),
    Done,
}

/// Lazy, finite, non-restartable stream of a unit's records.
pub struct Pagination<'a> {
    source: &'a dyn PageSource,
    unit: &'a QueryUnit,
    ctx: NormalizeContext,
    cursor: CursorState,
    buffered: VecDeque<Record>,
    stats: PageStats,
}

/// Start paginating `unit` against `source`. Nothing is fetched until the
/// iterator is polled.
pub fn paginate<'a>(source: &'a dyn PageSource, unit: &'a QueryUnit) -> Pagination<'a> {
    Pagination {
        source,
        unit,
        ctx: NormalizeContext::new(unit.source, unit.tag.clone()),
        cursor: CursorState::Start,
        buffered: VecDeque::new(),
        stats: PageStats::default(),
    }
}

impl Pagination<'_> {
    pub fn stats(&self) -> PageStats {
        self.stats
    }

    /// Fetch the next page into the buffer. Leaves the cursor `Done` on any
    /// terminal condition, including errors.
    fn fetch_next(&mut self) -> Option<Result<(), UnitError>> {
        let cursor = match std::mem::replace(&mut self.cursor, CursorState::Done) {
            CursorState::Done => return None,
            CursorState::Start => None,
            CursorState::Next(cursor) => Some(cursor),
        };
        if self.stats.pages >= self.unit.page_cap {
            return None;
        }

        let page = match self.source.fetch_page(self.unit, cursor.as_ref()) {
            Ok(page) => page,
            Err(source) => {
                return Some(Err(UnitError {
                    unit: self.unit.label(),
                    source,
                }))
            }
        };

        self.stats.pages += 1;
        self.stats.raw_items += page.items.len();
        let empty = page.items.is_empty();

        let batch = normalize_batch(page.items, &self.ctx);
        self.stats.dropped += batch.dropped;
        self.buffered.extend(batch.records);

        if !empty && page.has_more {
            if let Some(next) = page.next_cursor {
                self.cursor = CursorState::Next(next);
            }
        }

        tracing::debug!(
            unit = %self.unit.label(),
            adapter = self.source.name(),
            page = self.stats.pages,
            buffered = self.buffered.len(),
            more = matches!(self.cursor, CursorState::Next(_)),
            "page fetched"
        );
        Some(Ok(()))
    }
}

impl Iterator for Pagination<'_> {
    type Item = Result<Record, UnitError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Some(Ok(record));
            }
            match self.fetch_next()? {
                Ok(()) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl FusedIterator for Pagination<'_> {}
