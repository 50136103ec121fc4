//! Fan-out controller: runs every planned unit and collects the report.
//!
//! Units run one after another. Per unit:
//!
//! 1. resolve the adapter and paginate, stopping at the item ceiling,
//! 2. pass the collected records through the dedup gate,
//! 3. append the survivors with one store call per destination table,
//! 4. record counts and status in the report.
//!
//! A failing unit never stops the run. After the planned units, one comment
//! unit is run per post the store accepted (phase two). The deadline is
//! checked before each unit starts; units that miss it are reported skipped.

use std::time::{Duration, Instant};

use chrono::Utc;

use tickerfeed_core::domain::{QueryKind, QueryUnit, Record, SourceKind};
use tickerfeed_core::source::SourceRegistry;
use tickerfeed_core::store::{RecordStore, TableNames};
use tickerfeed_core::{paginate, DedupGate, StoreWriter, UnitError};

use crate::config::RunSettings;
use crate::report::{RunReport, UnitOutcome, UnitStatus};

/// Knobs of the fan-out controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub max_items_per_unit: usize,
    pub deadline: Option<Duration>,
    pub fetch_comments: bool,
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&RunSettings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(run: &RunSettings) -> Self {
        Self {
            max_items_per_unit: run.max_items_per_unit.max(1),
            deadline: run.deadline_secs.map(Duration::from_secs),
            fetch_comments: run.fetch_comments,
            dry_run: false,
        }
    }
}

pub struct Pipeline<'a> {
    registry: &'a SourceRegistry,
    store: &'a dyn RecordStore,
    tables: TableNames,
    gate: DedupGate,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    /// `gate` must already hold the run-start snapshots of `tables`.
    pub fn new(
        registry: &'a SourceRegistry,
        store: &'a dyn RecordStore,
        tables: TableNames,
        gate: DedupGate,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            store,
            tables,
            gate,
            options,
        }
    }

    /// Run every unit, then the comment units of accepted posts.
    pub fn run_all(&mut self, units: Vec<QueryUnit>) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new(Utc::now());
        report.dry_run = self.options.dry_run;

        tracing::info!(units = units.len(), dry_run = self.options.dry_run, "run started");

        let mut accepted_posts = Vec::new();
        for unit in &units {
            let outcome = self.run_or_skip(unit, started, &mut accepted_posts);
            report.push(outcome);
        }

        let comment_units = self.comment_units(&accepted_posts);
        if !comment_units.is_empty() {
            tracing::info!(units = comment_units.len(), "fetching comments of new posts");
        }
        let mut unused = Vec::new();
        for unit in &comment_units {
            let outcome = self.run_or_skip(unit, started, &mut unused);
            report.push(outcome);
        }

        report.finish(Utc::now());
        let t = &report.totals;
        tracing::info!(
            units = t.units,
            failed = t.failed,
            skipped = t.skipped,
            written = t.written,
            duplicates = t.duplicates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        report
    }

    fn run_or_skip(
        &mut self,
        unit: &QueryUnit,
        started: Instant,
        accepted_posts: &mut Vec<Record>,
    ) -> UnitOutcome {
        if let Some(deadline) = self.options.deadline {
            if started.elapsed() >= deadline {
                tracing::warn!(unit = %unit.label(), "deadline reached, skipping unit");
                return UnitOutcome::skipped(unit);
            }
        }
        self.run_unit(unit, accepted_posts)
    }

    /// Phase-two units, one per accepted post.
    fn comment_units(&self, accepted_posts: &[Record]) -> Vec<QueryUnit> {
        if !self.options.fetch_comments || accepted_posts.is_empty() {
            return Vec::new();
        }
        if !self.registry.supports(SourceKind::Reddit, QueryKind::Feed) {
            tracing::debug!("no comment adapter registered, skipping phase two");
            return Vec::new();
        }
        accepted_posts
            .iter()
            .filter_map(|record| match record {
                Record::Post(post) => Some(QueryUnit::comments_of(&post.id, post.tag.as_str())),
                _ => None,
            })
            .collect()
    }

    fn run_unit(&mut self, unit: &QueryUnit, accepted_posts: &mut Vec<Record>) -> UnitOutcome {
        let unit_started = Instant::now();
        let registry = self.registry;

        let source = match registry.for_unit(unit) {
            Ok(source) => source,
            Err(e) => {
                let error = UnitError {
                    unit: unit.label(),
                    source: e,
                };
                tracing::warn!(error = %error, "unit failed");
                return UnitOutcome::new(unit, UnitStatus::Failed { error: error.to_string() });
            }
        };

        let mut pagination = paginate(source, unit);
        let mut records = Vec::new();
        let mut failure = None;
        let mut truncated = false;
        for item in pagination.by_ref() {
            match item {
                Ok(record) => {
                    records.push(record);
                    if records.len() >= self.options.max_items_per_unit {
                        truncated = true;
                        break;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        let stats = pagination.stats();

        let status = match failure {
            Some(e) => {
                tracing::warn!(error = %e, kept = records.len(), "unit failed");
                UnitStatus::Failed { error: e.to_string() }
            }
            None if truncated => UnitStatus::Truncated,
            None => UnitStatus::Completed,
        };

        let mut outcome = UnitOutcome::new(unit, status);
        outcome.pages = stats.pages;
        outcome.fetched = stats.raw_items;
        outcome.dropped = stats.dropped;

        for (table, batch) in self.group_by_table(records) {
            let before = batch.len();
            let fresh = self.gate.filter(&table, batch);
            outcome.duplicates += before - fresh.len();

            let result = StoreWriter::new(self.store).write(&table, fresh);
            outcome.written += result.accepted_count;
            outcome.rejected += result.rejected_count();
            accepted_posts.extend(
                result
                    .accepted
                    .into_iter()
                    .filter(|r| matches!(r, Record::Post(_))),
            );
        }

        outcome.elapsed_ms = unit_started.elapsed().as_millis() as u64;
        tracing::info!(
            unit = %outcome.label,
            pages = outcome.pages,
            fetched = outcome.fetched,
            dropped = outcome.dropped,
            duplicates = outcome.duplicates,
            written = outcome.written,
            rejected = outcome.rejected,
            "unit done"
        );
        outcome
    }

    /// Split records by destination table, in order of first appearance.
    fn group_by_table(&self, records: Vec<Record>) -> Vec<(String, Vec<Record>)> {
        let mut groups: Vec<(String, Vec<Record>)> = Vec::new();
        for record in records {
            let table = self.tables.for_kind(record.kind());
            match groups.iter_mut().find(|(t, _)| t == table) {
                Some((_, batch)) => batch.push(record),
                None => groups.push((table.to_string(), vec![record])),
            }
        }
        groups
    }
}
