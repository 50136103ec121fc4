//! Run reports: per-unit outcomes, totals, and the saved artifact.
//!
//! Every planned unit ends up in the report exactly once, whatever happened
//! to it. The report is written as `{output_dir}/run_{timestamp}/report.json`
//! and rendered as a plain-text summary for the terminal.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tickerfeed_core::domain::{QueryKind, QueryUnit, SourceKind};

/// Bump when the report layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// How a unit ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Completed,
    /// Stopped at the per-unit item ceiling.
    Truncated,
    /// A page fetch failed; records from earlier pages were still written.
    Failed { error: String },
    /// Not started before the run deadline.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub label: String,
    pub source: SourceKind,
    pub kind: QueryKind,
    pub tag: String,
    /// Parent post of a comment unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub status: UnitStatus,
    pub pages: u32,
    /// Raw items received.
    pub fetched: usize,
    /// Items the normalizer could not use.
    pub dropped: usize,
    pub duplicates: usize,
    pub written: usize,
    pub rejected: usize,
    pub elapsed_ms: u64,
}

impl UnitOutcome {
    pub fn new(unit: &QueryUnit, status: UnitStatus) -> Self {
        Self {
            label: unit.label(),
            source: unit.source,
            kind: unit.kind,
            tag: unit.tag.clone(),
            parent: unit.parent.clone(),
            status,
            pages: 0,
            fetched: 0,
            dropped: 0,
            duplicates: 0,
            written: 0,
            rejected: 0,
            elapsed_ms: 0,
        }
    }

    pub fn skipped(unit: &QueryUnit) -> Self {
        Self::new(unit, UnitStatus::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, UnitStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub units: usize,
    pub completed: usize,
    pub truncated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub fetched: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub written: usize,
    pub rejected: usize,
}

impl RunTotals {
    pub fn from_outcomes(outcomes: &[UnitOutcome]) -> Self {
        let mut totals = Self {
            units: outcomes.len(),
            ..Self::default()
        };
        for o in outcomes {
            match o.status {
                UnitStatus::Completed => totals.completed += 1,
                UnitStatus::Truncated => totals.truncated += 1,
                UnitStatus::Failed { .. } => totals.failed += 1,
                UnitStatus::Skipped => totals.skipped += 1,
            }
            totals.fetched += o.fetched;
            totals.dropped += o.dropped;
            totals.duplicates += o.duplicates;
            totals.written += o.written;
            totals.rejected += o.rejected;
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub deadline_hit: bool,
    pub totals: RunTotals,
    pub units: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            started_at,
            finished_at: started_at,
            dry_run: false,
            deadline_hit: false,
            totals: RunTotals::default(),
            units: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: UnitOutcome) {
        self.units.push(outcome);
    }

    /// Stamp the end time and compute totals.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = finished_at;
        self.deadline_hit = self.units.iter().any(|u| u.status == UnitStatus::Skipped);
        self.totals = RunTotals::from_outcomes(&self.units);
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.units.iter().filter(|u| u.is_failed())
    }
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Save a report under `{output_dir}/run_{timestamp}/report.json`.
///
/// Returns the path to the created directory.
pub fn save_report(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("run_{}", report.started_at.format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

    let json = serde_json::to_string_pretty(report).context("failed to serialize run report")?;
    std::fs::write(run_dir.join("report.json"), json)
        .with_context(|| format!("failed to write report in {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Load a report from a run directory, rejecting unknown schema versions.
pub fn load_report(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report: RunReport =
        serde_json::from_str(&json).context("failed to deserialize run report")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── Terminal summary ───────────────────────────────────────────────

/// Plain-text summary: one line per unit plus totals.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::with_capacity(256 + report.units.len() * 96);
    let elapsed = (report.finished_at - report.started_at).num_seconds();

    out.push_str(&format!(
        "Run {}{} ({}s)\n\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if report.dry_run { " [dry run]" } else { "" },
        elapsed
    ));
    out.push_str(&format!(
        "{:<10} {:>6} {:>7} {:>5} {:>5} {:>7} {:>4}  {}\n",
        "status", "pages", "fetched", "drop", "dup", "written", "rej", "unit"
    ));
    for u in &report.units {
        let status = match &u.status {
            UnitStatus::Completed => "ok",
            UnitStatus::Truncated => "truncated",
            UnitStatus::Failed { .. } => "FAILED",
            UnitStatus::Skipped => "skipped",
        };
        out.push_str(&format!(
            "{:<10} {:>6} {:>7} {:>5} {:>5} {:>7} {:>4}  {}\n",
            status, u.pages, u.fetched, u.dropped, u.duplicates, u.written, u.rejected, u.label
        ));
        if let UnitStatus::Failed { error } = &u.status {
            out.push_str(&format!("{:<10} {error}\n", ""));
        }
    }

    let t = &report.totals;
    out.push_str(&format!(
        "\n{} units: {} ok, {} truncated, {} failed, {} skipped\n",
        t.units, t.completed, t.truncated, t.failed, t.skipped
    ));
    out.push_str(&format!(
        "{} fetched, {} dropped, {} duplicates, {} written, {} rejected\n",
        t.fetched, t.dropped, t.duplicates, t.written, t.rejected
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> RunReport {
        let started = Utc.with_ymd_and_hms(2025, 3, 11, 20, 0, 0).unwrap();
        let mut report = RunReport::new(started);

        let unit = QueryUnit::new(SourceKind::News, QueryKind::Feed, "AAPL", "Apple stock");
        report.push(UnitOutcome {
            fetched: 10,
            duplicates: 4,
            written: 6,
            ..UnitOutcome::new(&unit, UnitStatus::Completed)
        });
        report.push(UnitOutcome::new(
            &unit,
            UnitStatus::Failed {
                error: "HTTP 503: unavailable".into(),
            },
        ));
        report.push(UnitOutcome::skipped(&unit));
        report.finish(started + chrono::Duration::seconds(42));
        report
    }

    #[test]
    fn totals_count_statuses_and_rows() {
        let report = sample();
        assert_eq!(report.totals.units, 3);
        assert_eq!(report.totals.completed, 1);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(report.totals.written, 6);
        assert!(report.deadline_hit);
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn status_is_flattened_into_outcome_json() {
        let report = sample();
        let json = serde_json::to_value(&report.units[1]).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "HTTP 503: unavailable");
        assert!(json.get("parent").is_none());
    }

    #[test]
    fn report_saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample();
        let run_dir = save_report(&report, dir.path()).unwrap();
        assert!(run_dir.ends_with("run_20250311_200000"));
        assert_eq!(load_report(&run_dir).unwrap(), report);
    }

    #[test]
    fn summary_lists_failures() {
        let text = render_summary(&sample());
        assert!(text.contains("FAILED"));
        assert!(text.contains("HTTP 503: unavailable"));
        assert!(text.contains("3 units: 1 ok, 0 truncated, 1 failed, 1 skipped"));
    }
}
