//! tickerfeed runner: configuration, query planning, fan-out, run reports.
//!
//! This crate builds on `tickerfeed-core` to provide:
//! - TOML run configuration with stock defaults and env credentials
//! - Query planning (tickers, X queries and users, subreddits → units)
//! - Adapter registry setup with fatal credential checks
//! - The fan-out pipeline with item ceilings, deadline, and comment phase
//! - Run reports, saved as JSON artifacts

pub mod config;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod sources;

pub use config::{ConfigError, Credentials, IngestConfig, RunSettings, TickerConfig};
pub use pipeline::{Pipeline, PipelineOptions};
pub use plan::QueryPlan;
pub use report::{
    load_report, render_summary, save_report, RunReport, RunTotals, UnitOutcome, UnitStatus,
};
pub use sources::build_registry;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<IngestConfig>();
        assert_sync::<IngestConfig>();
        assert_send::<Credentials>();
        assert_sync::<Credentials>();
        assert_send::<QueryPlan>();
        assert_sync::<QueryPlan>();
    }

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
        assert_send::<UnitOutcome>();
        assert_sync::<UnitOutcome>();
    }
}
