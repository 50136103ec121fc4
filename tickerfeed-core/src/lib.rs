//! tickerfeed core: records, source adapters, pagination, dedup, store.
//!
//! This crate contains the ingestion engine:
//! - Domain types (records, natural keys, query units)
//! - Source adapters for X, Reddit and Google News behind one page trait
//! - Normalizer from raw source items to canonical records
//! - Lazy pagination driver with page-cap and empty-page termination
//! - Deduplication gate over per-table key snapshots
//! - Append-only record store (Parquet on disk, memory for dry runs)
//! - Batched store writer with per-row rejection detail

pub mod dedup;
pub mod domain;
pub mod normalize;
pub mod paginate;
pub mod source;
pub mod store;
pub mod writer;

pub use dedup::{filter_new, DedupGate};
pub use paginate::{paginate, PageStats, Pagination, UnitError};
pub use writer::{StoreWriter, WriteResult};
