//! Chainflow Data - option-chain sentiment pipeline.
//!
//! Fetches option-chain snapshots for an index or equity, normalises them
//! into strike-aligned call/put records, reduces the strike universe to
//! top-K-by-volume unions, and derives sentiment metrics (Put/Call Ratio,
//! Max Pain) plus a persisted PCR time series.
//!
//! The pipeline is a strictly forward, single-pass flow per cycle:
//!
//! ```text
//! ChainClient -> ChainCache -> ChainSnapshot::parse -> FilteredChain
//!     -> {pcr, max_pain} -> {HistoryLog, DashboardFrame}
//! ```
//!
//! See [`cycle::run_cycle`] for the orchestration entry point.

pub mod cache;
pub mod chain;
pub mod client;
pub mod cycle;
pub mod error;
pub mod filter;
pub mod history;
pub mod metrics;

// Re-exports (public API)
pub use cache::{ChainCache, DEFAULT_TTL};
pub use chain::{ChainSnapshot, StrikeRecord};
pub use client::{ChainClient, ChainKey, DEFAULT_BASE_URL};
pub use cycle::{DISPLAY_TOP_K, DashboardFrame, HISTORY_TOP_K, TABLE_ROWS, run_cycle};
pub use error::DataError;
pub use filter::{FilteredChain, top_by_volume};
pub use history::{CsvHistory, HISTORY_HEADER, HistoryLog, MemoryHistory, PcrEntry};
pub use metrics::{MaxPain, Pcr, PcrBasis, Sentiment, max_pain, pcr};
