//! Usage Pulse - batch aggregation engine for product adoption metrics
//!
//! Pulse turns four upstream sources (employment intervals, activation
//! events, sent messages and the organization forest) into ten result
//! tables through a deterministic pipeline: source reading → indexing →
//! calendar bucketing → aggregation → table encoding.
//!
//! ## Tables
//!
//! - **Coverage**: weekly share of employees who have ever activated, company
//!   wide and per root organization
//! - **Activity**: daily active rate over working days
//! - **Messages**: weekly volume, 20/60/20 sender concentration, leaderboard
//! - **Cohorts**: activation within hire month, month-over-month retention,
//!   company wide and per root organization
//!
//! Every run recomputes its window from scratch, so repeating a run over the
//! same sources reproduces identical tables.

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod employment;
pub mod encoder;
pub mod error;
pub mod org;
pub mod pipeline;
pub mod rate;
pub mod schema;
pub mod types;

pub use config::Config;
pub use encoder::TableEncoder;
pub use error::ComputeError;
pub use pipeline::{compute_tables, MetricsEngine, RunMode, RunOutput, RunParams};
pub use schema::{SourceReader, SourceValidator};
pub use types::{ResultTables, SourceSnapshot};

/// Engine version stamped on every output document
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for output documents
pub const PRODUCER_NAME: &str = "usage-pulse";
