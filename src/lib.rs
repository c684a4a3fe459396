//! `nanoflow` runs batch event-processing jobs over collider datasets.
//!
//! The workflow for each dataset of an analysis is
//!
//! 1. query the dataset catalog for the list of files and cache it,
//! 2. optionally copy the files from remote storage into a local cache,
//! 3. split the file list into jobs and write one JSON descriptor per job,
//! 4. run an external "looper" executable on each job in a worker pool,
//! 5. collect the JSON reports written by the looper.
//!
//! The looper, the catalog client, and the grid copy tool are external
//! programs. Interfaces to them are defined in [traits].
//!
//! ## Most relevant modules
//!
//! - [prelude] exports the most relevant types
//! - [analysis] for loading an analysis and running each step
//! - [dataset] for the per-dataset operations
//! - [dispatch] for running jobs in parallel
//! - [report] for the looper reports
//!

/// Analysis of simulated and recorded datasets
pub mod analysis;
/// Dataset catalog client
pub mod catalog;
/// Analysis description
pub mod config;
/// Single datasets
pub mod dataset;
/// Parallel job execution
pub mod dispatch;
/// Job descriptors
pub mod job;
/// External looper executable
pub mod looper;
/// Most important exports
pub mod prelude;
/// Progress bar
pub mod progress_bar;
/// Looper reports
pub mod report;
/// Common traits
pub mod traits;
/// File staging
pub mod transfer;

#[cfg(all(test, unix))]
pub(crate) mod test_util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
