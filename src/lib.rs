//! Paper Sorter - Collision-safe renumbering of scanned exam-paper images
//!
//! This library provides:
//! - Ordering keys from file creation time or the number in the filename
//! - Ascending, descending and suffix-stripping rename plans
//! - A two-pass staged applier for plans whose targets alias sources
//! - Per-directory reports of renamed, skipped and failed files

pub mod apply;
pub mod cli;
pub mod collision;
pub mod config;
pub mod discover;
pub mod error;
pub mod key;
pub mod plan;
pub mod process;
pub mod report;

pub use apply::{Applier, ExecutionMode, Outcome, OutcomeStatus};
pub use cli::Cli;
pub use collision::{ConflictStrategy, DiskOccupancy, Occupancy};
pub use config::{Config, ConfigError, PolicyKind};
pub use discover::{DirectoryBatch, discover};
pub use error::{ApplyError, Error, ExtractError, PlanConflict, Result};
pub use key::{FileEntry, Key, KeyMode, extract_key};
pub use plan::{NumberingPolicy, Planner, RenamePlan, RenameStep, SkipReason, Skipped};
pub use process::Processor;
pub use report::{DirectoryReport, RunSummary};
