//! Collision policy shared by the planner and the applier
//!
//! The planner asks whether a target is held by a file outside the plan;
//! the applier asks the same question again right before each physical
//! rename. Both go through [`Occupancy`], so planning can be tested
//! against an in-memory namespace.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Reserved prefix of temporary names used by staged renames
pub const TEMP_MARKER: &str = "__tmp__";

/// Upper bound for counter suffixes (`name_1` .. `name_9999`)
const MAX_COUNTER: u32 = 10_000;

/// What to do when a target name is held by a file outside the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Leave the source in place and report the conflict
    #[default]
    Skip,
    /// Use the first free `{stem}_{k}{ext}` instead
    Suffix,
}

/// Answers whether a path is currently taken
pub trait Occupancy {
    fn is_occupied(&self, path: &Path) -> bool;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskOccupancy;

impl Occupancy for DiskOccupancy {
    fn is_occupied(&self, path: &Path) -> bool {
        // Dangling symlinks still block a rename target
        fs::symlink_metadata(path).is_ok()
    }
}

impl Occupancy for HashSet<PathBuf> {
    fn is_occupied(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

impl<T: Occupancy + ?Sized> Occupancy for &T {
    fn is_occupied(&self, path: &Path) -> bool {
        (**self).is_occupied(path)
    }
}

/// Whether `target` is held by a file that is not itself being renamed
pub fn is_foreign<O: Occupancy + ?Sized>(
    occupancy: &O,
    target: &Path,
    movers: &HashSet<PathBuf>,
) -> bool {
    !movers.contains(target) && occupancy.is_occupied(target)
}

/// Whether a file name carries the staging marker
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(TEMP_MARKER)
}

/// Temporary path a staged step parks its file at
///
/// Discovery never plans marker-prefixed files, so this namespace is
/// disjoint from every source and target.
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{TEMP_MARKER}{name}"))
}

/// First `{stem}_{k}{ext}` next to `target` that is neither occupied nor claimed
pub fn resolve_with_counter<O: Occupancy + ?Sized>(
    target: &Path,
    occupancy: &O,
    claimed: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    let stem = target.file_stem()?.to_str()?;
    let extension = target
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    (1..MAX_COUNTER)
        .map(|i| target.with_file_name(format!("{}_{}{}", stem, i, extension)))
        .find(|candidate| !occupancy.is_occupied(candidate) && !claimed.contains(candidate))
}
