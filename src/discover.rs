//! Candidate file discovery
//!
//! Lists the image files of a directory (optionally of its whole subtree),
//! grouped by containing directory so every directory is numbered on its own.

use crate::collision::is_staging_name;
use crate::config::Config;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Image files found directly inside one directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryBatch {
    pub directory: PathBuf,
    /// Files to be keyed and planned, sorted by name
    pub files: Vec<PathBuf>,
    /// Temporary files of an interrupted staged run
    pub leftovers: Vec<PathBuf>,
}

/// Discover image files under `directory`
///
/// Only regular files with a configured extension are returned; symlinks
/// are not followed. Batches are ordered by directory path.
pub fn discover(directory: &Path, recursive: bool, config: &Config) -> Result<Vec<DirectoryBatch>> {
    let mut walker = WalkDir::new(directory)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut batches: BTreeMap<PathBuf, DirectoryBatch> = BTreeMap::new();

    for entry in walker
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && is_excluded_dir(e.path(), directory, config)))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Cannot read directory entry, skipping");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| config.is_supported(ext));
        if !supported {
            continue;
        }

        let Some(parent) = path.parent() else {
            continue;
        };
        let batch = batches
            .entry(parent.to_path_buf())
            .or_insert_with(|| DirectoryBatch {
                directory: parent.to_path_buf(),
                ..Default::default()
            });

        if is_staging_name(&entry.file_name().to_string_lossy()) {
            warn!(?path, "Found leftover temporary file from an interrupted run");
            batch.leftovers.push(path.to_path_buf());
        } else {
            batch.files.push(path.to_path_buf());
        }
    }

    debug!(
        ?directory,
        directories = batches.len(),
        files = batches.values().map(|b| b.files.len()).sum::<usize>(),
        "Discovery finished"
    );

    Ok(batches.into_values().collect())
}

/// Check if a path should be excluded based on exclude_dirs configuration
///
/// Folder names are only matched below `root`.
fn is_excluded_dir(path: &Path, root: &Path, config: &Config) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);

    for exclude in &config.exclude_dirs {
        if exclude.is_absolute() {
            if path.starts_with(exclude) {
                debug!(?path, ?exclude, "Excluding directory (absolute path match)");
                return true;
            }
        } else if let Some(exclude_name) = exclude.file_name()
            && relative
                .components()
                .any(|c| matches!(c, Component::Normal(name) if name == exclude_name))
        {
            debug!(?path, ?exclude, "Excluding directory (folder name match)");
            return true;
        }
    }

    false
}
