//! Ordering key extraction
//!
//! Every discovered file gets one ordering key:
//! - Filesystem creation ("birth") time, falling back to the last
//!   metadata change time where the platform does not record birth time
//! - A page number parsed from the filename

pub mod filename;

use crate::error::ExtractError;
use chrono::{DateTime, Local};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use tracing::trace;

pub use filename::{NumericName, parse_numeric_name};

/// How the ordering key is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Filesystem creation time
    Timestamp,
    /// Number embedded in the filename (`12.png`, `12_1.png`)
    Numeric,
}

/// Orderable key of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Timestamp(FileTime),
    Number(u64),
}

impl Key {
    /// Human-readable form for logs and reports
    pub fn describe(&self) -> String {
        match self {
            Key::Timestamp(time) => {
                match DateTime::from_timestamp(time.unix_seconds(), time.nanoseconds()) {
                    Some(utc) => utc
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    None => format!("{}s", time.unix_seconds()),
                }
            }
            Key::Number(n) => format!("#{n}"),
        }
    }
}

/// A discovered file together with its ordering key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub key: Key,
    pub original_name: String,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, key: Key) -> Self {
        let path = path.into();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            key,
            original_name,
        }
    }

    /// Build an entry by extracting the key of `path`
    pub fn extract(path: &Path, mode: KeyMode) -> Result<Self, ExtractError> {
        let key = extract_key(path, mode)?;
        Ok(Self::new(path, key))
    }
}

/// Extract the ordering key of `path`
pub fn extract_key(path: &Path, mode: KeyMode) -> Result<Key, ExtractError> {
    match mode {
        KeyMode::Timestamp => {
            let metadata = fs::metadata(path).map_err(|source| ExtractError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
            let time = creation_time(&metadata);
            trace!(?path, seconds = time.unix_seconds(), "Extracted creation time");
            Ok(Key::Timestamp(time))
        }
        KeyMode::Numeric => parse_numeric_name(path)
            .map(|name| Key::Number(name.sort_number()))
            .ok_or_else(|| ExtractError::NoMatch {
                path: path.to_path_buf(),
            }),
    }
}

/// Birth time when the platform reports one, metadata change time otherwise
fn creation_time(metadata: &Metadata) -> FileTime {
    FileTime::from_creation_time(metadata).unwrap_or_else(|| change_time(metadata))
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> FileTime {
    use std::os::unix::fs::MetadataExt;
    FileTime::from_unix_time(metadata.ctime(), metadata.ctime_nsec() as u32)
}

#[cfg(not(unix))]
fn change_time(metadata: &Metadata) -> FileTime {
    FileTime::from_last_modification_time(metadata)
}
