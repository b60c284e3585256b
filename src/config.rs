//! Configuration types for the paper sorter

use crate::collision::ConflictStrategy;
use crate::key::KeyMode;
use crate::plan::NumberingPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Numbering policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Earliest file gets the lowest number
    #[default]
    Ascending,
    /// Earliest file gets the highest number
    Descending,
    /// Remove a trailing `_n` from already numbered files
    StripSuffix,
}

/// Configuration for the paper sorter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directories whose images are renumbered
    pub directories: Vec<PathBuf>,

    /// Also process every subdirectory (each numbered independently)
    pub recursive: bool,

    /// Numbering policy
    pub policy: PolicyKind,

    /// Ordering key; defaults to timestamp for ascending, numeric otherwise
    pub key_mode: Option<KeyMode>,

    /// First number assigned
    pub start: u64,

    /// Prefix placed before the number (ascending only)
    pub prefix: String,

    /// Total used for descending numbering (defaults to the file count)
    pub total: Option<u64>,

    /// Only strip this exact suffix number (strip-suffix only)
    pub suffix: Option<u64>,

    /// What to do when a target is held by a file outside the plan
    pub on_conflict: ConflictStrategy,

    /// Supported image extensions
    pub extensions: Vec<String>,

    /// Directories to exclude from scanning (can be absolute paths or folder names)
    pub exclude_dirs: Vec<PathBuf>,

    /// Dry run mode - compute plans without renaming
    pub dry_run: bool,

    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directories: vec![],
            recursive: false,
            policy: PolicyKind::default(),
            key_mode: None,
            start: 1,
            prefix: String::new(),
            total: None,
            suffix: None,
            on_conflict: ConflictStrategy::default(),
            extensions: vec!["png".into()],
            exclude_dirs: vec![],
            dry_run: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Check if a file extension is supported
    pub fn is_supported(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').to_lowercase() == ext_lower)
    }

    /// Key mode after applying the per-policy default
    pub fn effective_key_mode(&self) -> KeyMode {
        self.key_mode.unwrap_or(match self.policy {
            PolicyKind::Ascending => KeyMode::Timestamp,
            PolicyKind::Descending | PolicyKind::StripSuffix => KeyMode::Numeric,
        })
    }

    /// Build the numbering policy described by this configuration
    pub fn numbering_policy(&self) -> NumberingPolicy {
        match self.policy {
            PolicyKind::Ascending => NumberingPolicy::Ascending {
                start: self.start,
                prefix: self.prefix.clone(),
            },
            PolicyKind::Descending => NumberingPolicy::Descending {
                total: self.total,
                start: self.start,
            },
            PolicyKind::StripSuffix => NumberingPolicy::StripSuffix {
                suffix: self.suffix,
            },
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Paper Sorter Configuration File
# This file uses TOML format (https://toml.io)

# Directories whose page images are renumbered
directories = [
    "/scans/phys/2022/photo",
    "/scans/phys/2021/photo",
]

# Also process every subdirectory; each directory is numbered on its own
recursive = false

# Numbering policy: "ascending", "descending", or "strip-suffix"
# - ascending: earliest file becomes 1.png, the next 2.png, ...
# - descending: earliest file gets the highest number (reverses page order)
# - strip-suffix: 12_1.png becomes 12.png
policy = "ascending"

# Ordering key: "timestamp" (creation time) or "numeric" (number in the name)
# Defaults to timestamp for ascending and numeric for the other policies
# key_mode = "timestamp"

# First number assigned
start = 1

# Prefix placed before the number (ascending only)
prefix = ""

# Total for descending numbering (defaults to the number of files)
# total = 45

# Only strip this exact suffix (strip-suffix only); unset strips any _n
# suffix = 1

# When a target name belongs to a file outside the plan: "skip" or "suffix"
# - skip: leave the file alone and report it
# - suffix: use the first free name_1.png, name_2.png, ...
on_conflict = "skip"

# Image extensions (case-insensitive)
extensions = ["png"]

# Directories to exclude from recursive scanning
exclude_dirs = [".thumbnails"]

# Dry run mode - show the plan without renaming anything
dry_run = false

# Verbose output - show every file in the summary
verbose = false
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError { source: toml::ser::Error },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}
