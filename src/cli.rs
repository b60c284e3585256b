//! CLI argument parsing with clap

use crate::collision::ConflictStrategy;
use crate::config::{Config, PolicyKind};
use crate::key::KeyMode;
use clap::Parser;
use std::path::PathBuf;

/// Paper Sorter - Renumber scanned exam-paper images
///
/// Renames the page images of each directory to a contiguous numeric
/// sequence ordered by creation time or by the number already in the
/// filename, without ever overwriting an unrelated file.
#[derive(Parser, Debug)]
#[command(name = "paper-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Directories whose images are renumbered
    #[arg(short, long, num_args = 1..)]
    pub input: Option<Vec<PathBuf>>,

    /// Numbering policy:
    /// - ascending: earliest file becomes 1 (default)
    /// - descending: earliest file gets the highest number
    /// - strip-suffix: 12_1.png becomes 12.png
    #[arg(short, long, value_enum)]
    pub policy: Option<PolicyKind>,

    /// Ordering key (defaults to timestamp for ascending, numeric otherwise)
    #[arg(short, long, value_enum)]
    pub key: Option<KeyMode>,

    /// First number assigned
    #[arg(short, long)]
    pub start: Option<u64>,

    /// Prefix placed before the number (ascending only)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Total for descending numbering (defaults to the number of files)
    #[arg(long)]
    pub total: Option<u64>,

    /// Only strip this exact suffix number (strip-suffix only)
    #[arg(long)]
    pub suffix: Option<u64>,

    /// What to do when a target name belongs to an unrelated file
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictStrategy>,

    /// Also process every subdirectory, each numbered on its own
    #[arg(short, long)]
    pub recursive: bool,

    /// Image extensions to process (case-insensitive)
    #[arg(long = "ext", num_args = 1..)]
    pub extensions: Option<Vec<String>>,

    /// Directory names or paths to exclude from recursive scanning
    #[arg(long = "exclude", num_args = 1..)]
    pub exclude_dirs: Option<Vec<PathBuf>>,

    /// Dry run mode - show the plan without renaming anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Directory for log files (defaults to Log/ beside the executable)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Write a commented sample configuration to this path and exit
    #[arg(long)]
    pub init_config: Option<PathBuf>,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref inputs) = self.input {
            config.directories = inputs.clone();
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(key) = self.key {
            config.key_mode = Some(key);
        }
        if let Some(start) = self.start {
            config.start = start;
        }
        if let Some(ref prefix) = self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(total) = self.total {
            config.total = Some(total);
        }
        if let Some(suffix) = self.suffix {
            config.suffix = Some(suffix);
        }
        if let Some(on_conflict) = self.on_conflict {
            config.on_conflict = on_conflict;
        }
        if let Some(ref extensions) = self.extensions {
            config.extensions = extensions.clone();
        }
        if let Some(ref exclude_dirs) = self.exclude_dirs {
            config.exclude_dirs = exclude_dirs.clone();
        }
        if self.recursive {
            config.recursive = true;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
