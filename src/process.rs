//! Main renaming pipeline
//!
//! Handles, per configured directory:
//! - Discovering candidate image files (grouped by containing directory)
//! - Extracting ordering keys
//! - Planning the renames
//! - Applying the plan, or stopping at the plan for dry runs

use crate::apply::{Applier, ExecutionMode};
use crate::collision::{DiskOccupancy, TEMP_MARKER};
use crate::config::Config;
use crate::discover::{DirectoryBatch, discover};
use crate::error::{Error, ExtractError, Result};
use crate::key::FileEntry;
use crate::plan::{Planner, RenamePlan, SkipReason, Skipped};
use crate::report::{DirectoryReport, RunSummary};
use tracing::{Level, error, info, span, warn};

/// Runs the discover, plan, apply pipeline over a [`Config`]
pub struct Processor {
    config: Config,
}

impl Processor {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check the configuration and every directory before anything is touched
    pub fn validate(&self) -> Result<()> {
        if self.config.directories.is_empty() {
            return Err(Error::Config("no directories configured".into()));
        }
        // Such targets would look like leftovers to the next run
        if self.config.prefix.starts_with(TEMP_MARKER) {
            return Err(Error::Config(format!(
                "prefix must not start with the reserved marker {TEMP_MARKER}"
            )));
        }
        for directory in &self.config.directories {
            if !directory.is_dir() {
                return Err(Error::InvalidDirectory {
                    path: directory.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run the pipeline over every configured directory
    pub fn run(&self) -> Result<Vec<DirectoryReport>> {
        let _span = span!(Level::INFO, "processor_run").entered();

        self.validate()?;

        let policy = self.config.numbering_policy();
        info!(
            %policy,
            key_mode = ?self.config.effective_key_mode(),
            recursive = self.config.recursive,
            dry_run = self.config.dry_run,
            "Starting run"
        );

        let mut reports = Vec::new();
        for directory in &self.config.directories {
            info!(?directory, "Processing directory");
            match discover(directory, self.config.recursive, &self.config) {
                Ok(batches) if batches.is_empty() => {
                    info!(?directory, "No matching files found");
                }
                Ok(batches) => {
                    reports.extend(batches.iter().map(|batch| self.process_batch(batch)));
                }
                Err(e) => {
                    error!(?directory, error = %e, "Failed to scan directory");
                    reports.push(DirectoryReport {
                        directory: directory.clone(),
                        plan: RenamePlan {
                            steps: Vec::new(),
                            skipped: vec![Skipped::new(
                                directory,
                                SkipReason::Unreadable(e.to_string()),
                            )],
                        },
                        mode: ExecutionMode::Direct,
                        outcomes: Vec::new(),
                        dry_run: self.config.dry_run,
                    });
                }
            }
        }

        info!("{}", RunSummary::from_reports(&reports).summary());
        Ok(reports)
    }

    /// Extract keys and plan the renames of one directory
    pub fn plan_batch(&self, batch: &DirectoryBatch) -> RenamePlan {
        let mode = self.config.effective_key_mode();
        let mut entries = Vec::with_capacity(batch.files.len());
        let mut skipped: Vec<Skipped> = batch
            .leftovers
            .iter()
            .map(|path| Skipped::new(path, SkipReason::StagedLeftover))
            .collect();

        for path in &batch.files {
            match FileEntry::extract(path, mode) {
                Ok(entry) => entries.push(entry),
                Err(ExtractError::NoMatch { path }) => {
                    warn!(?path, "Unexpected filename format");
                    skipped.push(Skipped::new(path, SkipReason::UnexpectedFormat));
                }
                Err(e @ ExtractError::Unreadable { .. }) => {
                    warn!(?path, error = %e, "Cannot read file, skipping");
                    skipped.push(Skipped::new(path, SkipReason::Unreadable(e.to_string())));
                }
            }
        }

        let mut plan = Planner::new(DiskOccupancy)
            .with_conflict_strategy(self.config.on_conflict)
            .plan(entries, &self.config.numbering_policy());
        skipped.append(&mut plan.skipped);
        plan.skipped = skipped;
        plan
    }

    fn process_batch(&self, batch: &DirectoryBatch) -> DirectoryReport {
        let _span = span!(Level::INFO, "directory", directory = ?batch.directory).entered();

        let plan = self.plan_batch(batch);
        let mode = ExecutionMode::for_plan(&plan);
        info!(
            files = batch.files.len(),
            steps = plan.steps.len(),
            skipped = plan.skipped.len(),
            ?mode,
            "Planned directory"
        );

        let outcomes = if self.config.dry_run {
            for step in plan.moving_steps() {
                info!(source = ?step.source, target = %step.target_name, "Would rename");
            }
            Vec::new()
        } else {
            Applier::new().apply(&plan)
        };

        DirectoryReport {
            directory: batch.directory.clone(),
            plan,
            mode,
            outcomes,
            dry_run: self.config.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyKind;
    use crate::key::KeyMode;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    fn populate(root: &Path, names: &[&str]) {
        for name in names {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, name).unwrap();
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn config_for(dir: &TempDir, policy: PolicyKind) -> Config {
        Config {
            directories: vec![dir.path().to_path_buf()],
            policy,
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_suffix_run() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["1_1.png", "2_1.png", "3.png", "cover.png"]);

        let reports = Processor::new(config_for(&dir, PolicyKind::StripSuffix))
            .run()
            .unwrap();
        assert_eq!(listing(dir.path()), vec!["1.png", "2.png", "3.png", "cover.png"]);

        let summary = RunSummary::from_reports(&reports);
        assert_eq!(summary.renamed, 2);
        let reasons: Vec<_> = summary.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert!(reasons.contains(&"already clean"));
        assert!(reasons.contains(&"unexpected filename format"));
    }

    #[test]
    fn test_descending_run_reverses_content() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["1.png", "2.png", "3.png", "4.png", "5.png"]);

        let reports = Processor::new(config_for(&dir, PolicyKind::Descending))
            .run()
            .unwrap();
        assert_eq!(reports[0].mode, ExecutionMode::Staged);
        assert_eq!(reports[0].renamed(), 4);
        assert_eq!(fs::read_to_string(dir.path().join("5.png")).unwrap(), "1.png");
        assert_eq!(fs::read_to_string(dir.path().join("1.png")).unwrap(), "5.png");
        assert_eq!(fs::read_to_string(dir.path().join("3.png")).unwrap(), "3.png");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["b.png", "a.png"]);

        let config = Config {
            key_mode: Some(KeyMode::Timestamp),
            dry_run: true,
            ..config_for(&dir, PolicyKind::Ascending)
        };
        let reports = Processor::new(config).run().unwrap();

        assert_eq!(listing(dir.path()), vec!["a.png", "b.png"]);
        assert_eq!(reports[0].planned(), 2);
        assert!(reports[0].outcomes.is_empty());
        let summary = RunSummary::from_reports(&reports);
        assert!(summary.dry_run);
        assert_eq!(summary.renamed, 0);
    }

    #[test]
    fn test_invalid_directory_aborts_before_renaming() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["1_1.png"]);

        let config = Config {
            directories: vec![dir.path().to_path_buf(), dir.path().join("missing")],
            policy: PolicyKind::StripSuffix,
            ..Default::default()
        };
        let err = Processor::new(config).run().unwrap_err();

        assert!(matches!(err, Error::InvalidDirectory { .. }));
        assert_eq!(listing(dir.path()), vec!["1_1.png"]);
    }

    #[test]
    fn test_reserved_prefix_is_rejected() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["a.png"]);

        let config = Config {
            prefix: "__tmp__page".into(),
            ..config_for(&dir, PolicyKind::Ascending)
        };
        let err = Processor::new(config).run().unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(listing(dir.path()), vec!["a.png"]);
    }

    #[test]
    fn test_recursive_numbers_each_directory() {
        let dir = tempdir().unwrap();
        populate(
            dir.path(),
            &["2021/photo/3.png", "2021/photo/7.png", "2022/photo/10.png", "2022/photo/20.png"],
        );

        let config = Config {
            recursive: true,
            key_mode: Some(KeyMode::Numeric),
            ..config_for(&dir, PolicyKind::Ascending)
        };
        let reports = Processor::new(config).run().unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(listing(&dir.path().join("2021/photo")), vec!["1.png", "2.png"]);
        assert_eq!(listing(&dir.path().join("2022/photo")), vec!["1.png", "2.png"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("2022/photo/2.png")).unwrap(),
            "2022/photo/20.png"
        );
    }

    #[test]
    fn test_leftover_files_are_reported() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["1.png", "__tmp__2.png"]);

        let config = Config {
            key_mode: Some(KeyMode::Numeric),
            ..config_for(&dir, PolicyKind::Ascending)
        };
        let reports = Processor::new(config).run().unwrap();

        let skipped = reports[0].skipped();
        assert!(skipped.contains(&(
            dir.path().join("__tmp__2.png").as_path(),
            &SkipReason::StagedLeftover
        )));
        assert_eq!(listing(dir.path()), vec!["1.png", "__tmp__2.png"]);
    }

    #[test]
    fn test_foreign_target_is_never_overwritten() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["a.png", "b.png"]);
        // A directory is not a candidate but still holds the name
        fs::create_dir(dir.path().join("2.png")).unwrap();

        let reports = Processor::new(config_for(&dir, PolicyKind::Ascending))
            .run()
            .unwrap();

        assert!(dir.path().join("2.png").is_dir());
        assert!(dir.path().join("1.png").is_file());
        assert_eq!(reports[0].renamed(), 1);
        let summary = RunSummary::from_reports(&reports);
        assert!(summary.skipped.iter().any(|s| s.reason.ends_with("already exists")));
    }

    #[test]
    fn test_plan_batch_reports_unexpected_names() {
        let dir = tempdir().unwrap();
        populate(dir.path(), &["4.png", "cover.png"]);

        let processor = Processor::new(config_for(&dir, PolicyKind::Descending));
        let batch = DirectoryBatch {
            directory: dir.path().to_path_buf(),
            files: vec![dir.path().join("4.png"), dir.path().join("cover.png")],
            leftovers: vec![],
        };
        let plan = processor.plan_batch(&batch);

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].target_name, "1.png");
        assert_eq!(
            plan.skipped,
            vec![Skipped::new(dir.path().join("cover.png"), SkipReason::UnexpectedFormat)]
        );
    }
}
