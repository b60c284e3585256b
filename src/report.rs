//! Run reports
//!
//! Pure data describing what a run planned and did. Rendering happens in
//! the binary.

use crate::apply::{ExecutionMode, Outcome, OutcomeStatus};
use crate::error::{ApplyError, Result};
use crate::plan::{RenamePlan, SkipReason};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything that happened in one directory
#[derive(Debug)]
pub struct DirectoryReport {
    pub directory: PathBuf,
    pub plan: RenamePlan,
    pub mode: ExecutionMode,
    /// One per plan step; empty for dry runs
    pub outcomes: Vec<Outcome>,
    pub dry_run: bool,
}

impl DirectoryReport {
    pub fn renamed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_renamed()).count()
    }

    /// Files the plan would move
    pub fn planned(&self) -> usize {
        self.plan.moving_steps().count()
    }

    /// Skips from planning followed by skips from applying
    pub fn skipped(&self) -> Vec<(&Path, &SkipReason)> {
        let planned = self
            .plan
            .skipped
            .iter()
            .map(|s| (s.path.as_path(), &s.reason));
        let applied = self.outcomes.iter().filter_map(|o| match &o.status {
            OutcomeStatus::Skipped(reason) => Some((o.source.as_path(), reason)),
            _ => None,
        });
        planned.chain(applied).collect()
    }

    pub fn failed(&self) -> Vec<(&Outcome, &ApplyError)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                OutcomeStatus::Failed(e) => Some((o, e)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub source: PathBuf,
    pub target: PathBuf,
    pub error: String,
}

/// Totals over every processed directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub directories: usize,
    pub renamed: usize,
    pub planned: usize,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn from_reports(reports: &[DirectoryReport]) -> Self {
        let mut summary = Self {
            directories: reports.len(),
            dry_run: reports.iter().any(|r| r.dry_run),
            ..Default::default()
        };

        for report in reports {
            summary.renamed += report.renamed();
            summary.planned += report.planned();
            summary
                .skipped
                .extend(report.skipped().into_iter().map(|(path, reason)| SkippedFile {
                    path: path.to_path_buf(),
                    reason: reason.to_string(),
                }));
            summary
                .failed
                .extend(report.failed().into_iter().map(|(outcome, error)| FailedFile {
                    source: outcome.source.clone(),
                    target: outcome.target.clone(),
                    error: error.to_string(),
                }));
        }

        summary
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Directories: {}, Planned: {}, Renamed: {}, Skipped: {}, Failed: {}",
            self.directories,
            self.planned,
            self.renamed,
            self.skipped.len(),
            self.failed.len()
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
