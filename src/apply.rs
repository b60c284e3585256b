//! Collision-safe execution of rename plans
//!
//! Plans whose targets never alias another step's source run left to right
//! ([`ExecutionMode::Direct`]). All others run in two passes
//! ([`ExecutionMode::Staged`]): every source is first parked under a
//! reserved temporary name, then every temporary file is moved to its
//! final name. No rename ever replaces a file that is still waiting to be
//! processed.
//!
//! Each physical rename is preceded by an occupancy check. A step that
//! fails is recorded and the batch continues.

use crate::collision::{DiskOccupancy, Occupancy, staging_path};
use crate::error::{ApplyError, PlanConflict};
use crate::plan::{RenamePlan, RenameStep, SkipReason};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, error, info, span, warn};

/// How a plan is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Direct,
    Staged,
}

impl ExecutionMode {
    pub fn for_plan(plan: &RenamePlan) -> Self {
        if plan.requires_staging() {
            ExecutionMode::Staged
        } else {
            ExecutionMode::Direct
        }
    }
}

/// Result of one plan step
#[derive(Debug)]
pub enum OutcomeStatus {
    Renamed,
    Skipped(SkipReason),
    Failed(ApplyError),
}

#[derive(Debug)]
pub struct Outcome {
    pub source: PathBuf,
    pub target: PathBuf,
    pub status: OutcomeStatus,
}

impl Outcome {
    fn new(step: &RenameStep, status: OutcomeStatus) -> Self {
        Self {
            source: step.source.clone(),
            target: step.target(),
            status,
        }
    }

    pub fn is_renamed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Renamed)
    }
}

/// Executes plans against the filesystem
pub struct Applier<O: Occupancy = DiskOccupancy> {
    occupancy: O,
}

impl Default for Applier<DiskOccupancy> {
    fn default() -> Self {
        Self::new()
    }
}

impl Applier<DiskOccupancy> {
    pub fn new() -> Self {
        Self {
            occupancy: DiskOccupancy,
        }
    }
}

impl<O: Occupancy> Applier<O> {
    /// Use a custom occupancy check in front of every rename
    pub fn with_occupancy(occupancy: O) -> Self {
        Self { occupancy }
    }

    /// Execute `plan`, returning one outcome per step in plan order
    pub fn apply(&self, plan: &RenamePlan) -> Vec<Outcome> {
        let mode = ExecutionMode::for_plan(plan);
        let _span = span!(Level::DEBUG, "apply", ?mode, steps = plan.steps.len()).entered();

        match mode {
            ExecutionMode::Direct => plan.steps.iter().map(|step| self.apply_direct(step)).collect(),
            ExecutionMode::Staged => self.apply_staged(&plan.steps),
        }
    }

    fn apply_direct(&self, step: &RenameStep) -> Outcome {
        if step.is_identity() {
            return Outcome::new(step, OutcomeStatus::Skipped(SkipReason::AlreadyInPlace));
        }

        let target = step.target();
        if self.occupancy.is_occupied(&target) {
            warn!(source = ?step.source, ?target, "Target appeared before rename, skipping");
            return Outcome::new(step, target_exists(target.clone()));
        }

        match rename(&step.source, &target) {
            Ok(()) => {
                log_renamed(step, &target);
                Outcome::new(step, OutcomeStatus::Renamed)
            }
            Err(e) => Outcome::new(step, OutcomeStatus::Failed(e)),
        }
    }

    fn apply_staged(&self, steps: &[RenameStep]) -> Vec<Outcome> {
        let mut outcomes: Vec<Option<Outcome>> = steps.iter().map(|_| None).collect();
        let mut staged: Vec<(usize, PathBuf)> = Vec::with_capacity(steps.len());

        // Pass 1: park every source under its temporary name
        for (index, step) in steps.iter().enumerate() {
            if step.is_identity() {
                outcomes[index] = Some(Outcome::new(
                    step,
                    OutcomeStatus::Skipped(SkipReason::AlreadyInPlace),
                ));
                continue;
            }

            let temp = staging_path(&step.target());
            if self.occupancy.is_occupied(&temp) {
                warn!(source = ?step.source, ?temp, "Temporary name taken, skipping");
                outcomes[index] = Some(Outcome::new(step, target_exists(temp)));
                continue;
            }

            match rename(&step.source, &temp) {
                Ok(()) => {
                    debug!(source = ?step.source, ?temp, "Staged");
                    staged.push((index, temp));
                }
                Err(e) => outcomes[index] = Some(Outcome::new(step, OutcomeStatus::Failed(e))),
            }
        }

        // Pass 2: move every temporary file to its final name
        for (index, temp) in staged {
            let step = &steps[index];
            let target = step.target();

            let status = if self.occupancy.is_occupied(&target) {
                self.restore(step, &temp, target)
            } else {
                match rename(&temp, &target) {
                    Ok(()) => {
                        log_renamed(step, &target);
                        OutcomeStatus::Renamed
                    }
                    Err(e) => OutcomeStatus::Failed(e),
                }
            };
            outcomes[index] = Some(Outcome::new(step, status));
        }

        outcomes.into_iter().flatten().collect()
    }

    /// Final name got taken after pass 1: put the file back where it came from
    fn restore(&self, step: &RenameStep, temp: &Path, target: PathBuf) -> OutcomeStatus {
        warn!(source = ?step.source, ?target, "Target appeared during staged rename, restoring");

        if !self.occupancy.is_occupied(&step.source) && rename(temp, &step.source).is_ok() {
            return target_exists(target);
        }

        error!(?target, stranded = ?temp, "Could not restore staged file");
        OutcomeStatus::Failed(ApplyError::RaceCollision {
            target,
            stranded: temp.to_path_buf(),
        })
    }
}

fn target_exists(target: PathBuf) -> OutcomeStatus {
    OutcomeStatus::Skipped(SkipReason::Conflict(PlanConflict::TargetExists { target }))
}

fn rename(from: &Path, to: &Path) -> Result<(), ApplyError> {
    fs::rename(from, to).map_err(|source| {
        error!(?from, ?to, error = %source, "Rename failed");
        ApplyError::RenameFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    })
}

fn log_renamed(step: &RenameStep, target: &Path) {
    info!(
        source = ?step.source,
        target = ?target,
        key = %step.key.describe(),
        "Renamed"
    );
}
