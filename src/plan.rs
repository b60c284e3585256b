//! Rename planning
//!
//! Turns a set of keyed files into an ordered list of renames:
//! - Sort by key, ties broken by original filename
//! - Number according to the [`NumberingPolicy`]
//! - Drop steps that would claim the same target twice
//! - Drop (or re-suffix) steps whose target is held by a file outside the plan
//!
//! Planning performs no writes; existence checks go through [`Occupancy`].

use crate::collision::{ConflictStrategy, Occupancy, is_foreign, resolve_with_counter};
use crate::error::PlanConflict;
use crate::key::{FileEntry, Key, NumericName, parse_numeric_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Numbering contract applied to the sorted entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberingPolicy {
    /// i-th entry becomes `{prefix}{start + i}{ext}`
    Ascending { start: u64, prefix: String },
    /// i-th entry becomes `{start + total - 1 - i}{ext}`
    ///
    /// `total` defaults to the number of entries and is never taken below it.
    Descending { total: Option<u64>, start: u64 },
    /// `{base}_{n}{ext}` becomes `{base}{ext}`
    ///
    /// With `suffix` set, only that exact suffix number is stripped.
    StripSuffix { suffix: Option<u64> },
}

impl fmt::Display for NumberingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberingPolicy::Ascending { start, prefix } => {
                write!(f, "ascending from {prefix}{start}")
            }
            NumberingPolicy::Descending { total, start } => match total {
                Some(total) => write!(f, "descending from {start} (total {total})"),
                None => write!(f, "descending from {start}"),
            },
            NumberingPolicy::StripSuffix { suffix } => match suffix {
                Some(n) => write!(f, "strip suffix _{n}"),
                None => write!(f, "strip numeric suffix"),
            },
        }
    }
}

/// A single planned rename within one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    pub source: PathBuf,
    pub target_name: String,
    pub key: Key,
}

impl RenameStep {
    /// Full target path, next to the source
    pub fn target(&self) -> PathBuf {
        self.source.with_file_name(&self.target_name)
    }

    /// Whether the file already carries its target name
    pub fn is_identity(&self) -> bool {
        self.source
            .file_name()
            .is_some_and(|n| n == self.target_name.as_str())
    }
}

/// Why a file was left out of a plan (or left untouched by the applier)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Name already has the clean `{n}.ext` shape
    AlreadyClean,
    /// Target equals source
    AlreadyInPlace,
    /// Name matches none of the recognised patterns
    UnexpectedFormat,
    /// Metadata could not be read
    Unreadable(String),
    /// Temporary file left behind by an interrupted staged run
    StagedLeftover,
    /// `start` plus the position overflows
    NumberOutOfRange,
    Conflict(PlanConflict),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyClean => write!(f, "already clean"),
            SkipReason::AlreadyInPlace => write!(f, "already in place"),
            SkipReason::UnexpectedFormat => write!(f, "unexpected filename format"),
            SkipReason::Unreadable(message) => write!(f, "unreadable: {message}"),
            SkipReason::StagedLeftover => write!(f, "leftover from an interrupted run"),
            SkipReason::NumberOutOfRange => write!(f, "number out of range"),
            SkipReason::Conflict(conflict) => write!(f, "{conflict}"),
        }
    }
}

/// A file that will not be renamed, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

impl Skipped {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

/// Ordered renames plus everything that was excluded while planning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    pub steps: Vec<RenameStep>,
    pub skipped: Vec<Skipped>,
}

impl RenamePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps that actually move a file
    pub fn moving_steps(&self) -> impl Iterator<Item = &RenameStep> {
        self.steps.iter().filter(|s| !s.is_identity())
    }

    /// Whether some target aliases another step's source
    ///
    /// Such plans cannot run left to right without overwriting a file that
    /// is still waiting for its own rename.
    pub fn requires_staging(&self) -> bool {
        let sources: HashSet<&Path> = self.moving_steps().map(|s| s.source.as_path()).collect();
        self.moving_steps().any(|s| sources.contains(s.target().as_path()))
    }
}

/// Builds [`RenamePlan`]s against a namespace
pub struct Planner<O: Occupancy> {
    occupancy: O,
    conflict: ConflictStrategy,
}

impl<O: Occupancy> Planner<O> {
    pub fn new(occupancy: O) -> Self {
        Self {
            occupancy,
            conflict: ConflictStrategy::default(),
        }
    }

    pub fn with_conflict_strategy(mut self, conflict: ConflictStrategy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Plan the renames of `entries` under `policy`
    ///
    /// All entries are expected to share one directory.
    pub fn plan(&self, mut entries: Vec<FileEntry>, policy: &NumberingPolicy) -> RenamePlan {
        entries.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.original_name.cmp(&b.original_name))
        });

        let mut skipped = Vec::new();
        let proposals = match policy {
            NumberingPolicy::Ascending { start, prefix } => entries
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| {
                    let number = start.checked_add(i as u64);
                    numbered_step(entry, prefix, number, &mut skipped)
                })
                .collect(),
            NumberingPolicy::Descending { total, start } => {
                let count = entries.len() as u64;
                let total = total.unwrap_or(count).max(count);
                entries
                    .iter()
                    .enumerate()
                    .filter_map(|(i, entry)| {
                        // total >= count > i
                        let number = start.checked_add(total - 1 - i as u64);
                        numbered_step(entry, "", number, &mut skipped)
                    })
                    .collect()
            }
            NumberingPolicy::StripSuffix { suffix } => {
                strip_suffix_steps(&entries, *suffix, &mut skipped)
            }
        };

        // Re-suffixing a stripped name would only recreate a suffix
        let conflict = match policy {
            NumberingPolicy::StripSuffix { .. } => ConflictStrategy::Skip,
            _ => self.conflict,
        };

        let steps = claim_unique_targets(proposals, &mut skipped);
        let steps = self.exclude_foreign_targets(steps, conflict, &mut skipped);

        for step in &steps {
            debug!(source = ?step.source, target = %step.target_name, key = %step.key.describe(), "Planned rename");
        }

        RenamePlan { steps, skipped }
    }

    /// Repeat until stable: a dropped step leaves its source in place, which
    /// can turn that name into a foreign occupant for another step.
    fn exclude_foreign_targets(
        &self,
        mut steps: Vec<RenameStep>,
        conflict: ConflictStrategy,
        skipped: &mut Vec<Skipped>,
    ) -> Vec<RenameStep> {
        loop {
            let movers: HashSet<PathBuf> = steps
                .iter()
                .filter(|s| !s.is_identity())
                .map(|s| s.source.clone())
                .collect();
            let mut claimed: HashSet<PathBuf> = steps.iter().map(|s| s.target()).collect();

            let mut changed = false;
            let mut kept = Vec::with_capacity(steps.len());

            for step in steps {
                let target = step.target();
                if step.is_identity() || !is_foreign(&self.occupancy, &target, &movers) {
                    kept.push(step);
                    continue;
                }
                changed = true;

                let alternative = match conflict {
                    ConflictStrategy::Suffix => {
                        resolve_with_counter(&target, &self.occupancy, &claimed)
                    }
                    ConflictStrategy::Skip => None,
                };

                match alternative.as_deref().and_then(Path::file_name) {
                    Some(name) => {
                        let target_name = name.to_string_lossy().into_owned();
                        debug!(source = ?step.source, ?target, %target_name, "Target taken, using counter suffix");
                        claimed.insert(step.source.with_file_name(&target_name));
                        kept.push(RenameStep {
                            target_name,
                            ..step
                        });
                    }
                    None => {
                        warn!(source = ?step.source, ?target, "Target already exists, skipping");
                        skipped.push(Skipped::new(
                            step.source,
                            SkipReason::Conflict(PlanConflict::TargetExists { target }),
                        ));
                    }
                }
            }

            steps = kept;
            if !changed {
                return steps;
            }
        }
    }
}

/// Keep the first step (in sort order) for every target, report the rest
fn claim_unique_targets(steps: Vec<RenameStep>, skipped: &mut Vec<Skipped>) -> Vec<RenameStep> {
    let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut kept = Vec::with_capacity(steps.len());

    for step in steps {
        let target = step.target();
        match owners.get(&target) {
            Some(owner) => {
                warn!(source = ?step.source, ?target, kept = ?owner, "Ambiguous target, skipping");
                skipped.push(Skipped::new(
                    step.source,
                    SkipReason::Conflict(PlanConflict::AmbiguousBase {
                        target,
                        kept: owner.clone(),
                    }),
                ));
            }
            None => {
                owners.insert(target, step.source.clone());
                kept.push(step);
            }
        }
    }

    kept
}

/// `None` (and a skip) when the number does not fit in a `u64`
fn numbered_step(
    entry: &FileEntry,
    prefix: &str,
    number: Option<u64>,
    skipped: &mut Vec<Skipped>,
) -> Option<RenameStep> {
    let Some(number) = number else {
        warn!(path = ?entry.path, "Assigned number out of range, skipping");
        skipped.push(Skipped::new(&entry.path, SkipReason::NumberOutOfRange));
        return None;
    };
    Some(RenameStep {
        source: entry.path.clone(),
        target_name: format!("{}{}{}", prefix, number, extension_of(&entry.path)),
        key: entry.key,
    })
}

fn strip_suffix_steps(
    entries: &[FileEntry],
    only: Option<u64>,
    skipped: &mut Vec<Skipped>,
) -> Vec<RenameStep> {
    let mut steps = Vec::new();

    for entry in entries {
        match parse_numeric_name(&entry.path) {
            Some(NumericName::Clean(_)) => {
                debug!(path = ?entry.path, "Already clean");
                skipped.push(Skipped::new(&entry.path, SkipReason::AlreadyClean));
            }
            Some(NumericName::Suffixed { base, suffix }) if only.is_none_or(|n| n == suffix) => {
                steps.push(RenameStep {
                    source: entry.path.clone(),
                    target_name: format!("{}{}", base, extension_of(&entry.path)),
                    key: entry.key,
                });
            }
            _ => {
                warn!(path = ?entry.path, "Unexpected filename format");
                skipped.push(Skipped::new(&entry.path, SkipReason::UnexpectedFormat));
            }
        }
    }

    steps
}

/// `.ext` of `path` as written on disk, or empty
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    fn at(seconds: i64) -> Key {
        Key::Timestamp(FileTime::from_unix_time(seconds, 0))
    }

    fn numbered(dir: &str, names: &[&str]) -> Vec<FileEntry> {
        names
            .iter()
            .map(|name| {
                let path = Path::new(dir).join(name);
                let key = parse_numeric_name(&path)
                    .map(|n| Key::Number(n.sort_number()))
                    .unwrap_or(Key::Number(0));
                FileEntry::new(path, key)
            })
            .collect()
    }

    fn disk_of(entries: &[FileEntry]) -> HashSet<PathBuf> {
        entries.iter().map(|e| e.path.clone()).collect()
    }

    fn mapping(plan: &RenamePlan) -> Vec<(String, String)> {
        plan.steps
            .iter()
            .map(|s| {
                (
                    s.source.file_name().unwrap().to_string_lossy().into_owned(),
                    s.target_name.clone(),
                )
            })
            .collect()
    }

    fn ascending() -> NumberingPolicy {
        NumberingPolicy::Ascending {
            start: 1,
            prefix: String::new(),
        }
    }

    #[test]
    fn test_ascending_by_creation_time() {
        let entries = vec![
            FileEntry::new("/d/A.png", at(200)),
            FileEntry::new("/d/B.png", at(300)),
            FileEntry::new("/d/C.png", at(100)),
        ];
        let disk = disk_of(&entries);
        let plan = Planner::new(&disk).plan(entries, &ascending());

        assert_eq!(
            mapping(&plan),
            vec![
                ("C.png".into(), "1.png".into()),
                ("A.png".into(), "2.png".into()),
                ("B.png".into(), "3.png".into()),
            ]
        );
        assert!(plan.skipped.is_empty());
        assert!(!plan.requires_staging());
    }

    #[test]
    fn test_ties_break_by_filename() {
        let entries = vec![
            FileEntry::new("/d/b.png", at(100)),
            FileEntry::new("/d/a.png", at(100)),
            FileEntry::new("/d/c.png", at(50)),
        ];
        let disk = disk_of(&entries);
        let plan = Planner::new(&disk).plan(entries, &ascending());

        assert_eq!(
            mapping(&plan),
            vec![
                ("c.png".into(), "1.png".into()),
                ("a.png".into(), "2.png".into()),
                ("b.png".into(), "3.png".into()),
            ]
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let mut entries: Vec<FileEntry> = (0..12)
            .map(|i| FileEntry::new(format!("/d/scan{i}.png"), at(1_000 + (i % 4))))
            .collect();
        let disk = disk_of(&entries);
        let planner = Planner::new(&disk);

        let first = planner.plan(entries.clone(), &ascending());
        entries.reverse();
        let second = planner.plan(entries.clone(), &ascending());
        entries.rotate_left(5);
        let third = planner.plan(entries, &ascending());

        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_prefix_start_and_extension() {
        let entries = vec![
            FileEntry::new("/d/x.PNG", at(1)),
            FileEntry::new("/d/y.png", at(2)),
        ];
        let disk = disk_of(&entries);
        let policy = NumberingPolicy::Ascending {
            start: 10,
            prefix: "p".into(),
        };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert_eq!(
            mapping(&plan),
            vec![
                ("x.PNG".into(), "p10.PNG".into()),
                ("y.png".into(), "p11.png".into()),
            ]
        );
    }

    #[test]
    fn test_ascending_and_descending_are_bijections() {
        for policy in [
            ascending(),
            NumberingPolicy::Descending {
                total: None,
                start: 1,
            },
        ] {
            let entries: Vec<FileEntry> = (0..7)
                .map(|i| FileEntry::new(format!("/d/f{i}.png"), at(i)))
                .collect();
            let disk = disk_of(&entries);
            let plan = Planner::new(&disk).plan(entries, &policy);

            let mut numbers: Vec<u64> = plan
                .steps
                .iter()
                .map(|s| s.target_name.trim_end_matches(".png").parse().unwrap())
                .collect();
            numbers.sort_unstable();
            assert_eq!(numbers, (1..=7).collect::<Vec<_>>(), "{policy}");
        }
    }

    #[test]
    fn test_descending_reverses_numbers() {
        let entries = numbered("/d", &["1.png", "2.png", "3.png", "4.png", "5.png"]);
        let disk = disk_of(&entries);
        let policy = NumberingPolicy::Descending {
            total: None,
            start: 1,
        };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert_eq!(
            mapping(&plan),
            vec![
                ("1.png".into(), "5.png".into()),
                ("2.png".into(), "4.png".into()),
                ("3.png".into(), "3.png".into()),
                ("4.png".into(), "2.png".into()),
                ("5.png".into(), "1.png".into()),
            ]
        );
        assert!(plan.steps[2].is_identity());
        assert!(plan.requires_staging());
    }

    #[test]
    fn test_descending_total_never_below_count() {
        let entries = numbered("/d", &["1.png", "2.png", "3.png"]);
        let disk = disk_of(&entries);

        let short = NumberingPolicy::Descending {
            total: Some(2),
            start: 1,
        };
        let plan = Planner::new(&disk).plan(entries.clone(), &short);
        assert_eq!(plan.steps[0].target_name, "3.png");

        let long = NumberingPolicy::Descending {
            total: Some(5),
            start: 1,
        };
        let plan = Planner::new(&disk).plan(entries, &long);
        let targets: Vec<_> = plan.steps.iter().map(|s| s.target_name.as_str()).collect();
        assert_eq!(targets, vec!["5.png", "4.png", "3.png"]);
    }

    #[test]
    fn test_numbers_past_u64_max_are_skipped() {
        let entries = numbered("/d", &["a.png", "b.png"]);
        let disk = disk_of(&entries);
        let policy = NumberingPolicy::Ascending {
            start: u64::MAX,
            prefix: String::new(),
        };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert_eq!(mapping(&plan), vec![("a.png".into(), format!("{}.png", u64::MAX))]);
        assert_eq!(
            plan.skipped,
            vec![Skipped::new("/d/b.png", SkipReason::NumberOutOfRange)]
        );

        let entries = numbered("/d", &["7.png"]);
        let disk = disk_of(&entries);
        let policy = NumberingPolicy::Descending {
            total: Some(u64::MAX),
            start: 2,
        };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert!(plan.steps.is_empty());
        assert_eq!(plan.skipped[0].reason, SkipReason::NumberOutOfRange);
    }

    #[test]
    fn test_strip_suffix_plan() {
        let entries = numbered("/d", &["1_1.png", "2_1.png", "3.png"]);
        let disk = disk_of(&entries);
        let plan = Planner::new(&disk).plan(entries, &NumberingPolicy::StripSuffix { suffix: None });

        assert_eq!(
            mapping(&plan),
            vec![
                ("1_1.png".into(), "1.png".into()),
                ("2_1.png".into(), "2.png".into()),
            ]
        );
        assert_eq!(
            plan.skipped,
            vec![Skipped::new("/d/3.png", SkipReason::AlreadyClean)]
        );
        assert!(!plan.requires_staging());
    }

    #[test]
    fn test_strip_suffix_ambiguous_base() {
        let entries = numbered("/d", &["5_2.png", "5_1.png"]);
        let disk = disk_of(&entries);
        let plan = Planner::new(&disk).plan(entries, &NumberingPolicy::StripSuffix { suffix: None });

        assert_eq!(mapping(&plan), vec![("5_1.png".into(), "5.png".into())]);
        assert_eq!(
            plan.skipped,
            vec![Skipped::new(
                "/d/5_2.png",
                SkipReason::Conflict(PlanConflict::AmbiguousBase {
                    target: PathBuf::from("/d/5.png"),
                    kept: PathBuf::from("/d/5_1.png"),
                })
            )]
        );
    }

    #[test]
    fn test_strip_exact_suffix_only() {
        let entries = numbered("/d", &["1_1.png", "2_2.png"]);
        let disk = disk_of(&entries);
        let policy = NumberingPolicy::StripSuffix { suffix: Some(1) };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert_eq!(mapping(&plan), vec![("1_1.png".into(), "1.png".into())]);
        assert_eq!(
            plan.skipped,
            vec![Skipped::new("/d/2_2.png", SkipReason::UnexpectedFormat)]
        );
    }

    #[test]
    fn test_strip_suffix_keeps_clean_file() {
        // 4.png is not part of the plan, so it blocks 4_1.png
        let entries = numbered("/d", &["4.png", "4_1.png"]);
        let disk = disk_of(&entries);
        let plan = Planner::new(&disk)
            .with_conflict_strategy(ConflictStrategy::Suffix)
            .plan(entries, &NumberingPolicy::StripSuffix { suffix: None });

        assert!(plan.is_empty());
        assert!(plan.skipped.contains(&Skipped::new(
            "/d/4_1.png",
            SkipReason::Conflict(PlanConflict::TargetExists {
                target: PathBuf::from("/d/4.png")
            })
        )));
    }

    #[test]
    fn test_foreign_target_is_skipped() {
        let entries = vec![
            FileEntry::new("/d/a.png", at(1)),
            FileEntry::new("/d/b.png", at(2)),
        ];
        let mut disk = disk_of(&entries);
        disk.insert(PathBuf::from("/d/2.png"));

        let plan = Planner::new(&disk).plan(entries, &ascending());
        assert_eq!(mapping(&plan), vec![("a.png".into(), "1.png".into())]);
        assert_eq!(
            plan.skipped,
            vec![Skipped::new(
                "/d/b.png",
                SkipReason::Conflict(PlanConflict::TargetExists {
                    target: PathBuf::from("/d/2.png")
                })
            )]
        );
    }

    #[test]
    fn test_foreign_target_with_counter_suffix() {
        let entries = vec![
            FileEntry::new("/d/a.png", at(1)),
            FileEntry::new("/d/b.png", at(2)),
        ];
        let mut disk = disk_of(&entries);
        disk.insert(PathBuf::from("/d/2.png"));

        let plan = Planner::new(&disk)
            .with_conflict_strategy(ConflictStrategy::Suffix)
            .plan(entries, &ascending());
        assert_eq!(
            mapping(&plan),
            vec![
                ("a.png".into(), "1.png".into()),
                ("b.png".into(), "2_1.png".into()),
            ]
        );
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_dropped_step_blocks_its_own_source_name() {
        // 2.png -> 3.png is blocked by a foreign 3.png, so 2.png stays and
        // in turn blocks 1.png -> 2.png
        let entries = numbered("/d", &["1.png", "2.png"]);
        let mut disk = disk_of(&entries);
        disk.insert(PathBuf::from("/d/3.png"));

        let policy = NumberingPolicy::Ascending {
            start: 2,
            prefix: String::new(),
        };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn test_identity_plan_needs_no_staging() {
        let entries = numbered("/d", &["1.png", "2.png", "3.png"]);
        let disk = disk_of(&entries);
        let plan = Planner::new(&disk).plan(entries, &ascending());

        assert!(plan.steps.iter().all(RenameStep::is_identity));
        assert!(!plan.requires_staging());
    }

    #[test]
    fn test_shift_into_own_range_needs_staging() {
        let entries = numbered("/d", &["1.png", "2.png"]);
        let disk = disk_of(&entries);
        let policy = NumberingPolicy::Ascending {
            start: 2,
            prefix: String::new(),
        };
        let plan = Planner::new(&disk).plan(entries, &policy);

        assert_eq!(
            mapping(&plan),
            vec![
                ("1.png".into(), "2.png".into()),
                ("2.png".into(), "3.png".into()),
            ]
        );
        assert!(plan.requires_staging());
    }
}
