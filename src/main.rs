//! Paper Sorter - Renumber scanned exam-paper images
//!
//! A CLI tool that renames the page images of each directory to a
//! contiguous numeric sequence without overwriting unrelated files.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use paper_sorter::{Cli, Config, DirectoryReport, Processor, RunSummary};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status when some renames failed but the run completed
const EXIT_RENAME_FAILED: u8 = 2;
const EXIT_ABORTED: u8 = 1;

mod terminal {
    //! Colored terminal output

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, PrintStyledContent, Stylize},
    };
    use std::io::stdout;

    pub const OK: Color = Color::Green;
    pub const WARN: Color = Color::Yellow;
    pub const FAIL: Color = Color::Red;
    pub const DIM: Color = Color::DarkGrey;
    pub const ACCENT: Color = Color::Cyan;

    const RULE_WIDTH: usize = 60;

    pub fn rule() {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(RULE_WIDTH))));
    }

    pub fn heading(title: &str) {
        rule();
        let _ = stdout().execute(PrintStyledContent(format!("  {title}\n").bold()));
        rule();
    }

    pub fn blank() {
        let _ = stdout().execute(Print("\n"));
    }

    /// `  label: value` with the value in `color`
    pub fn field(label: &str, value: &str, color: Color) {
        let _ = stdout()
            .execute(Print("  "))
            .and_then(|out| out.execute(PrintStyledContent(label.with(DIM))))
            .and_then(|out| out.execute(Print(": ")))
            .and_then(|out| out.execute(PrintStyledContent(value.with(color).bold())))
            .and_then(|out| out.execute(Print("\n")));
    }

    /// `  <icon> <path> <detail>` for one file
    pub fn file_line(icon: &str, color: Color, path: &str, detail: &str) {
        let _ = stdout()
            .execute(Print("  "))
            .and_then(|out| out.execute(PrintStyledContent(icon.with(color).bold())))
            .and_then(|out| out.execute(Print(format!(" {path} "))))
            .and_then(|out| out.execute(PrintStyledContent(detail.with(DIM))))
            .and_then(|out| out.execute(Print("\n")));
    }

    pub fn notice(icon: &str, color: Color, msg: &str) {
        let _ = stdout()
            .execute(PrintStyledContent(format!("{icon} ").with(color).bold()))
            .and_then(|out| out.execute(Print(format!("{msg}\n"))));
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.init_config {
        Some(ref path) => write_sample_config(path).map(|()| ExitCode::SUCCESS),
        None => run(&cli),
    };

    // The log guard has been dropped by now, so the file is complete
    outcome.unwrap_or_else(|e| {
        terminal::notice("✗", terminal::FAIL, &format!("{e:#}"));
        ExitCode::from(EXIT_ABORTED)
    })
}

/// Everything between logging setup and the final exit status
fn run(cli: &Cli) -> Result<ExitCode> {
    let exe_dir = executable_dir()?;
    let log_path = log_file_path(&exe_dir, cli);
    let _guard = setup_logging(cli, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), log_file = %log_path.display(), "Paper Sorter starting");

    let config = load_config(cli, &exe_dir).inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    if config.verbose {
        info!(?config, "Configuration loaded");
    }

    let verbose = config.verbose;
    let reports = Processor::new(config)
        .run()
        .inspect_err(|e| error!(error = %e, "Processing failed"))?;

    let summary = RunSummary::from_reports(&reports);
    render_summary(&reports, &summary, verbose);

    if let Some(ref path) = cli.summary_json {
        std::fs::write(path, summary.to_json()?)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Summary written");
    }

    terminal::blank();
    terminal::field("Log file", &log_path.display().to_string(), terminal::ACCENT);
    info!(failed = summary.failed.len(), "Run finished");

    Ok(ExitCode::from(exit_status(&summary)))
}

fn exit_status(summary: &RunSummary) -> u8 {
    if summary.has_failures() {
        EXIT_RENAME_FAILED
    } else {
        0
    }
}

/// Print totals, per-file detail and failures
fn render_summary(reports: &[DirectoryReport], summary: &RunSummary, verbose: bool) {
    use terminal::*;

    heading(if summary.dry_run {
        "DRY RUN COMPLETE"
    } else {
        "PROCESSING COMPLETE"
    });
    field("Directories", &summary.directories.to_string(), ACCENT);
    if summary.dry_run {
        field("Planned", &summary.planned.to_string(), ACCENT);
    } else {
        field("Renamed", &summary.renamed.to_string(), OK);
    }
    field("Skipped", &summary.skipped.len().to_string(), WARN);
    field("Failed", &summary.failed.len().to_string(), FAIL);

    // Dry runs always list the plan
    if summary.dry_run || verbose {
        for report in reports {
            blank();
            field(
                &report.directory.display().to_string(),
                &format!("{:?}", report.mode),
                DIM,
            );
            render_directory(report);
        }
    }

    if !summary.failed.is_empty() {
        blank();
        notice("✗", FAIL, &format!("Failed files: {}", summary.failed.len()));
        for failed in &summary.failed {
            file_line("✗", FAIL, &failed.source.display().to_string(), &failed.error);
        }
    }

    if summary.dry_run {
        blank();
        notice("⚠", WARN, "[DRY RUN] No files were actually renamed.");
    }
}

fn render_directory(report: &DirectoryReport) {
    use terminal::*;

    if report.dry_run {
        for step in report.plan.moving_steps() {
            let detail = format!("→ {} ({})", step.target_name, step.key.describe());
            file_line("~", ACCENT, &step.source.display().to_string(), &detail);
        }
    } else {
        for outcome in report.outcomes.iter().filter(|o| o.is_renamed()) {
            let target = outcome
                .target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            file_line("✓", OK, &outcome.source.display().to_string(), &format!("→ {target}"));
        }
    }

    for (path, reason) in report.skipped() {
        file_line("⊘", WARN, &path.display().to_string(), &reason.to_string());
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot locate the executable")?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")))
}

/// `<log dir>/PaperSorter_<stamp>.log`, or `<log dir>/<config>/<config>_<stamp>.log`
fn log_file_path(exe_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = cli.log_dir.clone().unwrap_or_else(|| exe_dir.join("Log"));
    let stamp = Local::now().format("%Y%m%d_%H%M%S");

    match cli.config_name() {
        Some(name) => log_dir.join(&name).join(format!("{name}_{stamp}.log")),
        None => log_dir.join(format!("PaperSorter_{stamp}.log")),
    }
}

/// Candidate locations for `-C <path>`, most specific first
///
/// The path as given, then with a `.toml` extension, then inside the
/// `Config/` directory beside the executable.
fn config_candidates(exe_dir: &Path, given: &Path) -> Vec<PathBuf> {
    let with_toml = |p: PathBuf| {
        if p.extension().is_none() {
            p.with_extension("toml")
        } else {
            p
        }
    };

    let mut candidates = vec![given.to_path_buf(), with_toml(given.to_path_buf())];
    if let Some(name) = given.file_name() {
        candidates.push(with_toml(exe_dir.join("Config").join(name)));
    }
    candidates.dedup();
    candidates
}

fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = match cli.config {
        Some(ref given) => {
            let path = config_candidates(exe_dir, given)
                .into_iter()
                .find(|p| p.is_file())
                .unwrap_or_else(|| given.clone());
            info!(config_file = %path.display(), "Loading configuration from file");
            cli.merge_with_config(Config::load_from_file(&path)?)
        }
        None => cli.to_config(),
    };

    if config.directories.is_empty() {
        anyhow::bail!("No directories specified. Use -i/--input or specify them in the config file.");
    }
    Ok(config)
}

fn write_sample_config(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::sample_config())?;
    terminal::notice("→", terminal::DIM, &format!("Sample configuration written to {}", path.display()));
    Ok(())
}

/// Log to stderr and to `log_path`; the file layer is JSON with `--json-log`
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
    }
    let file = std::fs::File::create(log_path)
        .with_context(|| format!("Cannot create log file {}", log_path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
    let file_layer = if cli.json_log {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
