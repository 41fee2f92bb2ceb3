use crate::cli::Cli;
use crate::config::{MatrixConfig, Settings};
use crate::driver::SystemRunner;
use crate::matrix::{self, Selection, DEVEL_SUFFIX};
use crate::summary::{Summary, SUMMARY_FILE};
use crate::sweep::{Runner, Sweep};
use anyhow::{bail, Result};
use chrono::Local;
use std::io::{self, Write};
use tracing::{debug, info, warn};

const TIME_FORMAT: &str = "%a %d %b %Y %H:%M:%S";

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    let matrix = settings.load_matrix()?;
    matrix.validate()?;

    let selection = cli.selection();
    let mut stdout = io::stdout().lock();

    if selection.is_empty() {
        if let Err(e) = crate::logging::init_console() {
            eprintln!("warning: {e:#}");
        }
        execute(&settings, &matrix, selection, SystemRunner, &mut stdout)?;
        return Ok(());
    }

    let log = crate::logging::init(&settings.log_root(), "sweep")?;
    debug!("Log file: {}", log.file.display());
    debug!("Supplied arguments: {cli:?}");
    debug!("Settings: {settings:?}");

    preflight(&settings)?;
    execute(&settings, &matrix, selection, SystemRunner, &mut stdout)?;
    Ok(())
}

/// Print the candidate matrix, then sweep whatever `selection` asks for.
/// Returns `None` for a listing-only run.
pub fn execute<R, W>(
    settings: &Settings,
    matrix: &MatrixConfig,
    selection: Selection,
    runner: R,
    out: &mut W,
) -> Result<Option<Summary>>
where
    R: Runner,
    W: Write,
{
    write!(out, "{}", render_candidates(matrix))?;
    out.flush()?;

    if selection.is_empty() {
        info!("Neither --gcc nor --clang given: listing only");
        return Ok(None);
    }

    let jobs = matrix::enumerate(matrix, selection);
    let started = Local::now();
    info!("Starting at {} ({} jobs)", started.format(TIME_FORMAT), jobs.len());

    let reports = Sweep::new(settings, runner).run(&jobs);

    let finished = Local::now();
    info!("Ending at {}", finished.format(TIME_FORMAT));

    let summary = Summary::new(reports, started, finished);
    write!(out, "{}", summary.render())?;
    out.flush()?;

    let path = settings.log_root().join(SUMMARY_FILE);
    match summary.write_json(&path) {
        Ok(()) => info!("Summary written to {}", path.display()),
        Err(e) => warn!("{e:#}"),
    }

    Ok(Some(summary))
}

/// Fail early on problems that would sink every job.
fn preflight(settings: &Settings) -> Result<()> {
    if which::which("git").is_err() {
        bail!("missing `git` in PATH");
    }
    if !settings.driver.is_file() {
        bail!(
            "build driver not found at {} (set TOOLCHAIN_SWEEP_DRIVER)",
            settings.driver.display()
        );
    }
    Ok(())
}

/// The candidate lists, printed on every run.
pub fn render_candidates(matrix: &MatrixConfig) -> String {
    let targets: String = matrix.targets.iter().map(|t| format!("  {t}\n")).collect();
    let clang: String = matrix
        .targets
        .iter()
        .map(|&t| format!("  {:20} {}\n", t.triple(), matrix.clang_versions_for(t).join(" ")))
        .collect();

    let mut out = format!(
        "=== Build matrix ===\n\n\
         Targets:\n{targets}\n\
         GCC versions:\n  {}\n\n\
         Clang versions:\n{clang}\n\
         Binutils: base {}, latest {}\n\
         Newlib:   base {}, latest {}\n",
        matrix.gcc_versions.join(" "),
        matrix.binutils.base,
        matrix.binutils.latest,
        matrix.newlib.base,
        matrix.newlib.latest,
    );

    let devel: Vec<&str> = matrix
        .targets
        .iter()
        .filter(|t| t.needs_devel_newlib())
        .map(|t| t.triple())
        .collect();
    if !devel.is_empty() {
        out.push_str(&format!(
            "          (Clang on {} uses newlib <version>{DEVEL_SUFFIX})\n",
            devel.join(", ")
        ));
    }
    out.push('\n');
    out
}
