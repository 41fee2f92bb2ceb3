//! The sweep loop.
//!
//! Jobs run strictly one after another in the shared scratch directory.
//! Any failing step ends its job and the sweep moves on; every job runs
//! exactly once and gets a [`JobReport`].

use crate::config::Settings;
use crate::driver::DriverInvocation;
use crate::matrix::BuildJob;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a step of a job failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("preparing {}: {source}", .path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkout of {revision} in {} failed: {detail}", .tree.display())]
    Checkout {
        tree: PathBuf,
        revision: String,
        detail: String,
    },
    #[error("could not start {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("driver exited with {status}, output in {}", .log.display())]
    Exit { status: String, log: PathBuf },
}

/// Side effects of a job. Implemented by [`crate::driver::SystemRunner`]
/// and by test fakes.
pub trait Runner {
    /// Check out `revision` in the git tree at `tree`.
    fn checkout(&mut self, tree: &Path, revision: &str) -> Result<(), StepError>;

    /// Run the external build driver to completion. [`StepError::Prepare`]
    /// means the driver was never started.
    fn build(&mut self, invocation: &DriverInvocation) -> Result<(), StepError>;
}

impl<R: Runner + ?Sized> Runner for &mut R {
    fn checkout(&mut self, tree: &Path, revision: &str) -> Result<(), StepError> {
        (**self).checkout(tree, revision)
    }

    fn build(&mut self, invocation: &DriverInvocation) -> Result<(), StepError> {
        (**self).build(invocation)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    /// The driver ran and failed.
    Failed(String),
    /// The driver never ran because preparing the job failed.
    Skipped(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct JobReport {
    pub job: BuildJob,
    pub install_name: String,
    pub outcome: Outcome,
    pub seconds: u64,
}

pub struct Sweep<'a, R> {
    settings: &'a Settings,
    runner: R,
    inherited_path: Option<OsString>,
}

impl<'a, R: Runner> Sweep<'a, R> {
    pub fn new(settings: &'a Settings, runner: R) -> Self {
        Self {
            settings,
            runner,
            inherited_path: std::env::var_os("PATH"),
        }
    }

    /// Replace the `PATH` the driver environment is built on.
    #[must_use]
    pub fn with_inherited_path(mut self, path: Option<OsString>) -> Self {
        self.inherited_path = path;
        self
    }

    pub fn run(&mut self, jobs: &[BuildJob]) -> Vec<JobReport> {
        let total = jobs.len();
        let mut reports = Vec::with_capacity(total);

        for job in jobs {
            info!("[{}/{}] {}", job.sequence_index, total, job);
            let started = Instant::now();

            let outcome = self.run_job(job);
            match &outcome {
                Outcome::Passed => info!("[ok] {}", job.install_name()),
                Outcome::Failed(why) => warn!("[fail] {}: {}", job.install_name(), why),
                Outcome::Skipped(why) => warn!("[skip] {}: {}", job.install_name(), why),
            }

            if let Err(e) = clear_dir(&self.settings.scratch_dir()) {
                warn!("Could not clear scratch directory after {}: {}", job.install_name(), e);
            }

            reports.push(JobReport {
                install_name: job.install_name(),
                job: job.clone(),
                outcome,
                seconds: started.elapsed().as_secs(),
            });
        }

        reports
    }

    fn run_job(&mut self, job: &BuildJob) -> Outcome {
        match self.prepare(job) {
            Ok(invocation) => {
                debug!("Command: {}", invocation.command_line());
                match self.runner.build(&invocation) {
                    Ok(()) => Outcome::Passed,
                    // The driver never started.
                    Err(e @ StepError::Prepare { .. }) => Outcome::Skipped(e.to_string()),
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            }
            Err(e) => Outcome::Skipped(e.to_string()),
        }
    }

    /// Clear scratch, create the job's directories and check out its sources.
    fn prepare(&mut self, job: &BuildJob) -> Result<DriverInvocation, StepError> {
        let settings = self.settings;
        let root = &settings.root;

        let scratch = settings.scratch_dir();
        clear_dir(&scratch).map_err(|source| StepError::Prepare {
            path: scratch.clone(),
            source,
        })?;

        for dir in [job.install_dir(root), job.log_dir(root)] {
            fs::create_dir_all(&dir).map_err(|source| StepError::Prepare { path: dir, source })?;
        }

        for src in job.sources() {
            debug!("Checking out {} in {}", src.revision, src.tree);
            self.runner.checkout(&root.join(src.tree), &src.revision)?;
        }

        DriverInvocation::for_job(settings, job, self.inherited_path.as_deref()).map_err(
            |e| StepError::Prepare {
                path: job.install_dir(root).join("bin"),
                source: io::Error::new(io::ErrorKind::InvalidInput, e),
            },
        )
    }
}

/// Remove everything under `dir`, leaving it as an existing empty directory.
pub fn clear_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}
