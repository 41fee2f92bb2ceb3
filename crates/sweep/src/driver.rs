//! External build driver and source checkouts.
//!
//! [`DriverInvocation`] is the only place that knows the driver's argument
//! syntax. [`SystemRunner`] runs `git` and the driver as real processes.

use crate::config::Settings;
use crate::matrix::{BuildJob, Target, ToolchainKind};
use crate::sweep::{Runner, StepError};
use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// File inside a job's log directory that receives the driver's output.
pub const DRIVER_LOG: &str = "driver.log";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    /// GCC, binutils and newlib.
    Gnu,
    /// Clang/LLVM, binutils and newlib.
    Llvm,
}

impl BuildMode {
    pub fn flag(self) -> &'static str {
        match self {
            Self::Gnu => "--build-gnu",
            Self::Llvm => "--build-llvm",
        }
    }
}

impl From<ToolchainKind> for BuildMode {
    fn from(kind: ToolchainKind) -> Self {
        match kind {
            ToolchainKind::Gcc => Self::Gnu,
            ToolchainKind::Clang => Self::Llvm,
        }
    }
}

/// Everything needed to run the driver once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverInvocation {
    pub program: PathBuf,
    pub working_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub log_dir: PathBuf,
    pub mode: BuildMode,
    pub num_cpus: usize,
    pub target: Target,
    /// Variables set on the driver process on top of the inherited
    /// environment.
    pub env: BTreeMap<String, OsString>,
}

impl DriverInvocation {
    /// Build the invocation for `job`, prefixing `inherited_path` with the
    /// job's install `bin/` so later stages find the freshly installed tools.
    pub fn for_job(
        settings: &Settings,
        job: &BuildJob,
        inherited_path: Option<&OsStr>,
    ) -> Result<Self, env::JoinPathsError> {
        let install_dir = job.install_dir(&settings.root);

        let mut paths = vec![install_dir.join("bin")];
        if let Some(existing) = inherited_path {
            paths.extend(env::split_paths(existing));
        }
        let mut job_env = BTreeMap::new();
        job_env.insert("PATH".to_string(), env::join_paths(paths)?);

        Ok(Self {
            program: settings.driver.clone(),
            working_dir: settings.root.clone(),
            build_dir: settings.scratch_dir(),
            log_dir: job.log_dir(&settings.root),
            install_dir,
            mode: job.kind.into(),
            num_cpus: settings.jobs,
            target: job.target,
            env: job_env,
        })
    }

    pub fn args(&self) -> Vec<OsString> {
        vec![
            path_arg("--builddir=", &self.build_dir),
            path_arg("--installdir=", &self.install_dir),
            path_arg("--logdir=", &self.log_dir),
            OsString::from(self.mode.flag()),
            OsString::from(format!("--num-cpus={}", self.num_cpus)),
            OsString::from(self.target.triple()),
        ]
    }

    pub fn output_log(&self) -> PathBuf {
        self.log_dir.join(DRIVER_LOG)
    }

    /// Space-separated command line, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str().to_os_string())
            .chain(self.args())
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn path_arg(flag: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(path);
    arg
}

/// Runs checkouts and the driver as child processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn checkout(&mut self, tree: &Path, revision: &str) -> Result<(), StepError> {
        let checkout_error = |detail: String| StepError::Checkout {
            tree: tree.to_path_buf(),
            revision: revision.to_string(),
            detail,
        };

        let out = Command::new("git")
            .args(["checkout", "--quiet", revision])
            .current_dir(tree)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| checkout_error(e.to_string()))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(checkout_error(format!(
                "git exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn build(&mut self, invocation: &DriverInvocation) -> Result<(), StepError> {
        let log_path = invocation.output_log();
        let prepare_error = |source| StepError::Prepare {
            path: log_path.clone(),
            source,
        };

        fs::create_dir_all(&invocation.log_dir).map_err(prepare_error)?;
        let stdout = File::create(&log_path).map_err(prepare_error)?;
        let stderr = stdout.try_clone().map_err(prepare_error)?;

        let status = Command::new(&invocation.program)
            .args(invocation.args())
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|source| StepError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(StepError::Exit {
                status: status.to_string(),
                log: log_path,
            });
        }
        Ok(())
    }
}
