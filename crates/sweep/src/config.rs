//! Sweep settings and the version matrix.
//!
//! Settings come from the environment (the CLI only selects which sweeps to
//! run). The version matrix has built-in defaults and can be overridden by a
//! TOML file:
//!
//! ```toml
//! targets = ["riscv32-unknown-elf"]
//! gcc_versions = ["10.2.0"]
//! clang_versions = ["11.0.0"]
//! arm_clang_versions = ["11.0.0"]
//!
//! [binutils]
//! base = "2.34"
//! latest = "2.36"
//!
//! [newlib]
//! base = "3.3.0"
//! latest = "4.1.0"
//! ```

use crate::matrix::{Target, VersionPair};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ROOT_VAR: &str = "TOOLCHAIN_SWEEP_ROOT";
pub const DRIVER_VAR: &str = "TOOLCHAIN_SWEEP_DRIVER";
pub const JOBS_VAR: &str = "TOOLCHAIN_SWEEP_JOBS";
pub const MATRIX_VAR: &str = "TOOLCHAIN_SWEEP_MATRIX";

/// Matrix file picked up from the sweep root when no override is given.
pub const DEFAULT_MATRIX_FILE: &str = "sweep.toml";

/// Driver location relative to the sweep root.
pub const DEFAULT_DRIVER: &str = "tooling/build_toolchain.py";

/// Resolved process-wide settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `gnu/`, `llvm/`, `build/`, `install/` and `logs/`.
    pub root: PathBuf,
    pub driver: PathBuf,
    /// Parallelism handed to the driver.
    pub jobs: usize,
    pub matrix_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let cwd = env::current_dir().context("Reading current directory")?;
        Self::resolve(&cwd, |key| env::var(key).ok())
    }

    /// Resolve settings from a variable lookup. Relative paths are taken
    /// relative to `cwd`.
    pub fn resolve<F>(cwd: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = match lookup(ROOT_VAR).filter(|v| !v.is_empty()) {
            Some(v) => cwd.join(v),
            None => cwd.to_path_buf(),
        };

        let driver = match lookup(DRIVER_VAR).filter(|v| !v.is_empty()) {
            Some(v) => cwd.join(v),
            None => root.join(DEFAULT_DRIVER),
        };

        let jobs = match lookup(JOBS_VAR).filter(|v| !v.is_empty()) {
            Some(v) => {
                let n: usize = v
                    .trim()
                    .parse()
                    .with_context(|| format!("Parsing {JOBS_VAR}='{v}'"))?;
                if n == 0 {
                    bail!("{JOBS_VAR} must be at least 1");
                }
                n
            }
            None => host_cpus(),
        };

        let matrix_file = match lookup(MATRIX_VAR).filter(|v| !v.is_empty()) {
            Some(v) => Some(cwd.join(v)),
            None => Some(root.join(DEFAULT_MATRIX_FILE)).filter(|p| p.is_file()),
        };

        Ok(Self {
            root,
            driver,
            jobs,
            matrix_file,
        })
    }

    /// Shared scratch directory every job builds in.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    pub fn log_root(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn load_matrix(&self) -> Result<MatrixConfig> {
        match &self.matrix_file {
            Some(path) => MatrixConfig::load(path),
            None => Ok(MatrixConfig::default()),
        }
    }
}

fn host_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// The version lists the sweep iterates over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatrixConfig {
    pub targets: Vec<Target>,
    pub gcc_versions: Vec<String>,
    /// Clang versions for every target except Arm.
    pub clang_versions: Vec<String>,
    /// Clang versions for Arm, which need a patched newlib.
    pub arm_clang_versions: Vec<String>,
    pub binutils: VersionPair,
    pub newlib: VersionPair,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            targets: Target::ALL.to_vec(),
            gcc_versions: strings(&["9.3.0", "10.2.0", "11.1.0"]),
            clang_versions: strings(&["9.0.1", "10.0.1", "11.0.0"]),
            arm_clang_versions: strings(&["10.0.1", "11.0.0"]),
            binutils: VersionPair::new("2.34", "2.36"),
            newlib: VersionPair::new("3.3.0", "4.1.0"),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl MatrixConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Loading matrix {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let matrix: Self = toml::from_str(text).context("Parsing matrix TOML")?;
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn clang_versions_for(&self, target: Target) -> &[String] {
        match target {
            Target::ArmNoneEabi => &self.arm_clang_versions,
            Target::Riscv32UnknownElf => &self.clang_versions,
        }
    }

    /// Reject matrices that would produce two jobs with the same install
    /// directory, or versions that cannot be used in a directory name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for t in &self.targets {
            if !seen.insert(t) {
                bail!("target {t} listed more than once");
            }
        }

        for (name, list) in [
            ("gcc_versions", &self.gcc_versions),
            ("clang_versions", &self.clang_versions),
            ("arm_clang_versions", &self.arm_clang_versions),
        ] {
            let mut seen = HashSet::new();
            for v in list {
                check_version(name, v)?;
                if !seen.insert(v) {
                    bail!("{name}: version '{v}' listed more than once");
                }
            }
        }

        for (name, pair) in [("binutils", &self.binutils), ("newlib", &self.newlib)] {
            check_version(name, &pair.base)?;
            check_version(name, &pair.latest)?;
        }

        if self.binutils.base == self.binutils.latest && self.newlib.base == self.newlib.latest {
            bail!(
                "base and latest pairs are identical (binutils {}, newlib {}); every job would be built twice",
                self.binutils.base,
                self.newlib.base
            );
        }

        Ok(())
    }
}

fn check_version(field: &str, v: &str) -> Result<()> {
    if v.is_empty() {
        bail!("{field}: empty version");
    }
    if v.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
        bail!("{field}: version '{v}' contains whitespace or a path separator");
    }
    Ok(())
}
