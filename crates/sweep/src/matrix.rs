//! Build-job matrix.
//!
//! A sweep is the cross product of target triples, compiler versions and the
//! two companion-version pairs (base and latest). [`enumerate`] expands a
//! [`MatrixConfig`] into the ordered list of [`BuildJob`]s the sweep runs.

use crate::config::MatrixConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Suffix carried by newlib versions patched for Clang on Arm.
pub const DEVEL_SUFFIX: &str = "-devel";

/// Compilation targets the sweep knows how to build for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    #[serde(rename = "arm-none-eabi")]
    ArmNoneEabi,
    #[serde(rename = "riscv32-unknown-elf")]
    Riscv32UnknownElf,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::ArmNoneEabi, Target::Riscv32UnknownElf];

    pub fn triple(self) -> &'static str {
        match self {
            Self::ArmNoneEabi => "arm-none-eabi",
            Self::Riscv32UnknownElf => "riscv32-unknown-elf",
        }
    }

    /// Newlib needs a patched branch before Clang can build it for Arm.
    pub fn needs_devel_newlib(self) -> bool {
        matches!(self, Self::ArmNoneEabi)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.triple())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainKind {
    Gcc,
    Clang,
}

impl ToolchainKind {
    pub fn id(self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
            Self::Clang => "clang",
        }
    }

    /// Source tree holding the compiler, relative to the sweep root.
    pub fn source_tree(self) -> &'static str {
        match self {
            Self::Gcc => "gnu/gcc",
            Self::Clang => "llvm/llvm-project",
        }
    }

    /// Revision to check out for a compiler version.
    pub fn revision(self, version: &str) -> String {
        match self {
            Self::Gcc => format!("releases/gcc-{version}"),
            Self::Clang => format!("llvmorg-{version}"),
        }
    }
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Which companion versions a job uses. Binutils and newlib are paired
/// positionally: base with base, latest with latest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepPair {
    Base,
    Latest,
}

impl DepPair {
    /// Order in which pairs are built for every (target, version).
    pub const ORDER: [DepPair; 2] = [DepPair::Base, DepPair::Latest];
}

impl fmt::Display for DepPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

/// A base/latest version pair for one companion component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionPair {
    pub base: String,
    pub latest: String,
}

impl VersionPair {
    pub fn new(base: &str, latest: &str) -> Self {
        Self {
            base: base.to_string(),
            latest: latest.to_string(),
        }
    }

    pub fn pick(&self, pair: DepPair) -> &str {
        match pair {
            DepPair::Base => &self.base,
            DepPair::Latest => &self.latest,
        }
    }
}

/// A source tree the sweep checks out before each job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRevision {
    /// Tree relative to the sweep root.
    pub tree: &'static str,
    pub revision: String,
}

/// One (target, compiler version, dependency pair) combination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildJob {
    pub sequence_index: usize,
    pub target: Target,
    pub kind: ToolchainKind,
    pub toolchain_version: String,
    pub pair: DepPair,
    pub binutils_version: String,
    pub library_version: String,
}

impl BuildJob {
    /// Directory name shared by the job's install and log trees.
    pub fn install_name(&self) -> String {
        format!(
            "{}-{}-binutils-{}-lib-{}-{}",
            self.kind,
            self.toolchain_version,
            self.binutils_version,
            self.library_version,
            self.target
        )
    }

    pub fn install_dir(&self, root: &Path) -> PathBuf {
        root.join("install").join(self.install_name())
    }

    pub fn log_dir(&self, root: &Path) -> PathBuf {
        root.join("logs").join(self.install_name())
    }

    /// Revisions for the compiler, binutils and library trees, in checkout
    /// order.
    pub fn sources(&self) -> [SourceRevision; 3] {
        [
            SourceRevision {
                tree: self.kind.source_tree(),
                revision: self.kind.revision(&self.toolchain_version),
            },
            SourceRevision {
                tree: "gnu/binutils-gdb",
                revision: format!("binutils-{}", self.binutils_version.replace('.', "_")),
            },
            SourceRevision {
                tree: "gnu/newlib",
                revision: format!("newlib-{}", self.library_version),
            },
        ]
    }
}

impl fmt::Display for BuildJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} ({}: binutils {}, newlib {}) for {}",
            self.sequence_index,
            self.kind,
            self.toolchain_version,
            self.pair,
            self.binutils_version,
            self.library_version,
            self.target
        )
    }
}

/// Which halves of the matrix to sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub gcc: bool,
    pub clang: bool,
}

impl Selection {
    pub fn is_empty(self) -> bool {
        !self.gcc && !self.clang
    }
}

/// Expand the matrix into jobs. GCC jobs come first, then Clang jobs;
/// sequence indices run 1..=N across both.
pub fn enumerate(matrix: &MatrixConfig, selection: Selection) -> Vec<BuildJob> {
    let mut jobs = Vec::new();

    if selection.gcc {
        for &target in &matrix.targets {
            for version in &matrix.gcc_versions {
                push_pairs(&mut jobs, matrix, target, ToolchainKind::Gcc, version);
            }
        }
    }

    if selection.clang {
        for &target in &matrix.targets {
            for version in matrix.clang_versions_for(target) {
                push_pairs(&mut jobs, matrix, target, ToolchainKind::Clang, version);
            }
        }
    }

    jobs
}

fn push_pairs(
    jobs: &mut Vec<BuildJob>,
    matrix: &MatrixConfig,
    target: Target,
    kind: ToolchainKind,
    version: &str,
) {
    for pair in DepPair::ORDER {
        let mut library_version = matrix.newlib.pick(pair).to_string();
        if kind == ToolchainKind::Clang && target.needs_devel_newlib() {
            library_version.push_str(DEVEL_SUFFIX);
        }

        jobs.push(BuildJob {
            sequence_index: jobs.len() + 1,
            target,
            kind,
            toolchain_version: version.to_string(),
            pair,
            binutils_version: matrix.binutils.pick(pair).to_string(),
            library_version,
        });
    }
}
