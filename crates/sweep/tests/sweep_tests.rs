//! Sweep behaviour against a recording runner and a real stub driver.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use toolchain_sweep::app;
use toolchain_sweep::config::{MatrixConfig, Settings};
use toolchain_sweep::driver::{BuildMode, DriverInvocation, SystemRunner};
use toolchain_sweep::matrix::{enumerate, Selection, Target};
use toolchain_sweep::sweep::{Outcome, Runner, StepError, Sweep};

// ============================================================================
// Helpers
// ============================================================================

fn settings(root: &Path) -> Settings {
    Settings {
        root: root.to_path_buf(),
        driver: root.join("tooling/build_toolchain.py"),
        jobs: 4,
        matrix_file: None,
    }
}

fn small_matrix() -> MatrixConfig {
    MatrixConfig {
        gcc_versions: vec!["9.3.0".into(), "10.2.0".into()],
        clang_versions: vec!["11.0.0".into()],
        arm_clang_versions: vec!["11.0.0".into()],
        ..MatrixConfig::default()
    }
}

const ALL: Selection = Selection {
    gcc: true,
    clang: true,
};

#[derive(Default)]
struct Recorder {
    scratch: PathBuf,
    checkouts: Vec<(PathBuf, String)>,
    builds: Vec<DriverInvocation>,
    /// Scratch entry count seen by the first checkout of each job.
    scratch_entries_at_start: Vec<usize>,
    fail_build_at: Option<usize>,
    fail_checkout_of: Option<String>,
}

impl Recorder {
    fn new(root: &Path) -> Self {
        Self {
            scratch: root.join("build"),
            ..Self::default()
        }
    }
}

impl Runner for Recorder {
    fn checkout(&mut self, tree: &Path, revision: &str) -> Result<(), StepError> {
        if self.checkouts.len() % 3 == 0 {
            self.scratch_entries_at_start
                .push(fs::read_dir(&self.scratch).unwrap().count());
        }
        self.checkouts.push((tree.to_path_buf(), revision.to_string()));

        if self.fail_checkout_of.as_deref() == Some(revision) {
            return Err(StepError::Checkout {
                tree: tree.to_path_buf(),
                revision: revision.to_string(),
                detail: "pathspec did not match".into(),
            });
        }
        Ok(())
    }

    fn build(&mut self, invocation: &DriverInvocation) -> Result<(), StepError> {
        // Leave artifacts behind like a real build would.
        fs::create_dir_all(invocation.build_dir.join("gnu/gcc-stage-1")).unwrap();
        fs::write(invocation.build_dir.join("gnu/config.log"), "configured").unwrap();

        self.builds.push(invocation.clone());
        if self.fail_build_at == Some(self.builds.len()) {
            return Err(StepError::Exit {
                status: "exit status: 1".into(),
                log: invocation.output_log(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Sweep
// ============================================================================

#[test]
fn test_every_job_invokes_driver_once_in_order() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let jobs = enumerate(&small_matrix(), ALL);
    let mut recorder = Recorder::new(dir.path());

    let reports = Sweep::new(&settings, &mut recorder).run(&jobs);

    assert_eq!(reports.len(), jobs.len());
    assert_eq!(recorder.builds.len(), jobs.len());
    assert!(reports.iter().all(|r| r.outcome == Outcome::Passed));

    for (job, inv) in jobs.iter().zip(&recorder.builds) {
        assert_eq!(inv.install_dir, job.install_dir(dir.path()));
        assert_eq!(inv.log_dir, job.log_dir(dir.path()));
        assert_eq!(inv.build_dir, dir.path().join("build"));
        assert_eq!(inv.mode, BuildMode::from(job.kind));
        assert_eq!(inv.target, job.target);
        assert_eq!(inv.num_cpus, 4);
    }
}

#[test]
fn test_scratch_is_empty_before_each_job() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let jobs = enumerate(&small_matrix(), ALL);

    // Stale output from an earlier, interrupted sweep.
    fs::create_dir_all(dir.path().join("build/llvm")).unwrap();
    fs::write(dir.path().join("build/llvm/CMakeCache.txt"), "stale").unwrap();

    let mut recorder = Recorder::new(dir.path());
    Sweep::new(&settings, &mut recorder).run(&jobs);

    assert_eq!(recorder.scratch_entries_at_start.len(), jobs.len());
    assert!(recorder.scratch_entries_at_start.iter().all(|&n| n == 0));
    // Cleared after the last job too.
    assert_eq!(fs::read_dir(dir.path().join("build")).unwrap().count(), 0);
}

#[test]
fn test_driver_failure_does_not_stop_sweep() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let jobs = enumerate(&small_matrix(), ALL);
    let mut recorder = Recorder::new(dir.path());
    recorder.fail_build_at = Some(2);

    let reports = Sweep::new(&settings, &mut recorder).run(&jobs);

    assert_eq!(recorder.builds.len(), jobs.len());
    assert_eq!(reports.len(), jobs.len());
    assert!(matches!(reports[1].outcome, Outcome::Failed(_)));
    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
        .count();
    assert_eq!(failed, 1);
}

#[test]
fn test_checkout_failure_skips_only_that_job() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let matrix = small_matrix();
    let jobs = enumerate(
        &matrix,
        Selection {
            gcc: true,
            clang: false,
        },
    );
    let mut recorder = Recorder::new(dir.path());
    recorder.fail_checkout_of = Some("releases/gcc-9.3.0".into());

    let reports = Sweep::new(&settings, &mut recorder).run(&jobs);

    let skipped: Vec<_> = reports
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
        .map(|r| r.job.toolchain_version.as_str())
        .collect();
    // Two pairs for each of the two targets.
    assert_eq!(skipped, vec!["9.3.0"; 4]);
    assert_eq!(recorder.builds.len(), jobs.len() - 4);
    assert!(recorder
        .builds
        .iter()
        .all(|inv| !inv.install_dir.to_string_lossy().contains("gcc-9.3.0")));

    let Outcome::Skipped(why) = &reports[0].outcome else {
        panic!("first job should be skipped");
    };
    assert!(why.contains("releases/gcc-9.3.0"));
}

#[test]
fn test_checkouts_follow_job_sources() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let jobs = enumerate(
        &small_matrix(),
        Selection {
            gcc: false,
            clang: true,
        },
    );
    let mut recorder = Recorder::new(dir.path());

    Sweep::new(&settings, &mut recorder).run(&jobs);

    assert_eq!(recorder.checkouts.len(), jobs.len() * 3);
    let arm_base = jobs
        .iter()
        .position(|j| j.target == Target::ArmNoneEabi)
        .unwrap();
    let got = &recorder.checkouts[arm_base * 3..arm_base * 3 + 3];
    assert_eq!(got[0], (dir.path().join("llvm/llvm-project"), "llvmorg-11.0.0".into()));
    assert_eq!(got[1], (dir.path().join("gnu/binutils-gdb"), "binutils-2_34".into()));
    assert_eq!(got[2], (dir.path().join("gnu/newlib"), "newlib-3.3.0-devel".into()));
}

#[test]
fn test_job_directories_created() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let jobs = enumerate(&small_matrix(), ALL);
    let mut recorder = Recorder::new(dir.path());

    Sweep::new(&settings, &mut recorder).run(&jobs);

    for job in &jobs {
        assert!(job.install_dir(dir.path()).is_dir());
        assert!(job.log_dir(dir.path()).is_dir());
    }
}

// ============================================================================
// Application entry
// ============================================================================

#[test]
fn test_listing_only_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut recorder = Recorder::new(dir.path());
    let mut out = Vec::new();

    let summary = app::execute(
        &settings,
        &small_matrix(),
        Selection::default(),
        &mut recorder,
        &mut out,
    )
    .unwrap();

    assert!(summary.is_none());
    assert!(recorder.builds.is_empty());
    assert!(recorder.checkouts.is_empty());
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("=== Build matrix ==="));
    assert!(text.contains("riscv32-unknown-elf"));
    assert!(!dir.path().join("logs/summary.json").exists());
}

#[test]
fn test_sweep_prints_and_saves_summary() {
    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    let mut recorder = Recorder::new(dir.path());
    recorder.fail_build_at = Some(1);
    let mut out = Vec::new();

    let summary = app::execute(
        &settings,
        &small_matrix(),
        Selection {
            gcc: true,
            clang: false,
        },
        &mut recorder,
        &mut out,
    )
    .unwrap()
    .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.passed, recorder.builds.len() - 1);

    let text = String::from_utf8(out).unwrap();
    let matrix_at = text.find("=== Build matrix ===").unwrap();
    let summary_at = text.find("=== Sweep summary ===").unwrap();
    assert!(matrix_at < summary_at);
    assert!(text.contains("[failed] #1 gcc-9.3.0-binutils-2.34-lib-3.3.0-arm-none-eabi"));

    let json = fs::read_to_string(dir.path().join("logs/summary.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["failed"], 1);
}

// ============================================================================
// Real driver process
// ============================================================================

/// Builds with the real process runner but skips git.
#[cfg(unix)]
struct NoCheckout(SystemRunner);

#[cfg(unix)]
impl Runner for NoCheckout {
    fn checkout(&mut self, _tree: &Path, _revision: &str) -> Result<(), StepError> {
        Ok(())
    }

    fn build(&mut self, invocation: &DriverInvocation) -> Result<(), StepError> {
        self.0.build(invocation)
    }
}

#[cfg(unix)]
#[test]
fn test_stub_driver_failure_on_second_job() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let settings = settings(dir.path());
    fs::create_dir_all(dir.path().join("tooling")).unwrap();

    // Count invocations in a file; fail the second one. The scratch
    // directory must be empty on entry.
    let script = r#"#!/bin/sh
builddir=""
for a in "$@"; do
  case "$a" in
    --builddir=*) builddir="${a#--builddir=}" ;;
  esac
done
if [ -n "$(ls -A "$builddir")" ]; then
  echo "scratch not empty" >&2
  exit 9
fi
touch "$builddir/leftover"
echo x >> calls
n=$(wc -l < calls)
echo "job $n: $*"
[ "$n" -ne 2 ]
"#;
    fs::write(&settings.driver, script).unwrap();
    fs::set_permissions(&settings.driver, fs::Permissions::from_mode(0o755)).unwrap();

    let jobs = enumerate(
        &small_matrix(),
        Selection {
            gcc: true,
            clang: false,
        },
    );
    let reports = Sweep::new(&settings, NoCheckout(SystemRunner))
        .with_inherited_path(std::env::var_os("PATH"))
        .run(&jobs);

    let calls = fs::read_to_string(dir.path().join("calls")).unwrap();
    assert_eq!(calls.lines().count(), jobs.len());

    let labels: Vec<&str> = reports.iter().map(|r| r.outcome.label()).collect();
    let mut expected = vec!["passed"; jobs.len()];
    expected[1] = "failed";
    assert_eq!(labels, expected);

    let log = fs::read_to_string(jobs[0].log_dir(dir.path()).join("driver.log")).unwrap();
    assert!(log.contains("job 1: --builddir="));
    assert!(log.contains("--build-gnu --num-cpus=4 arm-none-eabi"));
}
