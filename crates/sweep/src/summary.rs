//! End-of-sweep summary: printed for humans, saved as JSON for scripts.

use crate::sweep::{JobReport, Outcome};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Serialize)]
pub struct Summary {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub jobs: Vec<JobReport>,
}

impl Summary {
    pub fn new(jobs: Vec<JobReport>, started: DateTime<Local>, finished: DateTime<Local>) -> Self {
        let count = |label: &str| jobs.iter().filter(|r| r.outcome.label() == label).count();
        Self {
            started,
            finished,
            passed: count("passed"),
            failed: count("failed"),
            skipped: count("skipped"),
            jobs,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "\n=== Sweep summary ===\n\n  {:8} {}\n  {:8} {}\n  {:8} {}\n",
            "passed", self.passed, "failed", self.failed, "skipped", self.skipped
        );

        let problems: String = self
            .jobs
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Passed => None,
                Outcome::Failed(why) | Outcome::Skipped(why) => Some(format!(
                    "  [{}] #{} {}\n      {}\n",
                    r.outcome.label(),
                    r.job.sequence_index,
                    r.install_name,
                    why
                )),
            })
            .collect();
        if !problems.is_empty() {
            out.push('\n');
            out.push_str(&problems);
        }

        let elapsed = self.finished - self.started;
        out.push_str(&format!(
            "\n  Total: {}/{} passed in {}m{:02}s\n",
            self.passed,
            self.jobs.len(),
            elapsed.num_minutes(),
            elapsed.num_seconds() % 60
        ));
        out
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Serializing summary")?;
        fs::write(path, json).with_context(|| format!("Writing {}", path.display()))
    }
}
