//! Column extraction from benchmark reports.
//!
//! A report holds tables such as:
//!
//! ```text
//! Size table
//! ----------
//! Benchmark       size
//! ---------       ----
//! aha-mont64      1052
//! crc32            230
//! ...
//! Total          12345
//! ```
//!
//! [`extract`] finds the block that starts at the first line containing the
//! table header and ends before the first later line starting with `Total`,
//! keeps block rows [`FIRST_ROW`]..=[`LAST_ROW`] (1-based, header is row 1)
//! and returns one whitespace-separated field of each row.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// First block row holding data.
pub const FIRST_ROW: usize = 5;
/// Last block row that is extracted.
pub const LAST_ROW: usize = 23;
/// 1-based field holding the measurement.
pub const VALUE_FIELD: usize = 2;

/// Line prefix that ends a table block.
pub const TERMINATOR: &str = "Total";

pub const REPORT_VAR: &str = "EMBENCH_REPORT";
pub const REPORT_DIR_VAR: &str = "EMBENCH_DIR";
pub const REPORT_FILE: &str = "report.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Size,
    Speed,
}

impl Table {
    pub fn header(self) -> &'static str {
        match self {
            Self::Size => "Size table",
            Self::Speed => "Execution time table",
        }
    }
}

/// Lines of the block from the header line up to, not including, the
/// terminator line (or the end of input if there is none). Empty if the
/// header is missing.
pub fn table_block<'a>(report: &'a str, header: &str) -> Vec<&'a str> {
    let mut lines = report.lines().skip_while(|l| !l.contains(header));

    let Some(first) = lines.next() else {
        return Vec::new();
    };

    std::iter::once(first)
        .chain(lines.take_while(|l| !l.starts_with(TERMINATOR)))
        .collect()
}

/// Field `n` (1-based) of `row` after collapsing whitespace runs. Missing
/// fields come back as an empty string.
pub fn field(row: &str, n: usize) -> &str {
    n.checked_sub(1)
        .and_then(|i| row.split_whitespace().nth(i))
        .unwrap_or("")
}

/// Values of `column` for block rows `FIRST_ROW..=LAST_ROW` of `table`.
pub fn extract_column<'a>(report: &'a str, table: Table, column: usize) -> Vec<&'a str> {
    table_block(report, table.header())
        .into_iter()
        .skip(FIRST_ROW - 1)
        .take(LAST_ROW - FIRST_ROW + 1)
        .map(|row| field(row, column))
        .collect()
}

pub fn extract(report: &str, table: Table) -> Vec<&str> {
    extract_column(report, table, VALUE_FIELD)
}

/// `$EMBENCH_REPORT`, else `$EMBENCH_DIR/report.txt`, else `./report.txt`.
pub fn report_path() -> PathBuf {
    resolve_report_path(|k| env::var(k).ok())
}

pub fn resolve_report_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = lookup(REPORT_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(p);
    }
    match lookup(REPORT_DIR_VAR).filter(|v| !v.is_empty()) {
        Some(dir) => Path::new(&dir).join(REPORT_FILE),
        None => PathBuf::from(REPORT_FILE),
    }
}

pub fn read_report(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Reading report {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Shared body of the column binaries. Problems are logged, never fatal:
/// the caller always exits 0.
pub fn print_column(table: Table) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let path = report_path();
    match read_report(&path) {
        Ok(report) => {
            let values = extract(&report, table);
            if values.is_empty() {
                tracing::debug!("No '{}' in {}", table.header(), path.display());
            }
            for v in values {
                println!("{v}");
            }
        }
        Err(e) => tracing::warn!("{e:#}"),
    }
}
