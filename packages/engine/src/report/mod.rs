//! Tabular files: frustration reports, preferred modes and learner logs.
//!
//! Readers are schema tolerant: columns are matched by header name, extra
//! columns are ignored, and a row missing a required value is rejected on
//! its own without failing the file.

mod learner_log;
mod preferred;
mod rows;

use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::Serialize;

use crate::error::ReportError;

pub use learner_log::{read_learner_log, LearnerLog, LearnerLogEntry};
pub use preferred::{read_preferred_modes, write_preferred_modes, PREFERRED_COLUMNS};
pub use rows::{
    append_report_rows, discover_report_files, format_timestamp, read_report_files,
    read_report_rows, row_from_event, AppendSummary, ReportSnapshot, REPORT_COLUMNS,
};
pub(crate) use rows::write_row;

/// A data row that was skipped while reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    pub path: PathBuf,
    /// 1-based line in the source file
    pub line: u64,
    pub learner_id: Option<String>,
    pub reason: String,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, ReportError> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ReportError::csv(path, e))
}

fn require_columns(
    path: &Path,
    headers: &StringRecord,
    required: &[&'static str],
) -> Result<(), ReportError> {
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(ReportError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }
    Ok(())
}

/// A record the reader could not decode is rejected on its own; I/O failures still fail the file.
fn undecodable(path: &Path, err: csv::Error) -> Result<RowRejection, ReportError> {
    if err.is_io_error() {
        return Err(ReportError::csv(path, err));
    }
    Ok(RowRejection {
        path: path.to_path_buf(),
        line: err.position().map(|p| p.line()).unwrap_or(0),
        learner_id: None,
        reason: err.to_string(),
    })
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Trimmed, non-empty field value
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
