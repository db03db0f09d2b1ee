use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use affectmode_algo::{FrustrationReportRow, Mode, QuestionEvent};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{line_of, open_reader, present, require_columns, undecodable, RowRejection};
use crate::error::ReportError;

pub const REPORT_COLUMNS: [&str; 5] = [
    "learner_id",
    "mode",
    "frustration_score",
    "question_id",
    "timestamp",
];

const REPORT_FILE_PREFIX: &str = "frustration_report";

#[derive(Debug, Deserialize)]
struct RawReportRow {
    learner_id: Option<String>,
    mode: Option<String>,
    frustration_score: Option<String>,
    question_id: Option<String>,
    timestamp: Option<String>,
}

/// Rows read from one or more report files, taken once and never refreshed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSnapshot {
    pub rows: Vec<FrustrationReportRow>,
    pub rejected: Vec<RowRejection>,
}

impl ReportSnapshot {
    fn extend(&mut self, other: ReportSnapshot) {
        self.rows.extend(other.rows);
        self.rejected.extend(other.rejected);
    }
}

/// RFC 3339 with millisecond precision; out-of-range values fall back to the raw number.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn row_from_event(event: &QuestionEvent) -> FrustrationReportRow {
    FrustrationReportRow {
        learner_id: event.learner_id.clone(),
        mode: event.mode,
        frustration_score: event.frustration_score,
        question_id: event.question_id.clone(),
        timestamp: format_timestamp(event.timestamp_ms),
    }
}

fn convert(raw: RawReportRow) -> Result<FrustrationReportRow, String> {
    let learner_id = present(raw.learner_id).ok_or("missing learner_id")?;
    let mode = present(raw.mode).ok_or("missing mode")?;
    let score = present(raw.frustration_score).ok_or("missing frustration_score")?;
    let question_id = present(raw.question_id).ok_or("missing question_id")?;
    let timestamp = present(raw.timestamp).ok_or("missing timestamp")?;

    let mode = Mode::parse(&mode).map_err(|e| e.to_string())?;
    let frustration_score = score
        .parse::<f64>()
        .map_err(|_| format!("frustration_score {score:?} is not a number"))?;

    Ok(FrustrationReportRow {
        learner_id,
        mode,
        frustration_score,
        question_id,
        timestamp,
    })
}

pub fn read_report_rows(path: &Path) -> Result<ReportSnapshot, ReportError> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(|e| ReportError::csv(path, e))?.clone();
    require_columns(path, &headers, &REPORT_COLUMNS)?;

    let mut snapshot = ReportSnapshot::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                snapshot.rejected.push(undecodable(path, err)?);
                continue;
            }
        };
        let line = line_of(&record);
        let raw: RawReportRow = match record.deserialize(Some(&headers)) {
            Ok(raw) => raw,
            Err(err) => {
                snapshot.rejected.push(RowRejection {
                    path: path.to_path_buf(),
                    line,
                    learner_id: None,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let learner_id = raw.learner_id.clone();
        match convert(raw) {
            Ok(row) => snapshot.rows.push(row),
            Err(reason) => snapshot.rejected.push(RowRejection {
                path: path.to_path_buf(),
                line,
                learner_id: present(learner_id),
                reason,
            }),
        }
    }

    if !snapshot.rejected.is_empty() {
        warn!(
            path = %path.display(),
            rejected = snapshot.rejected.len(),
            "Skipped malformed report rows"
        );
    }
    debug!(path = %path.display(), rows = snapshot.rows.len(), "Report file read");
    Ok(snapshot)
}

/// Merge several report files in the given order.
pub fn read_report_files(paths: &[PathBuf]) -> Result<ReportSnapshot, ReportError> {
    let mut merged = ReportSnapshot::default();
    for path in paths {
        merged.extend(read_report_rows(path)?);
    }
    Ok(merged)
}

/// Every `frustration_report*.csv` directly inside `dir`, sorted by name.
pub fn discover_report_files(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ReportError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReportError::io(dir, e))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(REPORT_FILE_PREFIX) && n.ends_with(".csv"))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn write_row<W: Write>(
    writer: &mut csv::Writer<W>,
    row: &FrustrationReportRow,
) -> csv::Result<()> {
    writer.write_record([
        row.learner_id.as_str(),
        row.mode.as_str(),
        &row.frustration_score.to_string(),
        row.question_id.as_str(),
        row.timestamp.as_str(),
    ])
}

/// Rows handled by [`append_report_rows`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppendSummary {
    pub appended: usize,
    /// `(learner_id, question_id)` pairs already in the file
    pub skipped_existing: usize,
}

/// Append `rows` to the report at `path`, keeping every row already there.
///
/// A row whose `(learner_id, question_id)` is already present in the file,
/// or earlier in `rows`, is skipped. The header is written when the file is
/// new or empty.
pub fn append_report_rows(
    path: &Path,
    rows: &[FrustrationReportRow],
) -> Result<AppendSummary, ReportError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ReportError::io(path, e))?;
    let needs_header = file.metadata().map_err(|e| ReportError::io(path, e))?.len() == 0;

    let mut written: HashSet<(String, String)> = HashSet::new();
    if !needs_header {
        for row in read_report_rows(path)?.rows {
            written.insert((row.learner_id, row.question_id));
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if needs_header {
        writer
            .write_record(REPORT_COLUMNS)
            .map_err(|e| ReportError::csv(path, e))?;
    }

    let mut summary = AppendSummary::default();
    for row in rows {
        if !written.insert((row.learner_id.clone(), row.question_id.clone())) {
            summary.skipped_existing += 1;
            continue;
        }
        write_row(&mut writer, row).map_err(|e| ReportError::csv(path, e))?;
        summary.appended += 1;
    }
    writer.flush().map_err(|e| ReportError::io(path, e))?;

    if summary.skipped_existing > 0 {
        debug!(
            path = %path.display(),
            skipped = summary.skipped_existing,
            "Rows already present in report"
        );
    }
    Ok(summary)
}
