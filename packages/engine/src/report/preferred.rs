use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use affectmode_algo::{AggregateStatus, Mode, PreferredModeRecord};
use serde::Deserialize;
use tracing::{info, warn};

use super::{line_of, open_reader, present, require_columns, undecodable};
use crate::error::ReportError;

pub const PREFERRED_COLUMNS: [&str; 9] = [
    "learner_id",
    "preferred_mode",
    "mean_frustration_visual",
    "mean_frustration_auditory",
    "mean_frustration_kinesthetic",
    "samples_visual",
    "samples_auditory",
    "samples_kinesthetic",
    "status",
];

/// Older files only carry these two
const REQUIRED_COLUMNS: [&str; 2] = ["learner_id", "preferred_mode"];

#[derive(Debug, Deserialize)]
struct RawPreferredRow {
    learner_id: Option<String>,
    preferred_mode: Option<String>,
    mean_frustration_visual: Option<String>,
    mean_frustration_auditory: Option<String>,
    mean_frustration_kinesthetic: Option<String>,
    samples_visual: Option<String>,
    samples_auditory: Option<String>,
    samples_kinesthetic: Option<String>,
    status: Option<String>,
}

fn record_row(record: &PreferredModeRecord) -> Vec<String> {
    let mut row = Vec::with_capacity(PREFERRED_COLUMNS.len());
    row.push(record.learner_id.clone());
    row.push(
        record
            .preferred_mode
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    );
    for mode in Mode::ALL {
        row.push(
            record
                .mean(mode)
                .map(|mean| format!("{mean:.6}"))
                .unwrap_or_default(),
        );
    }
    for mode in Mode::ALL {
        row.push(record.samples(mode).to_string());
    }
    row.push(record.status.as_str().to_string());
    row
}

/// Replace `path` with one row per record.
///
/// Written to a sibling temp file first and renamed into place, so a reader
/// never observes a half-written file.
pub fn write_preferred_modes(path: &Path, records: &[PreferredModeRecord]) -> Result<(), ReportError> {
    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer =
            csv::Writer::from_path(&tmp_path).map_err(|e| ReportError::csv(&tmp_path, e))?;
        writer
            .write_record(PREFERRED_COLUMNS)
            .map_err(|e| ReportError::csv(&tmp_path, e))?;
        for record in records {
            writer
                .write_record(record_row(record))
                .map_err(|e| ReportError::csv(&tmp_path, e))?;
        }
        writer.flush().map_err(|e| ReportError::io(&tmp_path, e))?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| ReportError::io(path, e))?;
    info!(path = %path.display(), learners = records.len(), "Preferred modes written");
    Ok(())
}

fn parse_mean(raw: Option<String>) -> Option<f64> {
    present(raw).and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite())
}

fn parse_count(raw: Option<String>) -> Option<usize> {
    present(raw).and_then(|v| v.parse::<usize>().ok())
}

fn convert(raw: RawPreferredRow) -> Result<PreferredModeRecord, String> {
    let learner_id = present(raw.learner_id).ok_or("missing learner_id")?;
    let preferred_mode = match present(raw.preferred_mode) {
        Some(value) if value.eq_ignore_ascii_case("none") => None,
        Some(value) => Some(Mode::parse(&value).map_err(|e| e.to_string())?),
        None => None,
    };

    let means = [
        raw.mean_frustration_visual,
        raw.mean_frustration_auditory,
        raw.mean_frustration_kinesthetic,
    ];
    let counts = [raw.samples_visual, raw.samples_auditory, raw.samples_kinesthetic];

    let mut mean_frustration_per_mode = BTreeMap::new();
    let mut sample_count_per_mode = BTreeMap::new();
    for ((mode, mean), count) in Mode::ALL.into_iter().zip(means).zip(counts) {
        if let Some(mean) = parse_mean(mean) {
            mean_frustration_per_mode.insert(mode, mean);
        }
        if let Some(count) = parse_count(count) {
            sample_count_per_mode.insert(mode, count);
        }
    }

    let status = match present(raw.status).as_deref() {
        Some("ok") => AggregateStatus::Ok,
        Some("insufficient_data") => AggregateStatus::InsufficientData,
        _ if preferred_mode.is_some() => AggregateStatus::Ok,
        _ => AggregateStatus::InsufficientData,
    };

    Ok(PreferredModeRecord {
        learner_id,
        preferred_mode,
        status,
        mean_frustration_per_mode,
        median_frustration_per_mode: BTreeMap::new(),
        sample_count_per_mode,
    })
}

/// Load preferred modes keyed by learner. A missing file is an empty history.
pub fn read_preferred_modes(path: &Path) -> Result<HashMap<String, PreferredModeRecord>, ReportError> {
    if !path.exists() {
        info!(path = %path.display(), "No preferred-mode file, starting without history");
        return Ok(HashMap::new());
    }

    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(|e| ReportError::csv(path, e))?.clone();
    require_columns(path, &headers, &REQUIRED_COLUMNS)?;

    let mut records = HashMap::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let rejected = undecodable(path, err)?;
                warn!(
                    path = %path.display(),
                    line = rejected.line,
                    reason = %rejected.reason,
                    "Skipping preferred-mode row"
                );
                continue;
            }
        };
        let line = line_of(&record);
        let parsed = record
            .deserialize::<RawPreferredRow>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(convert);
        match parsed {
            Ok(preferred) => {
                records.insert(preferred.learner_id.clone(), preferred);
            }
            Err(reason) => {
                warn!(path = %path.display(), line, reason = %reason, "Skipping preferred-mode row");
            }
        }
    }
    Ok(records)
}
