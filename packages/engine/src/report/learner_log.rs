use std::path::Path;

use affectmode_algo::{AffectObservation, EmotionLabel, Mode, QuestionInput};
use chrono::DateTime;
use serde::Deserialize;
use tracing::warn;

use super::{line_of, open_reader, present, require_columns, undecodable, RowRejection};
use crate::error::ReportError;

const REQUIRED_COLUMNS: [&str; 5] = [
    "learner_id",
    "question_id",
    "mode",
    "correct",
    "response_latency_ms",
];

const DEFAULT_EMOTION_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Deserialize)]
struct RawLogRow {
    learner_id: Option<String>,
    question_id: Option<String>,
    mode: Option<String>,
    correct: Option<String>,
    response_latency_ms: Option<String>,
    skipped: Option<String>,
    emotion: Option<String>,
    emotion_confidence: Option<String>,
    timestamp: Option<String>,
}

/// One answered question from a recorded learner log
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerLogEntry {
    pub line: u64,
    pub input: QuestionInput,
    pub timestamp_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnerLog {
    pub entries: Vec<LearnerLogEntry>,
    pub rejected: Vec<RowRejection>,
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(format!("{field} {raw:?} is not a boolean")),
    }
}

/// Epoch milliseconds or an RFC 3339 timestamp
fn parse_timestamp(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.timestamp_millis())
    })
}

fn convert(raw: RawLogRow, line: u64) -> Result<LearnerLogEntry, String> {
    let learner_id = present(raw.learner_id).ok_or("missing learner_id")?;
    let question_id = present(raw.question_id).ok_or("missing question_id")?;
    let mode = present(raw.mode).ok_or("missing mode")?;
    let correct = present(raw.correct).ok_or("missing correct")?;
    let latency = present(raw.response_latency_ms).ok_or("missing response_latency_ms")?;

    let mode = Mode::parse(&mode).map_err(|e| e.to_string())?;
    let correct = parse_bool("correct", &correct)?;
    let skipped = match present(raw.skipped) {
        Some(value) => parse_bool("skipped", &value)?,
        None => false,
    };
    let response_latency_ms = latency
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
        .ok_or_else(|| format!("response_latency_ms {latency:?} is not a number"))?;

    let timestamp_ms = present(raw.timestamp).and_then(|v| parse_timestamp(&v));

    let affect_window = match present(raw.emotion) {
        Some(label) => {
            let confidence = match present(raw.emotion_confidence) {
                Some(value) => value
                    .parse::<f64>()
                    .map_err(|_| format!("emotion_confidence {value:?} is not a number"))?,
                None => DEFAULT_EMOTION_CONFIDENCE,
            };
            vec![AffectObservation::new(
                timestamp_ms.unwrap_or(0),
                EmotionLabel::parse(&label),
                confidence,
            )]
        }
        None => Vec::new(),
    };

    Ok(LearnerLogEntry {
        line,
        input: QuestionInput {
            question_id,
            learner_id,
            mode,
            correct,
            skipped,
            response_latency_ms,
            affect_window,
        },
        timestamp_ms,
    })
}

/// Read a recorded learner log for batch replay.
pub fn read_learner_log(path: &Path) -> Result<LearnerLog, ReportError> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers().map_err(|e| ReportError::csv(path, e))?.clone();
    require_columns(path, &headers, &REQUIRED_COLUMNS)?;

    let mut log = LearnerLog::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log.rejected.push(undecodable(path, err)?);
                continue;
            }
        };
        let line = line_of(&record);
        let raw: RawLogRow = match record.deserialize(Some(&headers)) {
            Ok(raw) => raw,
            Err(err) => {
                log.rejected.push(RowRejection {
                    path: path.to_path_buf(),
                    line,
                    learner_id: None,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let learner_id = present(raw.learner_id.clone());
        match convert(raw, line) {
            Ok(entry) => log.entries.push(entry),
            Err(reason) => log.rejected.push(RowRejection {
                path: path.to_path_buf(),
                line,
                learner_id,
                reason,
            }),
        }
    }

    if !log.rejected.is_empty() {
        warn!(
            path = %path.display(),
            rejected = log.rejected.len(),
            "Skipped malformed learner log rows"
        );
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_file(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner_log.csv");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn test_reads_optional_columns() {
        let (_dir, path) = log_file(
            "learner_id,question_id,mode,correct,response_latency_ms,skipped,emotion,emotion_confidence,timestamp\n\
             L1,q1,visual,yes,4200,,sad,0.8,1700000000000\n\
             L1,q2,hands-on,0,25000,1,,,2024-01-01T00:00:00Z\n",
        );
        let log = read_learner_log(&path).unwrap();
        assert!(log.rejected.is_empty());
        assert_eq!(log.entries.len(), 2);

        let first = &log.entries[0];
        assert!(first.input.correct);
        assert_eq!(first.input.affect_window.len(), 1);
        assert_eq!(first.input.affect_window[0].label, EmotionLabel::Sad);
        assert_eq!(first.input.affect_window[0].confidence, 0.8);
        assert_eq!(first.timestamp_ms, Some(1_700_000_000_000));

        let second = &log.entries[1];
        assert_eq!(second.input.mode, Mode::Kinesthetic);
        assert!(second.input.skipped);
        assert!(second.input.affect_window.is_empty());
        assert_eq!(second.timestamp_ms, Some(1_704_067_200_000));
    }

    #[test]
    fn test_emotion_without_confidence_defaults_to_full() {
        let (_dir, path) = log_file(
            "learner_id,question_id,mode,correct,response_latency_ms,emotion\nL1,q1,auditory,false,3000,angry\n",
        );
        let log = read_learner_log(&path).unwrap();
        assert_eq!(log.entries[0].input.affect_window[0].confidence, 1.0);
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        let (_dir, path) = log_file(
            "learner_id,question_id,mode,correct,response_latency_ms\n\
             L1,q1,visual,maybe,3000\n\
             L1,q2,smell,true,3000\n\
             L1,q3,visual,true,\n\
             L1,q4,visual,true,3500\n",
        );
        let log = read_learner_log(&path).unwrap();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.rejected.len(), 3);
        assert_eq!(log.entries[0].input.question_id, "q4");
    }

    #[test]
    fn test_undecodable_row_does_not_fail_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner_log.csv");
        let mut body = b"learner_id,question_id,mode,correct,response_latency_ms\n".to_vec();
        body.extend_from_slice(b"L1,q1,visual,true,3000\n");
        body.extend_from_slice(b"L1,q\xff2,visual,true,3000\n");
        body.extend_from_slice(b"L1,q3,visual,false,9000\n");
        std::fs::write(&path, body).unwrap();

        let log = read_learner_log(&path).unwrap();
        let ids: Vec<_> = log.entries.iter().map(|e| e.input.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3"]);
        assert_eq!(log.rejected.len(), 1);
        assert_eq!(log.rejected[0].line, 3);
    }
}
