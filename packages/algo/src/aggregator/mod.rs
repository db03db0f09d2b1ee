//! Preferred-Mode Aggregator
//!
//! Batch computation of each learner's lowest-frustration presentation mode
//! from historical frustration report rows.
//!
//! Rules:
//! - A row repeating an earlier `(learner_id, question_id, timestamp)` is a
//!   re-appended event and is dropped; the first occurrence wins
//! - Rows are grouped by learner, then by mode
//! - Only modes with at least `min_samples` rows are eligible
//! - Eligible modes within `epsilon` of the best statistic are tied; the tie
//!   goes to the larger sample count, then to visual > auditory > kinesthetic
//! - A learner without any eligible mode gets no preferred mode and is
//!   flagged `InsufficientData`
//!
//! The output is a pure function of the input rows: learners are emitted in
//! learner-id order and per-mode maps are ordered, so identical input always
//! yields identical records.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{AggregatorParams, RankBy};
use crate::sanitize::{validate_score, ValidationError};
use crate::types::Mode;

// ==================== Data Structures ====================

/// One scored question as stored in the frustration report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrustrationReportRow {
    pub learner_id: String,
    pub mode: Mode,
    pub frustration_score: f64,
    pub question_id: String,
    /// RFC 3339 timestamp, carried through untouched
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Ok,
    InsufficientData,
}

impl AggregateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateStatus::Ok => "ok",
            AggregateStatus::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredModeRecord {
    pub learner_id: String,
    pub preferred_mode: Option<Mode>,
    pub status: AggregateStatus,
    pub mean_frustration_per_mode: BTreeMap<Mode, f64>,
    #[serde(default)]
    pub median_frustration_per_mode: BTreeMap<Mode, f64>,
    pub sample_count_per_mode: BTreeMap<Mode, usize>,
}

impl PreferredModeRecord {
    pub fn samples(&self, mode: Mode) -> usize {
        self.sample_count_per_mode.get(&mode).copied().unwrap_or(0)
    }

    pub fn mean(&self, mode: Mode) -> Option<f64> {
        self.mean_frustration_per_mode.get(&mode).copied()
    }

    fn statistic(&self, mode: Mode, rank_by: RankBy) -> Option<f64> {
        match rank_by {
            RankBy::Mean => self.mean(mode),
            RankBy::Median => self
                .median_frustration_per_mode
                .get(&mode)
                .copied()
                .or_else(|| self.mean(mode)),
        }
    }
}

/// A learner whose rows could not be aggregated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerError {
    pub learner_id: String,
    pub question_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub records: Vec<PreferredModeRecord>,
    pub errors: Vec<LearnerError>,
    /// Distinct learners present in the input
    pub learners_seen: usize,
    /// True when `max_learners` stopped the run early
    pub truncated: bool,
    /// Repeated rows ignored before grouping
    #[serde(default)]
    pub duplicates_dropped: usize,
}

/// Candidate considered by the tie-break ranking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeCandidate {
    pub mode: Mode,
    pub value: f64,
    pub samples: usize,
}

// ==================== Ranking ====================

/// Pick the best candidate: lowest value, ties within `epsilon` go to the
/// larger sample count, then to the fixed mode order.
pub fn pick_preferred(candidates: &[ModeCandidate], epsilon: f64) -> Option<Mode> {
    let best_value = candidates
        .iter()
        .map(|c| c.value)
        .fold(f64::INFINITY, f64::min);
    if !best_value.is_finite() {
        return None;
    }

    candidates
        .iter()
        .filter(|c| c.value - best_value <= epsilon)
        .min_by(|a, b| {
            b.samples
                .cmp(&a.samples)
                .then_with(|| a.mode.preference_rank().cmp(&b.mode.preference_rank()))
        })
        .map(|c| c.mode)
}

/// Best historical mode for a learner, optionally excluding one mode.
pub fn preferred_from_record(
    record: &PreferredModeRecord,
    min_samples: usize,
    epsilon: f64,
    rank_by: RankBy,
    exclude: Option<Mode>,
) -> Option<Mode> {
    let candidates: Vec<ModeCandidate> = Mode::ALL
        .iter()
        .copied()
        .filter(|mode| Some(*mode) != exclude)
        .filter(|mode| record.samples(*mode) >= min_samples)
        .filter_map(|mode| {
            record.statistic(mode, rank_by).map(|value| ModeCandidate {
                mode,
                value,
                samples: record.samples(mode),
            })
        })
        .collect();

    pick_preferred(&candidates, epsilon)
}

// ==================== Aggregation ====================

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn aggregate_learner(
    learner_id: &str,
    rows: &[&FrustrationReportRow],
    params: &AggregatorParams,
) -> Result<PreferredModeRecord, LearnerError> {
    let mut scores: BTreeMap<Mode, Vec<f64>> = BTreeMap::new();

    for row in rows {
        let score = validate_score(row.frustration_score).map_err(|err: ValidationError| {
            LearnerError {
                learner_id: learner_id.to_string(),
                question_id: row.question_id.clone(),
                message: err.to_string(),
            }
        })?;
        scores.entry(row.mode).or_default().push(score);
    }

    let mut record = PreferredModeRecord {
        learner_id: learner_id.to_string(),
        preferred_mode: None,
        status: AggregateStatus::InsufficientData,
        mean_frustration_per_mode: BTreeMap::new(),
        median_frustration_per_mode: BTreeMap::new(),
        sample_count_per_mode: BTreeMap::new(),
    };

    for (mode, values) in &scores {
        record.mean_frustration_per_mode.insert(*mode, mean(values));
        record.median_frustration_per_mode.insert(*mode, median(values));
        record.sample_count_per_mode.insert(*mode, values.len());
    }

    record.preferred_mode =
        preferred_from_record(&record, params.min_samples, params.epsilon, params.rank_by, None);
    if record.preferred_mode.is_some() {
        record.status = AggregateStatus::Ok;
    }

    Ok(record)
}

/// Compute one `PreferredModeRecord` per learner.
///
/// A learner with invalid rows is reported in `errors` and skipped; the rest
/// of the batch is still processed.
pub fn aggregate(rows: &[FrustrationReportRow], params: &AggregatorParams) -> AggregationReport {
    let mut seen: HashSet<(&str, &str, &str)> = HashSet::with_capacity(rows.len());
    let mut duplicates_dropped = 0;
    let mut grouped: BTreeMap<&str, Vec<&FrustrationReportRow>> = BTreeMap::new();
    for row in rows {
        let key = (
            row.learner_id.as_str(),
            row.question_id.as_str(),
            row.timestamp.as_str(),
        );
        if !seen.insert(key) {
            duplicates_dropped += 1;
            continue;
        }
        grouped.entry(row.learner_id.as_str()).or_default().push(row);
    }

    let learners_seen = grouped.len();
    let limit = params.max_learners.unwrap_or(usize::MAX);
    let truncated = learners_seen > limit;

    let groups: Vec<(&str, Vec<&FrustrationReportRow>)> = grouped.into_iter().take(limit).collect();

    let results: Vec<Result<PreferredModeRecord, LearnerError>> = groups
        .par_iter()
        .map(|(learner_id, learner_rows)| aggregate_learner(learner_id, learner_rows, params))
        .collect();

    let mut report = AggregationReport {
        learners_seen,
        truncated,
        duplicates_dropped,
        ..Default::default()
    };
    for result in results {
        match result {
            Ok(record) => report.records.push(record),
            Err(err) => report.errors.push(err),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(learner: &str, mode: Mode, scores: &[f64]) -> Vec<FrustrationReportRow> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| FrustrationReportRow {
                learner_id: learner.to_string(),
                mode,
                frustration_score: *score,
                question_id: format!("{}-{}-{}", learner, mode, i),
                timestamp: "2026-01-01T00:00:00Z".to_string(),
            })
            .collect()
    }

    // ==================== Ranking Tests ====================

    #[test]
    fn test_pick_lowest_value() {
        let candidates = [
            ModeCandidate { mode: Mode::Visual, value: 0.6, samples: 10 },
            ModeCandidate { mode: Mode::Auditory, value: 0.2, samples: 10 },
        ];
        assert_eq!(pick_preferred(&candidates, 0.01), Some(Mode::Auditory));
    }

    #[test]
    fn test_tie_goes_to_larger_sample() {
        let candidates = [
            ModeCandidate { mode: Mode::Visual, value: 0.40, samples: 8 },
            ModeCandidate { mode: Mode::Kinesthetic, value: 0.405, samples: 20 },
        ];
        assert_eq!(pick_preferred(&candidates, 0.01), Some(Mode::Kinesthetic));
    }

    #[test]
    fn test_full_tie_goes_to_fixed_order() {
        let candidates = [
            ModeCandidate { mode: Mode::Kinesthetic, value: 0.3, samples: 6 },
            ModeCandidate { mode: Mode::Auditory, value: 0.3, samples: 6 },
        ];
        assert_eq!(pick_preferred(&candidates, 0.01), Some(Mode::Auditory));
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(pick_preferred(&[], 0.01), None);
    }

    // ==================== Aggregation Tests ====================

    #[test]
    fn test_preferred_mode_is_lowest_mean() {
        let mut input = rows("L1", Mode::Visual, &[0.8; 6]);
        input.extend(rows("L1", Mode::Auditory, &[0.2; 6]));
        input.extend(rows("L1", Mode::Kinesthetic, &[0.5; 6]));

        let report = aggregate(&input, &AggregatorParams::default());
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.preferred_mode, Some(Mode::Auditory));
        assert_eq!(record.status, AggregateStatus::Ok);
        assert_eq!(record.samples(Mode::Visual), 6);
    }

    #[test]
    fn test_tie_break_by_sample_count() {
        let mut input = rows("L1", Mode::Visual, &[0.40; 8]);
        input.extend(rows("L1", Mode::Auditory, &[0.405; 20]));

        let report = aggregate(&input, &AggregatorParams::default());
        assert_eq!(report.records[0].preferred_mode, Some(Mode::Auditory));
    }

    #[test]
    fn test_modes_below_min_samples_ignored() {
        let mut input = rows("L1", Mode::Visual, &[0.1; 4]);
        input.extend(rows("L1", Mode::Auditory, &[0.6; 5]));

        let report = aggregate(&input, &AggregatorParams::default());
        assert_eq!(report.records[0].preferred_mode, Some(Mode::Auditory));
        assert_eq!(report.records[0].mean(Mode::Visual), Some(0.1));
    }

    #[test]
    fn test_insufficient_data_is_not_an_error() {
        let input = rows("new", Mode::Visual, &[0.3; 2]);
        let report = aggregate(&input, &AggregatorParams::default());
        assert!(report.errors.is_empty());
        let record = &report.records[0];
        assert_eq!(record.preferred_mode, None);
        assert_eq!(record.status, AggregateStatus::InsufficientData);
    }

    #[test]
    fn test_invalid_learner_isolated() {
        let mut input = rows("bad", Mode::Visual, &[0.3; 5]);
        input.extend(rows("bad", Mode::Auditory, &[1.5]));
        input.extend(rows("good", Mode::Visual, &[0.3; 5]));

        let report = aggregate(&input, &AggregatorParams::default());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].learner_id, "bad");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].learner_id, "good");
    }

    #[test]
    fn test_repeated_rows_counted_once() {
        // three visual questions each appended twice by a retried write
        let visual = rows("L1", Mode::Visual, &[0.1; 3]);
        let mut input = visual.clone();
        input.extend(visual);
        input.extend(rows("L1", Mode::Auditory, &[0.3; 5]));

        let report = aggregate(&input, &AggregatorParams::default());
        assert_eq!(report.duplicates_dropped, 3);
        let record = &report.records[0];
        assert_eq!(record.samples(Mode::Visual), 3);
        assert_eq!(record.preferred_mode, Some(Mode::Auditory));
    }

    #[test]
    fn test_same_question_at_new_timestamp_is_kept() {
        let mut input = rows("L1", Mode::Visual, &[0.2; 4]);
        let mut again = input[0].clone();
        again.timestamp = "2026-01-02T00:00:00Z".to_string();
        input.push(again);

        let report = aggregate(&input, &AggregatorParams::default());
        assert_eq!(report.duplicates_dropped, 0);
        assert_eq!(report.records[0].samples(Mode::Visual), 5);
    }

    #[test]
    fn test_max_learners_truncates_in_id_order() {
        let mut input = rows("c", Mode::Visual, &[0.1; 5]);
        input.extend(rows("a", Mode::Visual, &[0.1; 5]));
        input.extend(rows("b", Mode::Visual, &[0.1; 5]));

        let params = AggregatorParams {
            max_learners: Some(2),
            ..Default::default()
        };
        let report = aggregate(&input, &params);
        assert!(report.truncated);
        assert_eq!(report.learners_seen, 3);
        let ids: Vec<_> = report.records.iter().map(|r| r.learner_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_rank_by_median() {
        // Visual mean is pulled up by one outlier, median stays low
        let mut input = rows("L1", Mode::Visual, &[0.1, 0.1, 0.1, 0.1, 1.0]);
        input.extend(rows("L1", Mode::Auditory, &[0.25; 5]));

        let by_mean = aggregate(&input, &AggregatorParams::default());
        assert_eq!(by_mean.records[0].preferred_mode, Some(Mode::Auditory));

        let params = AggregatorParams {
            rank_by: RankBy::Median,
            ..Default::default()
        };
        let by_median = aggregate(&input, &params);
        assert_eq!(by_median.records[0].preferred_mode, Some(Mode::Visual));
    }

    #[test]
    fn test_median_even_count() {
        assert!((median(&[0.4, 0.1, 0.3, 0.2]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let mut input = rows("L2", Mode::Auditory, &[0.3, 0.2, 0.7, 0.1, 0.4]);
        input.extend(rows("L1", Mode::Kinesthetic, &[0.6; 7]));
        input.extend(rows("L1", Mode::Visual, &[0.5; 7]));

        let first = serde_json::to_string(&aggregate(&input, &AggregatorParams::default())).unwrap();
        let second = serde_json::to_string(&aggregate(&input, &AggregatorParams::default())).unwrap();
        assert_eq!(first, second);
    }
}
