//! Mode-switch timeline over a learner's recorded questions.

use serde::{Deserialize, Serialize};

use crate::aggregator::FrustrationReportRow;
use crate::types::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeTransition {
    /// 1-based index of the first question in the new mode
    pub question_index: usize,
    pub from: Mode,
    pub to: Mode,
}

/// Every point where the recorded mode changes, in row order.
///
/// Rows are expected to belong to one learner and be in answer order.
pub fn mode_switches(rows: &[FrustrationReportRow]) -> Vec<ModeTransition> {
    rows.windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].mode != pair[1].mode)
        .map(|(i, pair)| ModeTransition {
            question_index: i + 2,
            from: pair[0].mode,
            to: pair[1].mode,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(mode: Mode) -> FrustrationReportRow {
        FrustrationReportRow {
            learner_id: "L1".to_string(),
            mode,
            frustration_score: 0.5,
            question_id: "q".to_string(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_no_switches() {
        assert!(mode_switches(&[row(Mode::Visual), row(Mode::Visual)]).is_empty());
        assert!(mode_switches(&[]).is_empty());
    }

    #[test]
    fn test_switch_indices_are_one_based() {
        let rows = [
            row(Mode::Visual),
            row(Mode::Visual),
            row(Mode::Auditory),
            row(Mode::Kinesthetic),
        ];
        let switches = mode_switches(&rows);
        assert_eq!(
            switches,
            vec![
                ModeTransition { question_index: 3, from: Mode::Visual, to: Mode::Auditory },
                ModeTransition { question_index: 4, from: Mode::Auditory, to: Mode::Kinesthetic },
            ]
        );
    }
}
