use std::time::Duration;

use affectmode_algo::{AffectObservation, EmotionLabel, Observation};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{now_ms, AffectSource, SourceKind};
use crate::error::SensorError;

const STAY_PROBABILITY: f64 = 0.7;

const POSITIVE_GROUP: [EmotionLabel; 3] = [
    EmotionLabel::Neutral,
    EmotionLabel::Happy,
    EmotionLabel::Surprised,
];

const NEGATIVE_GROUP: [EmotionLabel; 5] = [
    EmotionLabel::Neutral,
    EmotionLabel::Sad,
    EmotionLabel::Frustrated,
    EmotionLabel::Confused,
    EmotionLabel::Angry,
];

const ALL_SIMULATED: [EmotionLabel; 7] = [
    EmotionLabel::Neutral,
    EmotionLabel::Happy,
    EmotionLabel::Sad,
    EmotionLabel::Angry,
    EmotionLabel::Surprised,
    EmotionLabel::Frustrated,
    EmotionLabel::Confused,
];

enum Pattern {
    Seeded {
        rng: ChaCha8Rng,
        last: Option<EmotionLabel>,
    },
    Fixed {
        sequence: Vec<(EmotionLabel, f64)>,
        cursor: usize,
    },
}

/// Sensor-free affect source.
///
/// The seeded variant drifts between a positive and a negative valence
/// group; the fixed variant replays a cyclic sequence verbatim.
pub struct SimulatedAffectSource {
    pattern: Mutex<Pattern>,
}

impl SimulatedAffectSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            pattern: Mutex::new(Pattern::Seeded {
                rng: ChaCha8Rng::seed_from_u64(seed),
                last: None,
            }),
        }
    }

    /// Cycle through `sequence`; an empty sequence yields `Unavailable`.
    pub fn fixed(sequence: Vec<(EmotionLabel, f64)>) -> Self {
        Self {
            pattern: Mutex::new(Pattern::Fixed {
                sequence,
                cursor: 0,
            }),
        }
    }

    /// Produce the next observation synchronously.
    pub fn next_observation(&self, timestamp_ms: i64) -> Observation {
        let mut pattern = self.pattern.lock();
        match &mut *pattern {
            Pattern::Seeded { rng, last } => {
                let label = match *last {
                    None => EmotionLabel::Neutral,
                    Some(previous) => next_label(rng, previous),
                };
                *last = Some(label);
                let confidence = rng.gen_range(0.5..=1.0);
                Observation::Observed(AffectObservation::new(timestamp_ms, label, confidence))
            }
            Pattern::Fixed { sequence, cursor } => {
                if sequence.is_empty() {
                    return Observation::Unavailable;
                }
                let (label, confidence) = sequence[*cursor % sequence.len()];
                *cursor += 1;
                Observation::Observed(AffectObservation::new(timestamp_ms, label, confidence))
            }
        }
    }
}

fn next_label(rng: &mut ChaCha8Rng, previous: EmotionLabel) -> EmotionLabel {
    if rng.gen_bool(STAY_PROBABILITY) {
        let group: &[EmotionLabel] = if matches!(previous, EmotionLabel::Happy | EmotionLabel::Surprised) {
            &POSITIVE_GROUP
        } else {
            &NEGATIVE_GROUP
        };
        group[rng.gen_range(0..group.len())]
    } else {
        ALL_SIMULATED[rng.gen_range(0..ALL_SIMULATED.len())]
    }
}

#[async_trait]
impl AffectSource for SimulatedAffectSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }

    async fn observe(&self, _timeout: Duration) -> Result<Observation, SensorError> {
        Ok(self.next_observation(now_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(source: &SimulatedAffectSource, n: usize) -> Vec<(EmotionLabel, f64)> {
        (0..n)
            .map(|i| match source.next_observation(i as i64) {
                Observation::Observed(obs) => (obs.label, obs.confidence),
                Observation::Unavailable => panic!("seeded source is always available"),
            })
            .collect()
    }

    #[test]
    fn test_seeded_starts_neutral() {
        let source = SimulatedAffectSource::seeded(7);
        assert_eq!(labels(&source, 1)[0].0, EmotionLabel::Neutral);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = labels(&SimulatedAffectSource::seeded(42), 50);
        let b = labels(&SimulatedAffectSource::seeded(42), 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_confidence_in_range_and_no_unknown() {
        for (label, confidence) in labels(&SimulatedAffectSource::seeded(3), 500) {
            assert!((0.5..=1.0).contains(&confidence));
            assert_ne!(label, EmotionLabel::Unknown);
        }
    }

    #[test]
    fn test_fixed_pattern_cycles() {
        let source = SimulatedAffectSource::fixed(vec![
            (EmotionLabel::Angry, 0.9),
            (EmotionLabel::Happy, 0.6),
        ]);
        let seen = labels(&source, 3);
        assert_eq!(seen[0], (EmotionLabel::Angry, 0.9));
        assert_eq!(seen[1], (EmotionLabel::Happy, 0.6));
        assert_eq!(seen[2], (EmotionLabel::Angry, 0.9));
    }

    #[test]
    fn test_empty_fixed_pattern_is_unavailable() {
        let source = SimulatedAffectSource::fixed(Vec::new());
        assert_eq!(source.next_observation(0), Observation::Unavailable);
    }
}
