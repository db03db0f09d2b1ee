use std::sync::Arc;
use std::time::Duration;

use affectmode_algo::{AffectObservation, EmotionLabel, Observation};
use async_trait::async_trait;
use tracing::debug;

use super::{now_ms, AffectSource, EmotionClassifier, SourceKind};
use crate::error::SensorError;

/// Affect source backed by a camera-driven classifier.
///
/// Classification runs on the blocking pool so a slow model never stalls
/// the runtime; a poll that outlives its timeout yields `Unavailable`.
pub struct LiveAffectSource {
    classifier: Arc<dyn EmotionClassifier>,
}

impl LiveAffectSource {
    pub fn new(classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl AffectSource for LiveAffectSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }

    async fn observe(&self, timeout: Duration) -> Result<Observation, SensorError> {
        let classifier = Arc::clone(&self.classifier);
        let task = tokio::task::spawn_blocking(move || classifier.classify());

        let classification = match tokio::time::timeout(timeout, task).await {
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Affect poll timed out");
                return Ok(Observation::Unavailable);
            }
            Ok(Err(join_err)) => return Err(SensorError::Task(join_err.to_string())),
            Ok(Ok(result)) => result?,
        };

        if !classification.confidence.is_finite() {
            return Err(SensorError::Classifier(format!(
                "non-finite confidence for label {:?}",
                classification.label
            )));
        }

        Ok(Observation::Observed(AffectObservation::new(
            now_ms(),
            EmotionLabel::parse(&classification.label),
            classification.confidence.clamp(0.0, 1.0),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affect::Classification;

    struct Fixed(&'static str, f64);

    impl EmotionClassifier for Fixed {
        fn probe(&self) -> Result<(), SensorError> {
            Ok(())
        }
        fn classify(&self) -> Result<Classification, SensorError> {
            Ok(Classification {
                label: self.0.to_string(),
                confidence: self.1,
            })
        }
    }

    struct Slow;

    impl EmotionClassifier for Slow {
        fn probe(&self) -> Result<(), SensorError> {
            Ok(())
        }
        fn classify(&self) -> Result<Classification, SensorError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(Classification {
                label: "sad".to_string(),
                confidence: 1.0,
            })
        }
    }

    #[tokio::test]
    async fn test_live_observation_is_normalized() {
        let source = LiveAffectSource::new(Arc::new(Fixed(" Frustrated ", 1.4)));
        let obs = source.observe(Duration::from_secs(1)).await.unwrap();
        match obs {
            Observation::Observed(obs) => {
                assert_eq!(obs.label, EmotionLabel::Frustrated);
                assert_eq!(obs.confidence, 1.0);
            }
            Observation::Unavailable => panic!("expected an observation"),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_label_is_unknown() {
        let source = LiveAffectSource::new(Arc::new(Fixed("bored", 0.8)));
        let obs = source.observe(Duration::from_secs(1)).await.unwrap();
        assert_eq!(obs.resolve(0).label, EmotionLabel::Unknown);
    }

    #[tokio::test]
    async fn test_timeout_yields_unavailable() {
        let source = LiveAffectSource::new(Arc::new(Slow));
        let obs = source.observe(Duration::from_millis(10)).await.unwrap();
        assert_eq!(obs, Observation::Unavailable);
    }

    #[tokio::test]
    async fn test_nan_confidence_is_an_error() {
        let source = LiveAffectSource::new(Arc::new(Fixed("sad", f64::NAN)));
        assert!(matches!(
            source.observe(Duration::from_secs(1)).await,
            Err(SensorError::Classifier(_))
        ));
    }
}
