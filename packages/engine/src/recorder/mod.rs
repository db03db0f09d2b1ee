//! Session recorder: append-only sink for scored questions.

mod csv_report;

use std::time::Duration;

use affectmode_algo::QuestionEvent;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::{EngineError, RecorderError};

pub use csv_report::CsvReportRecorder;

#[async_trait]
pub trait SessionRecorder: Send + Sync {
    /// Persist one event. `Ok` is the acknowledgement; a repeated call after
    /// an error may write the event twice.
    async fn append(&self, event: &QuestionEvent) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Append with bounded retries; the event travels back inside the error
/// once the attempts are exhausted so the caller never loses it.
pub async fn append_with_retry(
    recorder: &dyn SessionRecorder,
    event: &QuestionEvent,
    policy: &RetryPolicy,
) -> Result<u32, EngineError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match recorder.append(event).await {
            Ok(()) => return Ok(attempt),
            Err(err) if attempt >= max_attempts => {
                return Err(EngineError::Persistence {
                    attempts: attempt,
                    event: Box::new(event.clone()),
                    source: err,
                });
            }
            Err(err) => {
                warn!(
                    learner_id = %event.learner_id,
                    question_id = %event.question_id,
                    attempt,
                    error = %err,
                    "Recorder append failed, retrying"
                );
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// In-process recorder, mostly for tests and dry runs.
#[derive(Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<QuestionEvent>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QuestionEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl SessionRecorder for MemoryRecorder {
    async fn append(&self, event: &QuestionEvent) -> Result<(), RecorderError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affectmode_algo::Mode;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn event() -> QuestionEvent {
        QuestionEvent {
            question_id: "q1".to_string(),
            learner_id: "L1".to_string(),
            mode: Mode::Visual,
            correct: false,
            skipped: false,
            response_latency_ms: 4000,
            affect_window: Vec::new(),
            frustration_score: 0.3,
            timestamp_ms: 0,
        }
    }

    struct FailFirst {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SessionRecorder for FailFirst {
        async fn append(&self, _event: &QuestionEvent) -> Result<(), RecorderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(RecorderError::Rejected("disk full".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let recorder = FailFirst {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let attempts = append_with_retry(&recorder, &event(), &quick()).await.unwrap();
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_event() {
        let recorder = FailFirst {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        match append_with_retry(&recorder, &event(), &quick()).await {
            Err(EngineError::Persistence { attempts, event, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(event.question_id, "q1");
            }
            other => panic!("expected persistence error, got {other:?}"),
        }
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_memory_recorder_keeps_order() {
        let recorder = MemoryRecorder::new();
        let mut second = event();
        second.question_id = "q2".to_string();
        recorder.append(&event()).await.unwrap();
        recorder.append(&second).await.unwrap();
        let ids: Vec<_> = recorder.events().into_iter().map(|e| e.question_id).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(3), Duration::from_millis(150));
    }
}
