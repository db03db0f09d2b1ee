//! Affect sources.
//!
//! One capability interface with interchangeable implementations. The
//! concrete source is chosen once by [`probe_affect_source`]; callers only
//! ever see `dyn AffectSource`.

mod live;
mod simulated;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use affectmode_algo::Observation;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SensorError;

pub use live::LiveAffectSource;
pub use simulated::SimulatedAffectSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Live,
    Simulated,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Live => "live",
            SourceKind::Simulated => "simulated",
        }
    }
}

#[async_trait]
pub trait AffectSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Poll once. Must return within roughly `timeout`; a source with nothing
    /// to report in time answers `Ok(Observation::Unavailable)`.
    async fn observe(&self, timeout: Duration) -> Result<Observation, SensorError>;
}

/// Raw classifier output before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
}

/// Blocking contract a camera-backed emotion model has to satisfy.
pub trait EmotionClassifier: Send + Sync + 'static {
    /// Cheap readiness check run once at startup.
    fn probe(&self) -> Result<(), SensorError>;

    fn classify(&self) -> Result<Classification, SensorError>;
}

/// Wraps a live source and falls back to the simulator for good after the
/// first sensor error. The error is logged once, never returned.
pub struct DegradingAffectSource {
    primary: Box<dyn AffectSource>,
    fallback: SimulatedAffectSource,
    degraded: AtomicBool,
}

impl DegradingAffectSource {
    pub fn new(primary: Box<dyn AffectSource>, fallback: SimulatedAffectSource) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

#[async_trait]
impl AffectSource for DegradingAffectSource {
    fn kind(&self) -> SourceKind {
        if self.is_degraded() {
            SourceKind::Simulated
        } else {
            self.primary.kind()
        }
    }

    async fn observe(&self, timeout: Duration) -> Result<Observation, SensorError> {
        if !self.is_degraded() {
            match self.primary.observe(timeout).await {
                Ok(observation) => return Ok(observation),
                Err(err) => {
                    if !self.degraded.swap(true, Ordering::AcqRel) {
                        warn!(error = %err, "Affect sensor failed, switching to simulated source");
                    }
                }
            }
        }
        self.fallback.observe(timeout).await
    }
}

/// Select the affect source for this process.
///
/// A classifier that passes its probe is used live, wrapped so that later
/// failures degrade to `fallback`. Without one the simulator is used directly.
pub fn probe_affect_source(
    classifier: Option<Arc<dyn EmotionClassifier>>,
    fallback: SimulatedAffectSource,
) -> Box<dyn AffectSource> {
    let Some(classifier) = classifier else {
        info!("No affect classifier configured, using simulated source");
        return Box::new(fallback);
    };

    match classifier.probe() {
        Ok(()) => {
            info!("Affect classifier ready, using live source");
            Box::new(DegradingAffectSource::new(
                Box::new(LiveAffectSource::new(classifier)),
                fallback,
            ))
        }
        Err(err) => {
            warn!(error = %err, "Affect classifier probe failed, using simulated source");
            Box::new(fallback)
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
