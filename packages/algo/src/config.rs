//! Tunable parameters for scoring, selection and aggregation.
//!
//! Defaults are the documented starting values; every field can be
//! overridden and the whole set is checked by `validate()`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used when checking that the scoring weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("scoring weights must be non-negative and sum to 1 (got {0})")]
    WeightSum(f64),
    #[error("latency baseline {baseline_ms}ms must be below max {max_ms}ms")]
    LatencyRange { baseline_ms: f64, max_ms: f64 },
    #[error("{name} must be in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("switch streak must be at least 1")]
    ZeroStreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub affect: f64,
    pub incorrect: f64,
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            affect: 0.5,
            incorrect: 0.3,
            latency: 0.2,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.affect + self.incorrect + self.latency
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub weights: ScoringWeights,
    /// Expected response time
    pub baseline_ms: f64,
    /// Response time at which the latency term saturates
    pub max_ms: f64,
    /// Smoothing factor of the running frustration EMA
    pub ema_alpha: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            baseline_ms: 3000.0,
            max_ms: 30000.0,
            ema_alpha: 0.3,
        }
    }
}

impl ScoringParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let w = &self.weights;
        let sum = w.sum();
        if w.affect < 0.0
            || w.incorrect < 0.0
            || w.latency < 0.0
            || !sum.is_finite()
            || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE
        {
            return Err(ParamsError::WeightSum(sum));
        }
        if !(self.baseline_ms >= 0.0 && self.baseline_ms < self.max_ms) {
            return Err(ParamsError::LatencyRange {
                baseline_ms: self.baseline_ms,
                max_ms: self.max_ms,
            });
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ParamsError::OutOfRange {
                name: "ema_alpha",
                range: "(0, 1]",
                value: self.ema_alpha,
            });
        }
        Ok(())
    }
}

/// Minimum spacing between two automatic switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cooldown {
    Questions(u32),
    DurationMs(u64),
}

impl Default for Cooldown {
    fn default() -> Self {
        Cooldown::Questions(3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorParams {
    pub high_threshold: f64,
    pub switch_streak: u32,
    pub cooldown: Cooldown,
    /// Samples a historical mode needs before it can be a switch target
    pub min_samples: usize,
    /// Historical means closer than this are treated as tied
    pub tie_epsilon: f64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            high_threshold: 0.65,
            switch_streak: 2,
            cooldown: Cooldown::default(),
            min_samples: 5,
            tie_epsilon: 0.01,
        }
    }
}

impl SelectorParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(0.0..=1.0).contains(&self.high_threshold) {
            return Err(ParamsError::OutOfRange {
                name: "high_threshold",
                range: "[0, 1]",
                value: self.high_threshold,
            });
        }
        if self.switch_streak == 0 {
            return Err(ParamsError::ZeroStreak);
        }
        if !(self.tie_epsilon >= 0.0 && self.tie_epsilon.is_finite()) {
            return Err(ParamsError::OutOfRange {
                name: "tie_epsilon",
                range: "[0, inf)",
                value: self.tie_epsilon,
            });
        }
        Ok(())
    }
}

/// Statistic used to rank modes against each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    Mean,
    Median,
}

impl RankBy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "mean" => Some(RankBy::Mean),
            "median" => Some(RankBy::Median),
            _ => None,
        }
    }
}

impl Default for RankBy {
    fn default() -> Self {
        RankBy::Mean
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorParams {
    pub min_samples: usize,
    pub epsilon: f64,
    pub rank_by: RankBy,
    /// Stop after this many learners (in learner-id order)
    pub max_learners: Option<usize>,
}

impl Default for AggregatorParams {
    fn default() -> Self {
        Self {
            min_samples: 5,
            epsilon: 0.01,
            rank_by: RankBy::Mean,
            max_learners: None,
        }
    }
}

impl AggregatorParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.epsilon >= 0.0 && self.epsilon.is_finite()) {
            return Err(ParamsError::OutOfRange {
                name: "epsilon",
                range: "[0, inf)",
                value: self.epsilon,
            });
        }
        Ok(())
    }
}
