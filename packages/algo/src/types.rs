//! Common Types and Constants
//!
//! Shared data structures used across the scoring, selection and aggregation
//! modules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sanitize::ValidationError;

// ==================== Constants ====================

/// Emotion labels counted as negative affect by the scorer
pub const NEGATIVE_EMOTIONS: [EmotionLabel; 4] = [
    EmotionLabel::Angry,
    EmotionLabel::Frustrated,
    EmotionLabel::Sad,
    EmotionLabel::Confused,
];

/// Upper bound of the `Low` frustration band
pub const LOW_FRUSTRATION_MAX: f64 = 0.4;

/// Lower (exclusive) bound of the `High` frustration band
pub const HIGH_FRUSTRATION_MIN: f64 = 0.75;

// ==================== Presentation Mode ====================

/// Presentation mode of learning content.
///
/// Variant order doubles as the fixed tie-break order:
/// visual, then auditory, then kinesthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Visual,
    Auditory,
    Kinesthetic,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Visual, Mode::Auditory, Mode::Kinesthetic];

    /// Parse a mode label, accepting the legacy kinesthetic synonyms.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_lowercase().as_str() {
            "visual" => Ok(Mode::Visual),
            "auditory" => Ok(Mode::Auditory),
            "kinesthetic" | "kinesthetics" | "kinaesthetic" | "interactive" | "hands-on"
            | "hands on" => Ok(Mode::Kinesthetic),
            _ => Err(ValidationError::UnknownMode(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Visual => "visual",
            Mode::Auditory => "auditory",
            Mode::Kinesthetic => "kinesthetic",
        }
    }

    /// Deterministic fallback cycle: visual -> auditory -> kinesthetic -> visual
    pub fn next(&self) -> Self {
        match self {
            Mode::Visual => Mode::Auditory,
            Mode::Auditory => Mode::Kinesthetic,
            Mode::Kinesthetic => Mode::Visual,
        }
    }

    /// Lower rank wins a tie
    pub fn preference_rank(&self) -> u8 {
        match self {
            Mode::Visual => 0,
            Mode::Auditory => 1,
            Mode::Kinesthetic => 2,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Visual
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::parse(s)
    }
}

// ==================== Affect Types ====================

/// Discrete emotion label produced by an affect classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Frustrated,
    Confused,
    Unknown,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 8] = [
        EmotionLabel::Neutral,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Surprised,
        EmotionLabel::Frustrated,
        EmotionLabel::Confused,
        EmotionLabel::Unknown,
    ];

    /// Unrecognized labels become `Unknown` and never count as negative.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "neutral" => EmotionLabel::Neutral,
            "happy" => EmotionLabel::Happy,
            "sad" => EmotionLabel::Sad,
            "angry" => EmotionLabel::Angry,
            "surprised" | "surprise" => EmotionLabel::Surprised,
            "frustrated" => EmotionLabel::Frustrated,
            "confused" => EmotionLabel::Confused,
            _ => EmotionLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Surprised => "surprised",
            EmotionLabel::Frustrated => "frustrated",
            EmotionLabel::Confused => "confused",
            EmotionLabel::Unknown => "unknown",
        }
    }

    pub fn is_negative(&self) -> bool {
        NEGATIVE_EMOTIONS.contains(self)
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped emotion classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectObservation {
    /// Unix epoch milliseconds
    pub timestamp_ms: i64,
    pub label: EmotionLabel,
    /// Classifier confidence [0, 1]
    pub confidence: f64,
}

impl AffectObservation {
    pub fn new(timestamp_ms: i64, label: EmotionLabel, confidence: f64) -> Self {
        Self {
            timestamp_ms,
            label,
            confidence,
        }
    }

    /// Placeholder for a sample the sensor could not produce in time
    pub fn unknown(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            label: EmotionLabel::Unknown,
            confidence: 0.0,
        }
    }
}

/// Result of one affect-source poll
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Observation {
    Observed(AffectObservation),
    Unavailable,
}

impl Observation {
    /// `Unavailable` becomes `unknown` with confidence 0.
    pub fn resolve(self, timestamp_ms: i64) -> AffectObservation {
        match self {
            Observation::Observed(obs) => obs,
            Observation::Unavailable => AffectObservation::unknown(timestamp_ms),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Observation::Observed(_))
    }
}

// ==================== Question Types ====================

/// Evidence collected for one answered question, before scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionInput {
    pub question_id: String,
    pub learner_id: String,
    pub mode: Mode,
    pub correct: bool,
    /// Skipped questions count as incorrect
    #[serde(default)]
    pub skipped: bool,
    /// Signed so that negative latencies can be rejected instead of wrapped
    pub response_latency_ms: i64,
    #[serde(default)]
    pub affect_window: Vec<AffectObservation>,
}

/// A scored question; immutable once written to the session recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEvent {
    pub question_id: String,
    pub learner_id: String,
    pub mode: Mode,
    pub correct: bool,
    pub skipped: bool,
    pub response_latency_ms: i64,
    pub affect_window: Vec<AffectObservation>,
    /// [0, 1]
    pub frustration_score: f64,
    pub timestamp_ms: i64,
}

impl QuestionEvent {
    pub fn from_input(input: QuestionInput, frustration_score: f64, timestamp_ms: i64) -> Self {
        Self {
            question_id: input.question_id,
            learner_id: input.learner_id,
            mode: input.mode,
            correct: input.correct,
            skipped: input.skipped,
            response_latency_ms: input.response_latency_ms,
            affect_window: input.affect_window,
            frustration_score,
            timestamp_ms,
        }
    }
}

// ==================== Frustration Level ====================

/// Coarse banding of a frustration score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrustrationLevel {
    Low,
    Moderate,
    High,
}

impl FrustrationLevel {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_FRUSTRATION_MIN {
            FrustrationLevel::High
        } else if score > LOW_FRUSTRATION_MAX {
            FrustrationLevel::Moderate
        } else {
            FrustrationLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrustrationLevel::Low => "low",
            FrustrationLevel::Moderate => "moderate",
            FrustrationLevel::High => "high",
        }
    }
}

impl fmt::Display for FrustrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
