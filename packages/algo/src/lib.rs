//! # affectmode-algo - affect-adaptive presentation core
//!
//! Pure Rust algorithms for adapting how content is presented to a learner
//! based on inferred frustration:
//!
//! - **Frustration Scorer** - weighted affect / correctness / latency score per question
//! - **Mode Selector** - hysteresis state machine over visual, auditory and kinesthetic modes
//! - **Preferred-Mode Aggregator** - offline lowest-frustration mode per learner
//!
//! ## Module structure
//!
//! - [`types`] - modes, emotion labels, observations, question events
//! - [`config`] - tunable parameter sets
//! - [`sanitize`] - structural input validation
//! - [`scorer`] - per-question score and running average
//! - [`selector`] - session state and switching rules
//! - [`pipeline`] - the shared score-then-select step
//! - [`aggregator`] - cross-session preferred-mode computation
//! - [`timeline`] - recorded mode-switch points
//!
//! ## Example
//!
//! ```rust
//! use affectmode_algo::{FrustrationLoop, Mode, QuestionInput, SessionState};
//!
//! let lp = FrustrationLoop::default();
//! let state = SessionState::seeded("L1", None, 0);
//! let outcome = lp
//!     .step(
//!         &state,
//!         QuestionInput {
//!             question_id: "q1".to_string(),
//!             learner_id: "L1".to_string(),
//!             mode: state.current_mode,
//!             correct: false,
//!             skipped: false,
//!             response_latency_ms: 25_000,
//!             affect_window: Vec::new(),
//!         },
//!         None,
//!         1_000,
//!     )
//!     .unwrap();
//! assert_eq!(outcome.decision.mode(), Mode::Visual);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod aggregator;
pub mod config;
pub mod pipeline;
pub mod sanitize;
pub mod scorer;
pub mod selector;
pub mod timeline;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use config::{
    AggregatorParams, Cooldown, ParamsError, RankBy, ScoringParams, ScoringWeights,
    SelectorParams,
};

pub use sanitize::ValidationError;

pub use scorer::{score_question, update_running, FrustrationBreakdown};

pub use selector::{ModeSelector, ModeSwitch, SelectorDecision, SessionState, SwitchReason};

pub use pipeline::{FrustrationLoop, StepOutcome};

pub use aggregator::{
    aggregate, AggregateStatus, AggregationReport, FrustrationReportRow, LearnerError,
    PreferredModeRecord,
};

pub use timeline::{mode_switches, ModeTransition};
