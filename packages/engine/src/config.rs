use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use affectmode_algo::{AggregatorParams, Cooldown, RankBy, ScoringParams, SelectorParams};

use crate::error::ConfigError;
use crate::recorder::RetryPolicy;

#[derive(Debug, Clone)]
pub struct AffectSettings {
    /// Upper bound for one sensor poll
    pub observe_timeout: Duration,
    /// Observations sampled per question
    pub window_size: usize,
    pub simulator_seed: u64,
}

impl Default for AffectSettings {
    fn default() -> Self {
        Self {
            observe_timeout: Duration::from_millis(500),
            window_size: 5,
            simulator_seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub scoring: ScoringParams,
    pub selector: SelectorParams,
    pub aggregator: AggregatorParams,
    pub affect: AffectSettings,
    pub retry: RetryPolicy,
    pub report_path: PathBuf,
    pub preferred_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scoring: ScoringParams::default(),
            selector: SelectorParams::default(),
            aggregator: AggregatorParams::default(),
            affect: AffectSettings::default(),
            retry: RetryPolicy::default(),
            report_path: PathBuf::from("frustration_report.csv"),
            preferred_path: PathBuf::from("preferred_modes.csv"),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; unparsable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let mut config = Self::default();

        if let Some(level) = parse("RUST_LOG") {
            config.log_level = level;
        }

        let weights = &mut config.scoring.weights;
        set_parsed(&parse, "AFFECTMODE_W_AFFECT", &mut weights.affect);
        set_parsed(&parse, "AFFECTMODE_W_INCORRECT", &mut weights.incorrect);
        set_parsed(&parse, "AFFECTMODE_W_LATENCY", &mut weights.latency);
        set_parsed(&parse, "AFFECTMODE_BASELINE_MS", &mut config.scoring.baseline_ms);
        set_parsed(&parse, "AFFECTMODE_MAX_MS", &mut config.scoring.max_ms);
        set_parsed(&parse, "AFFECTMODE_EMA_ALPHA", &mut config.scoring.ema_alpha);

        set_parsed(&parse, "AFFECTMODE_HIGH_THRESHOLD", &mut config.selector.high_threshold);
        set_parsed(&parse, "AFFECTMODE_SWITCH_STREAK", &mut config.selector.switch_streak);
        if let Some(n) = parse("AFFECTMODE_COOLDOWN_QUESTIONS").and_then(|v| v.parse().ok()) {
            config.selector.cooldown = Cooldown::Questions(n);
        }
        // wall-clock cooldown wins when both are set
        if let Some(ms) = parse("AFFECTMODE_COOLDOWN_MS").and_then(|v| v.parse().ok()) {
            config.selector.cooldown = Cooldown::DurationMs(ms);
        }

        if let Some(n) = parse("AFFECTMODE_MIN_SAMPLES").and_then(|v| v.parse().ok()) {
            config.selector.min_samples = n;
            config.aggregator.min_samples = n;
        }
        if let Some(eps) = parse("AFFECTMODE_EPSILON").and_then(|v| v.parse().ok()) {
            config.selector.tie_epsilon = eps;
            config.aggregator.epsilon = eps;
        }
        if let Some(rank_by) = parse("AFFECTMODE_RANK_BY").and_then(|v| RankBy::parse(&v)) {
            config.aggregator.rank_by = rank_by;
        }
        if let Some(n) = parse("AFFECTMODE_MAX_LEARNERS").and_then(|v| v.parse().ok()) {
            config.aggregator.max_learners = Some(n);
        }

        if let Some(ms) = parse("AFFECTMODE_OBSERVE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.affect.observe_timeout = Duration::from_millis(ms);
        }
        set_parsed(&parse, "AFFECTMODE_AFFECT_WINDOW", &mut config.affect.window_size);
        set_parsed(&parse, "AFFECTMODE_SIM_SEED", &mut config.affect.simulator_seed);

        set_parsed(&parse, "AFFECTMODE_APPEND_ATTEMPTS", &mut config.retry.max_attempts);
        if let Some(ms) = parse("AFFECTMODE_APPEND_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            config.retry.backoff = Duration::from_millis(ms);
        }

        if let Some(path) = parse("AFFECTMODE_REPORT_PATH").filter(|p| !p.is_empty()) {
            config.report_path = PathBuf::from(path);
        }
        if let Some(path) = parse("AFFECTMODE_PREFERRED_PATH").filter(|p| !p.is_empty()) {
            config.preferred_path = PathBuf::from(path);
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.selector.validate()?;
        self.aggregator.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Zero("AFFECTMODE_APPEND_ATTEMPTS"));
        }
        Ok(())
    }
}

fn set_parsed<T, F>(parse: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parse(key).and_then(|v| v.parse::<T>().ok()) {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.scoring, ScoringParams::default());
        assert_eq!(config.selector, SelectorParams::default());
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("AFFECTMODE_W_AFFECT", "0.6"),
            ("AFFECTMODE_W_INCORRECT", "0.2"),
            ("AFFECTMODE_HIGH_THRESHOLD", "0.5"),
            ("AFFECTMODE_COOLDOWN_QUESTIONS", "4"),
            ("AFFECTMODE_MIN_SAMPLES", "8"),
            ("AFFECTMODE_RANK_BY", "median"),
            ("AFFECTMODE_MAX_LEARNERS", "100"),
        ]));
        assert_eq!(config.scoring.weights.affect, 0.6);
        assert_eq!(config.selector.high_threshold, 0.5);
        assert_eq!(config.selector.cooldown, Cooldown::Questions(4));
        assert_eq!(config.selector.min_samples, 8);
        assert_eq!(config.aggregator.min_samples, 8);
        assert_eq!(config.aggregator.rank_by, RankBy::Median);
        assert_eq!(config.aggregator.max_learners, Some(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_cooldown_takes_precedence() {
        let config = Config::from_lookup(lookup(&[
            ("AFFECTMODE_COOLDOWN_QUESTIONS", "4"),
            ("AFFECTMODE_COOLDOWN_MS", "90000"),
        ]));
        assert_eq!(config.selector.cooldown, Cooldown::DurationMs(90000));
    }

    #[test]
    fn test_unparsable_keeps_default() {
        let config = Config::from_lookup(lookup(&[("AFFECTMODE_EMA_ALPHA", "fast")]));
        assert_eq!(config.scoring.ema_alpha, 0.3);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let config = Config::from_lookup(lookup(&[("AFFECTMODE_W_AFFECT", "0.9")]));
        assert!(matches!(config.validate(), Err(ConfigError::Params(_))));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = Config::from_lookup(lookup(&[("AFFECTMODE_APPEND_ATTEMPTS", "0")]));
        assert!(matches!(config.validate(), Err(ConfigError::Zero(_))));
    }
}
