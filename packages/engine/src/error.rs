use std::path::PathBuf;

use affectmode_algo::{ParamsError, QuestionEvent, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no affect sensor present")]
    NotPresent,
    #[error("classifier failed: {0}")]
    Classifier(String),
    #[error("classifier task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("recorder rejected event: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} is missing required column {column:?}")]
    MissingColumn { path: PathBuf, column: &'static str },
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        ReportError::Csv {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameters: {0}")]
    Params(#[from] ParamsError),
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("no active session for learner {0}")]
    UnknownSession(String),
    #[error("session already active for learner {0}")]
    SessionExists(String),
    #[error("failed to persist question {} after {attempts} attempts: {source}", .event.question_id)]
    Persistence {
        attempts: u32,
        /// The scored event that could not be written
        event: Box<QuestionEvent>,
        #[source]
        source: RecorderError,
    },
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
