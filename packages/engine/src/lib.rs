//! Online and batch runtime for affect-adaptive presentation.
//!
//! The scoring, selection and aggregation logic lives in `affectmode-algo`;
//! this crate supplies the affect sources, live session handling,
//! persistence, notification bus and file formats around it.

pub mod affect;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod replay;
pub mod report;
pub mod session;

pub use config::Config;
pub use error::{ConfigError, EngineError, RecorderError, ReportError, SensorError};
