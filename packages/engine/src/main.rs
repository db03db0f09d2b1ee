//! affectmode CLI
//!
//! Offline aggregation, learner-log replay and simulated sessions.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use affectmode_engine::commands;
use affectmode_engine::logging::init_tracing;
use affectmode_engine::{Config, EngineError};

#[derive(Parser)]
#[command(
    name = "affectmode",
    about = "Frustration-driven presentation mode selection",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute each learner's preferred mode from frustration reports
    Aggregate {
        /// Report files to merge
        #[arg(short, long = "input")]
        inputs: Vec<PathBuf>,

        /// Also merge every frustration_report*.csv in this directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Output file, overwritten (defaults to AFFECTMODE_PREFERRED_PATH)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay a recorded learner log through the scorer and selector
    Replay {
        /// Learner log CSV
        #[arg(short, long)]
        log: PathBuf,

        /// Append the scored rows to a frustration report, skipping questions it already has
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Preferred-mode file used to seed sessions and pick switch targets
        #[arg(short, long)]
        preferred: Option<PathBuf>,
    },

    /// List recorded mode changes per learner
    Timeline {
        /// Frustration report file (defaults to AFFECTMODE_REPORT_PATH)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Only this learner
        #[arg(long)]
        learner: Option<String>,
    },

    /// Run simulated sessions through the live engine
    Simulate {
        /// Number of concurrent learners
        #[arg(long, default_value = "3")]
        learners: usize,

        /// Questions per learner
        #[arg(long, default_value = "20")]
        questions: usize,

        /// Report file to append to (defaults to AFFECTMODE_REPORT_PATH)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => tracing::error!(error = %err, "failed to serialize output"),
    }
}

async fn run(cli: Cli, mut config: Config) -> Result<(), EngineError> {
    match cli.command {
        Commands::Aggregate { inputs, dir, output } => {
            let output = output.unwrap_or_else(|| config.preferred_path.clone());
            let summary = commands::aggregate_reports(&inputs, dir.as_deref(), &output, &config)?;
            print_json(&summary);
        }
        Commands::Replay {
            log,
            report,
            preferred,
        } => {
            let summary =
                commands::replay_file(&log, report.as_deref(), preferred.as_deref(), &config)?;
            print_json(&summary);
        }
        Commands::Timeline { report, learner } => {
            let report = report.unwrap_or_else(|| config.report_path.clone());
            let timelines = commands::report_timeline(&report, learner.as_deref())?;
            print_json(&timelines);
        }
        Commands::Simulate {
            learners,
            questions,
            report,
        } => {
            if let Some(report) = report {
                config.report_path = report;
            }
            let summary = commands::simulate(learners, questions, &config).await?;
            print_json(&summary);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}
