//! Batch entry points behind the `affectmode` binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use affectmode_algo::{
    aggregate, mode_switches, AggregationReport, FrustrationLoop, FrustrationReportRow, Mode,
    ModeTransition,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::affect::{probe_affect_source, SimulatedAffectSource};
use crate::config::Config;
use crate::core::event_bus::EventBus;
use crate::error::EngineError;
use crate::recorder::CsvReportRecorder;
use crate::replay::{replay_log, ReplayOutcome};
use crate::report::{
    append_report_rows, discover_report_files, read_learner_log, read_preferred_modes,
    read_report_files, read_report_rows, write_preferred_modes, AppendSummary, RowRejection,
};
use crate::session::{AnswerInput, SessionEngine};

#[derive(Debug, Serialize)]
pub struct AggregateSummary {
    pub files: Vec<PathBuf>,
    pub rows: usize,
    pub rejected_rows: Vec<RowRejection>,
    pub report: AggregationReport,
}

/// Aggregate explicit report files, or every report file found in `dir`,
/// and overwrite `output` with the preferred modes.
pub fn aggregate_reports(
    inputs: &[PathBuf],
    dir: Option<&Path>,
    output: &Path,
    config: &Config,
) -> Result<AggregateSummary, EngineError> {
    let mut files = inputs.to_vec();
    if let Some(dir) = dir {
        files.extend(discover_report_files(dir)?);
    }
    if files.is_empty() {
        warn!("No frustration report files to aggregate");
    }

    let snapshot = read_report_files(&files)?;
    let report = aggregate(&snapshot.rows, &config.aggregator);
    for learner_error in &report.errors {
        warn!(
            learner_id = %learner_error.learner_id,
            question_id = %learner_error.question_id,
            error = %learner_error.message,
            "Learner skipped during aggregation"
        );
    }
    if report.truncated {
        warn!(
            processed = report.records.len() + report.errors.len(),
            seen = report.learners_seen,
            "Aggregation stopped at the learner limit"
        );
    }

    write_preferred_modes(output, &report.records)?;
    info!(
        files = files.len(),
        rows = snapshot.rows.len(),
        learners = report.records.len(),
        "Aggregation complete"
    );

    Ok(AggregateSummary {
        files,
        rows: snapshot.rows.len(),
        rejected_rows: snapshot.rejected,
        report,
    })
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub log_rejected: Vec<RowRejection>,
    /// Set when the replayed rows were appended to a report file
    pub report: Option<AppendSummary>,
    pub outcome: ReplayOutcome,
}

/// Replay a learner log through the scoring and selection loop.
///
/// With `report`, the replayed rows are appended to that file; questions the
/// file already holds for a learner are left as they are.
pub fn replay_file(
    log: &Path,
    report: Option<&Path>,
    preferred: Option<&Path>,
    config: &Config,
) -> Result<ReplaySummary, EngineError> {
    let history = match preferred {
        Some(path) => read_preferred_modes(path)?,
        None => Default::default(),
    };
    let learner_log = read_learner_log(log)?;
    let frustration_loop = FrustrationLoop::new(config.scoring.clone(), config.selector.clone());
    let outcome = replay_log(&learner_log.entries, &frustration_loop, &history);

    let appended = match report {
        Some(path) => Some(append_report_rows(path, &outcome.rows)?),
        None => None,
    };
    info!(
        questions = outcome.rows.len(),
        switches = outcome.switches.len(),
        rejected = outcome.rejected.len() + learner_log.rejected.len(),
        "Replay complete"
    );

    Ok(ReplaySummary {
        log_rejected: learner_log.rejected,
        report: appended,
        outcome,
    })
}

#[derive(Debug, Serialize)]
pub struct LearnerTimeline {
    pub learner_id: String,
    pub questions: usize,
    pub transitions: Vec<ModeTransition>,
}

/// Mode transitions per learner as recorded in a report file.
pub fn report_timeline(path: &Path, learner: Option<&str>) -> Result<Vec<LearnerTimeline>, EngineError> {
    let snapshot = read_report_rows(path)?;
    let mut by_learner: BTreeMap<String, Vec<FrustrationReportRow>> = BTreeMap::new();
    for row in snapshot.rows {
        if learner.map_or(true, |l| l == row.learner_id) {
            by_learner.entry(row.learner_id.clone()).or_default().push(row);
        }
    }
    Ok(by_learner
        .into_iter()
        .map(|(learner_id, rows)| LearnerTimeline {
            learner_id,
            questions: rows.len(),
            transitions: mode_switches(&rows),
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub learners: usize,
    pub questions: usize,
    pub mode_switches: usize,
    pub final_modes: BTreeMap<String, Mode>,
}

/// Run `learners` concurrent simulated sessions of `questions` each,
/// appending every scored question to the configured report file.
pub async fn simulate(
    learners: usize,
    questions: usize,
    config: &Config,
) -> Result<SimulationSummary, EngineError> {
    let history = read_preferred_modes(&config.preferred_path)?;
    let affect = probe_affect_source(
        None,
        SimulatedAffectSource::seeded(config.affect.simulator_seed),
    );
    let engine = Arc::new(SessionEngine::new(
        config,
        affect,
        Arc::new(CsvReportRecorder::new(&config.report_path)),
        Arc::new(EventBus::new()),
        history,
    ));

    let mut handles = Vec::with_capacity(learners);
    for index in 0..learners {
        let engine = Arc::clone(&engine);
        let seed = config.affect.simulator_seed.wrapping_add(index as u64 + 1);
        handles.push(tokio::spawn(async move {
            run_simulated_learner(engine, format!("SIM{:03}", index + 1), questions, seed).await
        }));
    }

    let mut summary = SimulationSummary {
        learners,
        questions: 0,
        mode_switches: 0,
        final_modes: BTreeMap::new(),
    };
    for handle in handles {
        let (learner_id, answered, switches, mode) = match handle.await {
            Ok(result) => result?,
            Err(join_err) => {
                warn!(error = %join_err, "Simulated learner task failed");
                continue;
            }
        };
        summary.questions += answered;
        summary.mode_switches += switches;
        summary.final_modes.insert(learner_id, mode);
    }

    info!(
        learners = summary.learners,
        questions = summary.questions,
        switches = summary.mode_switches,
        report = %config.report_path.display(),
        "Simulation complete"
    );
    Ok(summary)
}

async fn run_simulated_learner(
    engine: Arc<SessionEngine>,
    learner_id: String,
    questions: usize,
    seed: u64,
) -> Result<(String, usize, usize, Mode), EngineError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    engine.start_session(&learner_id).await?;

    let mut switches = 0;
    for q in 0..questions {
        let outcome = engine
            .answer_question(AnswerInput {
                learner_id: learner_id.clone(),
                question_id: format!("q{}", q + 1),
                correct: rng.gen_bool(0.6),
                skipped: rng.gen_bool(0.05),
                response_latency_ms: rng.gen_range(1_500..=32_000),
                affect_window: None,
            })
            .await?;
        if outcome.decision.switch().is_some() {
            switches += 1;
        }
    }

    let state = engine.end_session(&learner_id).await?;
    Ok((learner_id, questions, switches, state.current_mode))
}
