use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use affectmode_algo::QuestionEvent;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::SessionRecorder;
use crate::error::RecorderError;
use crate::report::{row_from_event, write_row, REPORT_COLUMNS};

/// Appends one frustration report row per event.
///
/// The header is written when the file is new or empty. Appends from all
/// sessions are serialized through one lock, so rows for a learner land in
/// the order their questions were answered.
pub struct CsvReportRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvReportRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_row(&self, event: &QuestionEvent) -> Result<(), RecorderError> {
        let _guard = self.lock.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(REPORT_COLUMNS)?;
        }

        write_row(&mut writer, &row_from_event(event))?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl SessionRecorder for CsvReportRecorder {
    async fn append(&self, event: &QuestionEvent) -> Result<(), RecorderError> {
        self.append_row(event)
    }
}
