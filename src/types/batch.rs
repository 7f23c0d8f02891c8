//! Batch pipeline types: stages, progress, per-row outcomes, final report

use serde::{Deserialize, Serialize};

/// Stage of a generation batch, reported alongside progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchStage {
    Idle,
    ParsingFile,
    ValidatingRows,
    ProcessingRows,
    BuildingArchive,
    Done,
    Failed,
}

impl std::fmt::Display for BatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BatchStage::Idle => "Idle",
            BatchStage::ParsingFile => "Parsing file",
            BatchStage::ValidatingRows => "Validating rows",
            BatchStage::ProcessingRows => "Processing rows",
            BatchStage::BuildingArchive => "Building archive",
            BatchStage::Done => "Done",
            BatchStage::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}

/// Progress snapshot delivered after every row and stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    pub stage: BatchStage,
}

/// Pipeline step a row failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Validate,
    Upsert,
    Render,
}

/// One row's failure, recorded without aborting the batch.
///
/// Row numbers are 1-based over the data rows (header row excluded).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub row_number: u32,
    pub stage: FailureStage,
    pub message: String,
}

/// Aggregate outcome of one batch, returned to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total_rows: u32,
    pub valid_rows: u32,
    pub skipped_rows: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub warnings: Vec<String>,
    pub failures: Vec<RowFailure>,
}

impl BatchReport {
    pub fn new(total_rows: u32, valid_rows: u32) -> Self {
        Self {
            total_rows,
            valid_rows,
            skipped_rows: total_rows - valid_rows,
            ..Default::default()
        }
    }

    pub fn record_failure(&mut self, row_number: u32, stage: FailureStage, message: impl Into<String>) {
        self.failed += 1;
        self.failures.push(RowFailure {
            row_number,
            stage,
            message: message.into(),
        });
    }

    /// Detail for a row skipped at validation. Skipped rows are already
    /// counted by `new`, so this does not touch the failed counter.
    pub fn record_skipped(&mut self, row_number: u32, message: impl Into<String>) {
        self.failures.push(RowFailure {
            row_number,
            stage: FailureStage::Validate,
            message: message.into(),
        });
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Accounting invariant: every data row is counted exactly once.
    pub fn is_balanced(&self) -> bool {
        self.succeeded + self.failed + self.skipped_rows == self.total_rows
    }

    pub fn summary(&self) -> String {
        format!(
            "{} generated, {} failed, {} skipped of {} rows",
            self.succeeded, self.failed, self.skipped_rows, self.total_rows
        )
    }
}

/// A successfully rendered document.
#[derive(Debug, Clone)]
pub struct RenderedDoc {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub row_number: u32,
}

/// Default download name for a multi-document batch.
pub const ARCHIVE_FILENAME: &str = "bulk_certificates.zip";

/// Deliverable produced by a successful batch.
#[derive(Debug, Clone)]
pub enum Artifact {
    /// ZIP archive of all rendered documents.
    Archive(Vec<u8>),
    /// Single document returned directly, skipping the archive step.
    Single(RenderedDoc),
}

impl Artifact {
    pub fn filename(&self) -> &str {
        match self {
            Artifact::Archive(_) => ARCHIVE_FILENAME,
            Artifact::Single(doc) => &doc.filename,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Artifact::Archive(bytes) => bytes,
            Artifact::Single(doc) => doc.bytes,
        }
    }
}

/// Report plus deliverable, returned by the orchestrator on success.
#[derive(Debug)]
pub struct BatchOutput {
    pub report: BatchReport,
    pub artifact: Artifact,
}
