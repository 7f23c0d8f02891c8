//! Batch orchestration
//!
//! Drives one generation batch through its stages: validate every row, then
//! upsert + render each valid row strictly in sheet order, then pack the
//! archive. Row failures are recorded and never abort the batch; the batch
//! itself fails only when nothing can be produced at all.
//!
//! The orchestrator is presentation-free: callers observe it through a
//! [`ProgressSink`] and stop it through a cancellation token checked between
//! rows.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::defaults::NOT_AVAILABLE;
use crate::services::archive::{build_archive, ArchiveError};
use crate::services::assets::AssetPool;
use crate::services::columns::normalize_headers;
use crate::services::render::{DocumentRenderer, RenderService};
use crate::services::sheet::ParsedSheet;
use crate::services::store::RecordStore;
use crate::services::upsert::{EntityUpserter, UpsertError};
use crate::services::validate::validate_row;
use crate::types::{
    Artifact, BatchOutput, BatchReport, BatchStage, CanonicalRecord, DocumentKind, FailureStage,
    FieldKey, FieldSelection, Progress, RenderedDoc,
};

#[derive(Debug, Error)]
pub enum BatchError {
    /// Fetching the tenant's records before the first row failed
    #[error("failed to prepare batch: {0}")]
    Setup(#[source] UpsertError),
    /// Every row failed validation
    #[error("No valid records found to process")]
    NoValidRows { report: BatchReport },
    /// Rows were processed but none produced a document
    #[error("no documents generated")]
    NoDocuments { report: BatchReport },
    /// Documents were rendered but the archive could not be written
    #[error("archive assembly failed after generating {generated} documents: {source}")]
    Archive {
        generated: u32,
        report: BatchReport,
        #[source]
        source: ArchiveError,
    },
    /// The batch was cancelled between rows
    #[error("batch cancelled")]
    Cancelled { report: BatchReport },
}

impl BatchError {
    /// The partial report, when rows were inspected before the failure.
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchError::Setup(_) => None,
            BatchError::NoValidRows { report }
            | BatchError::NoDocuments { report }
            | BatchError::Archive { report, .. }
            | BatchError::Cancelled { report } => Some(report),
        }
    }
}

/// Observer for batch progress. Implementations must not fail; a sink that
/// publishes over the network logs and swallows its own errors.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn progress(&self, progress: Progress);
}

/// Sink that discards progress.
pub struct NullProgressSink;

#[async_trait]
impl ProgressSink for NullProgressSink {
    async fn progress(&self, _progress: Progress) {}
}

/// Everything one batch needs besides its collaborators.
#[derive(Debug)]
pub struct BatchInput {
    pub sheet: ParsedSheet,
    pub assets: AssetPool,
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub kind: DocumentKind,
    pub selection: Option<FieldSelection>,
    pub overrides: HashMap<String, String>,
}

/// Run one batch to completion.
///
/// Returns the report plus deliverable on success. Errors carry the partial
/// report where rows were already inspected.
pub async fn run_batch(
    input: BatchInput,
    store: &dyn RecordStore,
    render_service: &dyn RenderService,
    sink: &dyn ProgressSink,
    cancel: CancellationToken,
) -> Result<BatchOutput, BatchError> {
    let total_rows = input.sheet.rows.len() as u32;
    sink.progress(Progress {
        current: 0,
        total: total_rows,
        stage: BatchStage::ValidatingRows,
    })
    .await;

    let mapping = normalize_headers(&input.sheet.headers);
    let mut valid: Vec<(u32, CanonicalRecord)> = Vec::new();
    let mut invalid: Vec<(u32, String)> = Vec::new();
    for (idx, row) in input.sheet.rows.iter().enumerate() {
        let row_number = idx as u32 + 1;
        let record = validate_row(row, &mapping);
        if record.is_valid {
            valid.push((row_number, record));
        } else {
            invalid.push((row_number, record.errors.join("; ")));
        }
    }
    let valid_total = valid.len() as u32;
    let mut report = BatchReport::new(total_rows, valid_total);
    for (row_number, message) in invalid {
        report.record_skipped(row_number, message);
    }

    if valid.is_empty() {
        warn!(total_rows, "Batch has no valid rows");
        sink.progress(Progress {
            current: 0,
            total: total_rows,
            stage: BatchStage::Failed,
        })
        .await;
        return Err(BatchError::NoValidRows { report });
    }

    let mut upserter = EntityUpserter::load(store, input.tenant_id, input.actor_id)
        .await
        .map_err(BatchError::Setup)?;
    let renderer = DocumentRenderer::new(
        render_service,
        input.kind,
        input.selection,
        input.overrides,
    );

    sink.progress(Progress {
        current: 0,
        total: valid_total,
        stage: BatchStage::ProcessingRows,
    })
    .await;

    let mut docs: Vec<RenderedDoc> = Vec::new();
    for (i, (row_number, record)) in valid.iter().enumerate() {
        if cancel.is_cancelled() {
            report.record_warning(format!(
                "cancelled after {} of {} valid rows",
                i, valid_total
            ));
            info!(processed = i, total = valid_total, "Batch cancelled");
            return Err(BatchError::Cancelled { report });
        }

        match process_row(record, *row_number, &mut upserter, &renderer, &input.assets).await {
            Ok(doc) => {
                docs.push(doc);
                report.succeeded += 1;
            }
            Err(RowError { stage, message }) => {
                warn!(row = row_number, stage = ?stage, error = message, "Row failed");
                report.record_failure(*row_number, stage, message);
            }
        }
        if let Some(warning) = logo_warning(record, &input.assets, *row_number) {
            report.record_warning(warning);
        }

        sink.progress(Progress {
            current: (i + 1) as u32,
            total: valid_total,
            stage: BatchStage::ProcessingRows,
        })
        .await;
    }

    if docs.is_empty() {
        sink.progress(Progress {
            current: valid_total,
            total: valid_total,
            stage: BatchStage::Failed,
        })
        .await;
        return Err(BatchError::NoDocuments { report });
    }

    let artifact = if docs.len() == 1 {
        Artifact::Single(docs.swap_remove(0))
    } else {
        sink.progress(Progress {
            current: valid_total,
            total: valid_total,
            stage: BatchStage::BuildingArchive,
        })
        .await;
        match build_archive(&docs) {
            Ok(bytes) => Artifact::Archive(bytes),
            Err(source) => {
                sink.progress(Progress {
                    current: valid_total,
                    total: valid_total,
                    stage: BatchStage::Failed,
                })
                .await;
                return Err(BatchError::Archive {
                    generated: report.succeeded,
                    report,
                    source,
                });
            }
        }
    };

    sink.progress(Progress {
        current: valid_total,
        total: valid_total,
        stage: BatchStage::Done,
    })
    .await;
    info!(summary = report.summary(), "Batch complete");

    Ok(BatchOutput { report, artifact })
}

struct RowError {
    stage: FailureStage,
    message: String,
}

/// Upsert and render one valid row.
async fn process_row(
    record: &CanonicalRecord,
    row_number: u32,
    upserter: &mut EntityUpserter<'_>,
    renderer: &DocumentRenderer<'_>,
    assets: &AssetPool,
) -> Result<RenderedDoc, RowError> {
    let outcome = upserter.upsert(record).await.map_err(|e| RowError {
        stage: FailureStage::Upsert,
        message: e.to_string(),
    })?;

    let logo = assets.find(record.get(FieldKey::Logo));
    let bytes = renderer
        .render_row(record, outcome.stored_draft.as_ref(), logo)
        .await
        .map_err(|e| RowError {
            stage: FailureStage::Render,
            message: e.to_string(),
        })?;

    Ok(RenderedDoc {
        filename: renderer.output_filename(record),
        bytes,
        row_number,
    })
}

/// Soft warning when a row references a logo no pool asset matches.
fn logo_warning(record: &CanonicalRecord, assets: &AssetPool, row_number: u32) -> Option<String> {
    let reference = record.get(FieldKey::Logo).trim();
    if reference.is_empty() || reference == NOT_AVAILABLE {
        return None;
    }
    if assets.find(reference).is_some() {
        return None;
    }
    Some(format!(
        "row {}: no uploaded asset matches logo \"{}\"",
        row_number, reference
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use parking_lot::Mutex;
    use zip::ZipArchive;

    use crate::services::assets::AssetFile;
    use crate::services::render::MockRenderService;
    use crate::services::sheet::RawRow;
    use crate::services::store::InMemoryRecordStore;

    struct RecordingSink {
        events: Mutex<Vec<Progress>>,
        cancel_at: Option<(u32, CancellationToken)>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                cancel_at: None,
            }
        }

        fn cancelling_after(row: u32, token: CancellationToken) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                cancel_at: Some((row, token)),
            }
        }

        fn events(&self) -> Vec<Progress> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn progress(&self, progress: Progress) {
            if let Some((row, token)) = &self.cancel_at {
                if progress.stage == BatchStage::ProcessingRows && progress.current == *row {
                    token.cancel();
                }
            }
            self.events.lock().push(progress);
        }
    }

    fn sheet(headers: &[&str], rows: &[&[(&str, &str)]]) -> ParsedSheet {
        ParsedSheet {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<RawRow>()
                })
                .collect(),
        }
    }

    fn input(sheet: ParsedSheet) -> BatchInput {
        BatchInput {
            sheet,
            assets: AssetPool::default(),
            tenant_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            kind: DocumentKind::Draft,
            selection: None,
            overrides: HashMap::new(),
        }
    }

    fn archive_names(artifact: &Artifact) -> Vec<String> {
        match artifact {
            Artifact::Archive(bytes) => {
                let archive = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
                let mut names: Vec<String> = archive.file_names().map(String::from).collect();
                names.sort();
                names
            }
            Artifact::Single(doc) => vec![doc.filename.clone()],
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_batch_creates_once_and_skips_blank_row() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sink = RecordingSink::new();
        let sheet = sheet(
            &["Company Name", "ISO Standard"],
            &[
                &[("Company Name", "Acme Ltd"), ("ISO Standard", "9001:2015")],
                &[("Company Name", ""), ("ISO Standard", "9001:2015")],
                &[("Company Name", "Acme Ltd"), ("ISO Standard", "9001:2015")],
            ],
        );

        let output = run_batch(
            input(sheet),
            &store,
            &render,
            &sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let report = &output.report;
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);
        assert!(report.is_balanced());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Validate);
        assert_eq!(report.failures[0].row_number, 2);

        // One create for row 1, one update for row 3, never two creates.
        assert_eq!(store.created_count(), 1);
        assert_eq!(store.updated_count(), 1);

        // Identical sanitized filenames: second entry is row-number suffixed.
        assert_eq!(
            archive_names(&output.artifact),
            vec![
                "Acme_Ltd_9001_draft.pdf".to_string(),
                "Acme_Ltd_9001_draft_3.pdf".to_string(),
            ]
        );

        let events = sink.events();
        assert_eq!(events[0].stage, BatchStage::ValidatingRows);
        assert_eq!(events.last().unwrap().stage, BatchStage::Done);
    }

    #[tokio::test]
    async fn test_logo_matches_case_insensitively() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sheet = sheet(
            &["Company Name", "Logo"],
            &[&[("Company Name", "Acme Ltd"), ("Logo", "logo.png")]],
        );
        let mut input = input(sheet);
        input.assets = AssetPool::new(vec![AssetFile {
            name: "logo.PNG".to_string(),
            bytes: vec![0xFF],
        }]);

        let output = run_batch(
            input,
            &store,
            &render,
            &NullProgressSink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(output.report.warnings.is_empty());
        let calls = render.calls();
        assert_eq!(calls[0].logo.as_deref(), Some("logo.PNG"));
    }

    #[tokio::test]
    async fn test_unmatched_logo_is_a_soft_warning() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sheet = sheet(
            &["Company Name", "Logo"],
            &[&[("Company Name", "Acme Ltd"), ("Logo", "missing.png")]],
        );

        let output = run_batch(
            input(sheet),
            &store,
            &render,
            &NullProgressSink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(output.report.succeeded, 1);
        assert_eq!(output.report.warnings.len(), 1);
        assert!(output.report.warnings[0].contains("missing.png"));
    }

    #[tokio::test]
    async fn test_render_failure_is_row_scoped() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        render.fail_for("Beta Co", "document rendering failed: HTTP 500");
        let sheet = sheet(
            &["Company Name", "ISO Standard"],
            &[
                &[("Company Name", "Acme Ltd"), ("ISO Standard", "ISO 9001")],
                &[("Company Name", "Beta Co"), ("ISO Standard", "ISO 9001")],
                &[("Company Name", "Gamma LLC"), ("ISO Standard", "ISO 9001")],
            ],
        );

        let output = run_batch(
            input(sheet),
            &store,
            &render,
            &NullProgressSink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let report = &output.report;
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(report.is_balanced());
        assert_eq!(report.failures[0].row_number, 2);
        assert_eq!(report.failures[0].stage, FailureStage::Render);
        assert!(report.failures[0].message.contains("HTTP 500"));
        assert_eq!(archive_names(&output.artifact).len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_failure_is_row_scoped() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sheet = sheet(
            &["Company Name"],
            &[&[("Company Name", "Acme Ltd")], &[("Company Name", "Beta Co")]],
        );

        // Both rows hit a rejecting store; the batch fails only because zero
        // documents come out, not at the first row.
        store.set_fail_writes(true);
        let err = run_batch(
            input(sheet),
            &store,
            &render,
            &NullProgressSink,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            BatchError::NoDocuments { report } => {
                assert_eq!(report.failed, 2);
                assert_eq!(report.failures[0].stage, FailureStage::Upsert);
                assert!(report.is_balanced());
            }
            other => panic!("expected NoDocuments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_rows_invalid_fails_with_no_valid_rows() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sink = RecordingSink::new();
        let sheet = sheet(
            &["Company Name"],
            &[&[("Company Name", "")], &[("Company Name", "   ")]],
        );

        let err = run_batch(
            input(sheet),
            &store,
            &render,
            &sink,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "No valid records found to process");
        match err {
            BatchError::NoValidRows { report } => {
                assert_eq!(report.skipped_rows, 2);
                assert_eq!(report.succeeded, 0);
            }
            other => panic!("expected NoValidRows, got {:?}", other),
        }
        assert_eq!(sink.events().last().unwrap().stage, BatchStage::Failed);
    }

    #[tokio::test]
    async fn test_single_document_skips_archive() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sheet = sheet(
            &["Company Name", "ISO Standard"],
            &[&[("Company Name", "Acme Ltd"), ("ISO Standard", "9001:2015")]],
        );

        let output = run_batch(
            input(sheet),
            &store,
            &render,
            &NullProgressSink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        match output.artifact {
            Artifact::Single(doc) => {
                assert_eq!(doc.filename, "Acme_Ltd_9001_draft.pdf");
                assert!(!doc.bytes.is_empty());
            }
            Artifact::Archive(_) => panic!("single document must skip the archive"),
        }
    }

    #[tokio::test]
    async fn test_cancellation_checked_between_rows() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let token = CancellationToken::new();
        let sink = RecordingSink::cancelling_after(1, token.clone());
        let sheet = sheet(
            &["Company Name"],
            &[
                &[("Company Name", "Acme Ltd")],
                &[("Company Name", "Beta Co")],
                &[("Company Name", "Gamma LLC")],
            ],
        );

        let err = run_batch(input(sheet), &store, &render, &sink, token)
            .await
            .unwrap_err();

        match err {
            BatchError::Cancelled { report } => {
                assert_eq!(report.succeeded, 1);
                assert!(report.warnings[0].contains("cancelled after 1 of 3"));
            }
            other => panic!("expected Cancelled, got {:?}", other),
        }
        // Row 1 rendered, rows 2 and 3 never reached the renderer.
        assert_eq!(render.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reported_after_each_row() {
        let store = InMemoryRecordStore::new();
        let render = MockRenderService::new();
        let sink = RecordingSink::new();
        let sheet = sheet(
            &["Company Name"],
            &[&[("Company Name", "Acme Ltd")], &[("Company Name", "Beta Co")]],
        );

        run_batch(
            input(sheet),
            &store,
            &render,
            &sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let rows: Vec<u32> = sink
            .events()
            .iter()
            .filter(|p| p.stage == BatchStage::ProcessingRows)
            .map(|p| p.current)
            .collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }
}
