//! Generation JetStream processor
//!
//! Wraps bulk document generation with JetStream for:
//! - Automatic backpressure
//! - Real-time progress updates
//! - Persistence across restarts
//!
//! ## Streams
//! - `CERTFORGE_GENERATE_JOBS` - bulk generation batches

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_nats::jetstream::{self, Context as JsContext};
use async_nats::Client;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::assets::AssetPool;
use crate::services::cancellation::CANCELLATION;
use crate::services::job_history::JOB_HISTORY;
use crate::services::orchestrator::{run_batch, BatchError, BatchInput, ProgressSink};
use crate::services::render::RenderService;
use crate::services::sheet::parse_sheet;
use crate::services::store::RecordStore;
use crate::types::{
    BatchStage, GenerateJobRequest, GenerateJobStatus, GenerateJobStatusUpdate,
    GenerateJobSubmitResponse, Progress, QueuedGenerateJob,
};

// Stream and consumer names
const STREAM_NAME: &str = "CERTFORGE_GENERATE_JOBS";
const CONSUMER_NAME: &str = "generate_workers";
const SUBJECT: &str = "certforge.jobs.generate";
const STATUS_PREFIX: &str = "certforge.job.generate.status";

/// Generation job processor with JetStream integration
pub struct GenerateJobProcessor {
    client: Client,
    js: JsContext,
    store: Arc<dyn RecordStore>,
    renderer: Arc<dyn RenderService>,
    pending_count: AtomicU32,
}

impl GenerateJobProcessor {
    /// Create a new generation processor, initializing the JetStream stream
    pub async fn new(
        client: Client,
        store: Arc<dyn RecordStore>,
        renderer: Arc<dyn RenderService>,
    ) -> Result<Self> {
        let js = jetstream::new(client.clone());

        let stream_config = jetstream::stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![SUBJECT.to_string()],
            max_messages: 500,
            max_bytes: 200 * 1024 * 1024, // payloads carry base64 sheets and logo bundles
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };
        js.get_or_create_stream(stream_config).await?;
        info!("JetStream generation stream '{}' ready", STREAM_NAME);

        Ok(Self {
            client,
            js,
            store,
            renderer,
            pending_count: AtomicU32::new(0),
        })
    }

    /// Submit a generation job to the queue
    pub async fn submit_job(
        &self,
        user_id: Uuid,
        request: GenerateJobRequest,
    ) -> Result<GenerateJobSubmitResponse> {
        let job = QueuedGenerateJob::new(user_id, request);
        let job_id = job.id;
        let sheet_name = job.request.sheet_name.clone();

        let payload = serde_json::to_vec(&job)?;
        self.js.publish(SUBJECT, payload.into()).await?.await?;

        let pending = self.pending_count.fetch_add(1, Ordering::Relaxed) + 1;

        info!(
            "Generation job {} submitted for sheet '{}', position {} in queue",
            job_id, sheet_name, pending
        );

        self.publish_status(job_id, GenerateJobStatus::Queued { position: pending })
            .await?;

        Ok(GenerateJobSubmitResponse {
            job_id,
            position: pending,
            message: "Generation job queued".to_string(),
        })
    }

    /// Publish a generation job status update
    pub async fn publish_status(&self, job_id: Uuid, status: GenerateJobStatus) -> Result<()> {
        let update = GenerateJobStatusUpdate::new(job_id, status);
        let subject = format!("{}.{}", STATUS_PREFIX, job_id);
        let payload = serde_json::to_vec(&update)?;
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    /// Start processing generation jobs from the queue
    pub async fn start_processing(self: Arc<Self>) -> Result<()> {
        let stream = self.js.get_stream(STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            max_deliver: 3,
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(CONSUMER_NAME, consumer_config)
            .await?;
        info!("JetStream generation consumer '{}' ready", CONSUMER_NAME);

        let mut messages = consumer.messages().await?;

        while let Some(msg) = messages.next().await {
            match msg {
                Ok(msg) => {
                    let processor = Arc::clone(&self);

                    // Process one batch at a time to keep the render service
                    // load bounded
                    if let Err(e) = processor.process_job(msg).await {
                        error!("Failed to process generation job: {}", e);
                    }
                }
                Err(e) => {
                    error!("Error receiving generation message: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Process a single generation job
    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let job: QueuedGenerateJob = serde_json::from_slice(&msg.payload)?;
        let job_id = job.id;
        let user_id = job.user_id;
        let started_at = job.submitted_at;
        let kind = job.request.kind;

        info!(
            "Processing generation job {} from sheet '{}'",
            job_id, job.request.sheet_name
        );
        self.pending_count.fetch_sub(1, Ordering::Relaxed);

        // ACK immediately to prevent redelivery during long processing
        if let Err(e) = msg.ack().await {
            error!("Failed to ack generation job {}: {:?}", job_id, e);
        }

        // Pre-cancel check for jobs cancelled while still queued
        if CANCELLATION.is_cancelled(&job_id) {
            CANCELLATION.remove(&job_id);
            self.publish_status(
                job_id,
                GenerateJobStatus::Cancelled {
                    message: "Job cancelled while queued".to_string(),
                },
            )
            .await?;
            JOB_HISTORY.record_cancelled(job_id, kind.as_str(), user_id, started_at, None);
            return Ok(());
        }

        // Registered for the whole run so a cancel request reaches the batch
        let guard = CANCELLATION.register(job_id, user_id);
        let timer = Instant::now();

        self.publish_status(
            job_id,
            GenerateJobStatus::Processing {
                current: 0,
                total: 0,
                stage: BatchStage::ParsingFile,
            },
        )
        .await?;

        let input = match build_input(job.request, user_id) {
            Ok(input) => input,
            Err(message) => {
                warn!("Generation job {} rejected: {}", job_id, message);
                self.publish_status(
                    job_id,
                    GenerateJobStatus::Failed {
                        error: message.clone(),
                        report: None,
                    },
                )
                .await?;
                JOB_HISTORY.record_failed(
                    job_id,
                    kind.as_str(),
                    user_id,
                    started_at,
                    message,
                    None,
                );
                return Ok(());
            }
        };

        let sink = StatusProgressSink {
            client: self.client.clone(),
            job_id,
        };
        let result = run_batch(
            input,
            self.store.as_ref(),
            self.renderer.as_ref(),
            &sink,
            guard.token(),
        )
        .await;
        let duration_ms = timer.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                let filename = output.artifact.filename().to_string();
                let report = output.report;
                let artifact_base64 = BASE64.encode(output.artifact.into_bytes());

                self.publish_status(
                    job_id,
                    GenerateJobStatus::Completed {
                        report: report.clone(),
                        artifact_filename: filename.clone(),
                        artifact_base64,
                        duration_ms,
                    },
                )
                .await?;

                JOB_HISTORY.record_completed(
                    job_id,
                    kind.as_str(),
                    user_id,
                    started_at,
                    Some(report.summary()),
                    serde_json::to_value(&report).ok(),
                    Some(filename),
                );

                info!(
                    "Generation job {} completed in {}ms: {}",
                    job_id,
                    duration_ms,
                    report.summary()
                );
            }
            Err(BatchError::Cancelled { report }) => {
                info!(
                    "Generation job {} cancelled after {} documents",
                    job_id, report.succeeded
                );
                self.publish_status(
                    job_id,
                    GenerateJobStatus::Cancelled {
                        message: "Job cancelled by user".to_string(),
                    },
                )
                .await?;
                JOB_HISTORY.record_cancelled(
                    job_id,
                    kind.as_str(),
                    user_id,
                    started_at,
                    Some(report.summary()),
                );
            }
            Err(e) => {
                warn!("Generation job {} failed: {}", job_id, e);
                let report = e.report().cloned();
                let report_json = report.as_ref().and_then(|r| serde_json::to_value(r).ok());

                self.publish_status(
                    job_id,
                    GenerateJobStatus::Failed {
                        error: e.to_string(),
                        report,
                    },
                )
                .await?;
                JOB_HISTORY.record_failed(
                    job_id,
                    kind.as_str(),
                    user_id,
                    started_at,
                    e.to_string(),
                    report_json,
                );
            }
        }

        drop(guard);
        Ok(())
    }
}

/// Decode and parse the job payload into batch inputs. Any failure here is
/// job-fatal before the first row.
fn build_input(request: GenerateJobRequest, actor_id: Uuid) -> Result<BatchInput, String> {
    let sheet_bytes = BASE64
        .decode(&request.sheet_content_base64)
        .map_err(|e| format!("invalid sheet encoding: {}", e))?;
    let sheet = parse_sheet(&request.sheet_name, &sheet_bytes).map_err(|e| e.to_string())?;

    let assets = match &request.logos_zip_base64 {
        Some(encoded) => {
            let zip_bytes = BASE64
                .decode(encoded)
                .map_err(|e| format!("invalid logo archive encoding: {}", e))?;
            AssetPool::from_zip_bytes(&zip_bytes).map_err(|e| e.to_string())?
        }
        None => AssetPool::default(),
    };

    Ok(BatchInput {
        sheet,
        assets,
        tenant_id: request.tenant_id,
        actor_id,
        kind: request.kind,
        selection: request.field_selection,
        overrides: request.overrides,
    })
}

/// Sink that republishes batch progress as `processing` status updates.
struct StatusProgressSink {
    client: Client,
    job_id: Uuid,
}

#[async_trait]
impl ProgressSink for StatusProgressSink {
    async fn progress(&self, progress: Progress) {
        let status = GenerateJobStatus::Processing {
            current: progress.current,
            total: progress.total,
            stage: progress.stage,
        };
        let update = GenerateJobStatusUpdate::new(self.job_id, status);
        let subject = format!("{}.{}", STATUS_PREFIX, self.job_id);
        match serde_json::to_vec(&update) {
            Ok(payload) => {
                if let Err(e) = self.client.publish(subject, payload.into()).await {
                    warn!("Failed to publish progress for job {}: {}", self.job_id, e);
                }
            }
            Err(e) => warn!("Failed to serialize progress for job {}: {}", self.job_id, e),
        }
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::types::DocumentKind;

    #[test]
    fn test_stream_names() {
        assert_eq!(STREAM_NAME, "CERTFORGE_GENERATE_JOBS");
        assert!(SUBJECT.starts_with("certforge.jobs.generate"));
    }

    #[test]
    fn test_status_prefix() {
        assert!(STATUS_PREFIX.starts_with("certforge.job.generate.status"));
    }

    fn request(sheet_name: &str, content: &[u8]) -> GenerateJobRequest {
        GenerateJobRequest {
            tenant_id: Uuid::new_v4(),
            sheet_name: sheet_name.to_string(),
            sheet_content_base64: BASE64.encode(content),
            logos_zip_base64: None,
            kind: DocumentKind::Draft,
            field_selection: None,
            overrides: HashMap::new(),
        }
    }

    #[test]
    fn test_build_input_decodes_csv_payload() {
        let csv = b"Company Name,ISO Standard\nAcme Ltd,9001:2015\n";
        let input = build_input(request("clients.csv", csv), Uuid::new_v4()).unwrap();

        assert_eq!(input.sheet.rows.len(), 1);
        assert!(input.assets.is_empty());
    }

    #[test]
    fn test_build_input_rejects_bad_base64() {
        let mut req = request("clients.csv", b"x");
        req.sheet_content_base64 = "not base64!!".to_string();

        let err = build_input(req, Uuid::new_v4()).unwrap_err();
        assert!(err.contains("invalid sheet encoding"));
    }

    #[test]
    fn test_build_input_rejects_unparseable_sheet() {
        let err = build_input(request("clients.pdf", b"%PDF-1.4"), Uuid::new_v4()).unwrap_err();
        assert!(err.contains("unsupported sheet format"));
    }

    #[test]
    fn test_build_input_rejects_corrupt_logo_archive() {
        let csv = b"Company Name\nAcme Ltd\n";
        let mut req = request("clients.csv", csv);
        req.logos_zip_base64 = Some(BASE64.encode(b"not a zip"));

        let err = build_input(req, Uuid::new_v4()).unwrap_err();
        assert!(err.contains("asset archive"));
    }
}
