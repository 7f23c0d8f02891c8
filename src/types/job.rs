//! Generation job types for JetStream-based async processing
//!
//! These types support the JetStream job queue for bulk document generation:
//! submission envelopes, tagged status updates, and cancel/history requests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::{BatchReport, BatchStage};
use super::options::{DocumentKind, FieldSelection};

// ==========================================================================
// Tests First (TDD)
// ==========================================================================


// ==========================================================================
// Generation Job Types
// ==========================================================================

/// Request to generate documents from an uploaded sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateJobRequest {
    /// Tenant the generated records belong to
    pub tenant_id: Uuid,
    /// Original sheet filename; the extension selects the parser
    pub sheet_name: String,
    /// Sheet bytes, base64-encoded
    pub sheet_content_base64: String,
    /// Optional ZIP with logo assets, base64-encoded
    #[serde(default)]
    pub logos_zip_base64: Option<String>,
    /// Document profile to render
    #[serde(default)]
    pub kind: DocumentKind,
    /// Which optional fields to include; defaults per kind when absent
    #[serde(default)]
    pub field_selection: Option<FieldSelection>,
    /// Operator overrides keyed by display label
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

/// Status of a generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GenerateJobStatus {
    /// Job is waiting in queue
    #[serde(rename_all = "camelCase")]
    Queued { position: u32 },
    /// Job is being processed
    #[serde(rename_all = "camelCase")]
    Processing {
        /// Rows finished so far
        current: u32,
        /// Total valid rows
        total: u32,
        /// Current pipeline stage
        stage: BatchStage,
    },
    /// Job completed; artifact delivered inline
    #[serde(rename_all = "camelCase")]
    Completed {
        report: BatchReport,
        artifact_filename: String,
        /// ZIP (or single document) bytes, base64-encoded
        artifact_base64: String,
        duration_ms: u64,
    },
    /// Job failed entirely
    #[serde(rename_all = "camelCase")]
    Failed {
        error: String,
        /// Partial report when rows were inspected before the failure
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<BatchReport>,
    },
    /// Job cancelled by its owner
    #[serde(rename_all = "camelCase")]
    Cancelled { message: String },
}

/// A queued generation job in JetStream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedGenerateJob {
    /// Unique job ID
    pub id: Uuid,
    /// User who submitted the job
    pub user_id: Uuid,
    /// When the job was submitted
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    /// The generation request
    pub request: GenerateJobRequest,
}

impl QueuedGenerateJob {
    pub fn new(user_id: Uuid, request: GenerateJobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            submitted_at: chrono::Utc::now(),
            request,
        }
    }
}

/// Status update published on the job's status subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateJobStatusUpdate {
    pub job_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub status: GenerateJobStatus,
}

impl GenerateJobStatusUpdate {
    pub fn new(job_id: Uuid, status: GenerateJobStatus) -> Self {
        Self {
            job_id,
            timestamp: chrono::Utc::now(),
            status,
        }
    }
}

/// Response when a generation job is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateJobSubmitResponse {
    pub job_id: Uuid,
    pub position: u32,
    pub message: String,
}

/// Request to cancel a queued or running job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelGenerateRequest {
    pub job_id: Uuid,
    pub user_id: Uuid,
}

/// Result of a cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobActionResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Uuid,
}
