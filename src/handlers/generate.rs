//! NATS handlers for bulk generation jobs
//!
//! Submission goes through the JetStream processor; cancel and history are
//! served directly from the in-process registries.

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use futures::StreamExt;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::cancellation::{CancelError, CANCELLATION};
use crate::services::job_history::{JobHistoryResponse, JOB_HISTORY};
use crate::services::job_processor::GenerateJobProcessor;
use crate::types::{
    CancelGenerateRequest, ErrorResponse, GenerateJobRequest, JobActionResponse, Request,
    SuccessResponse,
};

/// Handle generate.submit requests
pub async fn handle_generate_submit(
    client: Client,
    mut subscriber: async_nats::Subscriber,
    processor: Arc<GenerateJobProcessor>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<GenerateJobRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse generate submit request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let user_id = match request.user_id {
            Some(uid) => uid,
            None => {
                let error =
                    ErrorResponse::new(request.id, "UNAUTHORIZED", "user_id required".to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match processor.submit_job(user_id, request.payload).await {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                error!("Failed to submit generation job: {}", e);
                let error = ErrorResponse::new(request.id, "SUBMIT_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle generate.cancel requests
pub async fn handle_generate_cancel(
    client: Client,
    mut subscriber: async_nats::Subscriber,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<CancelGenerateRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse cancel request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let job_id = request.payload.job_id;
        // Gateway-stamped identity wins over the payload copy
        let caller = request.user_id.unwrap_or(request.payload.user_id);

        info!("Cancel requested for generation job {} by {}", job_id, caller);

        match apply_cancel(job_id, caller) {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(CancelError::NotOwner) => {
                let error = ErrorResponse::new(
                    request.id,
                    "FORBIDDEN",
                    "Only the submitting operator can cancel a job".to_string(),
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Flip the job's token if it is running, or park a cancelled token so the
/// processor drops the job when it is picked up from the queue.
fn apply_cancel(job_id: Uuid, caller: Uuid) -> Result<JobActionResponse, CancelError> {
    match CANCELLATION.cancel(&job_id, caller)? {
        true => Ok(JobActionResponse {
            success: true,
            message: "Job cancellation requested".to_string(),
            job_id,
        }),
        false => {
            CANCELLATION.pre_cancel(job_id, caller);
            Ok(JobActionResponse {
                success: true,
                message: "Job marked for cancellation".to_string(),
                job_id,
            })
        }
    }
}

// ==========================================================================
// Job History Handler
// ==========================================================================

/// Request to list generation history
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGenerateHistoryRequest {
    pub limit: Option<usize>,
    pub kind: Option<String>,
    pub status: Option<String>,
}

/// Handle generate.history requests
pub async fn handle_generate_history(
    client: Client,
    mut subscriber: async_nats::Subscriber,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<ListGenerateHistoryRequest> =
            match serde_json::from_slice(&msg.payload) {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to parse history request: {}", e);
                    let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                    continue;
                }
            };

        let user_id = match request.user_id {
            Some(uid) => uid,
            None => {
                let error =
                    ErrorResponse::new(request.id, "UNAUTHORIZED", "user_id required".to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let limit = request.payload.limit.unwrap_or(50);

        let history: JobHistoryResponse = match (&request.payload.kind, &request.payload.status) {
            (Some(kind), _) => JOB_HISTORY.get_by_kind(user_id, kind, limit),
            (_, Some(status)) => JOB_HISTORY.get_by_status(user_id, status, limit),
            _ => JOB_HISTORY.get_recent_for_user(user_id, limit),
        };

        let success = SuccessResponse::new(request.id, history);
        let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
    }

    Ok(())
}

// ==========================================================================
// Tests
// ==========================================================================
