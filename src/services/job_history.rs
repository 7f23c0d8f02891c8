#![allow(dead_code)]
//! Generation job history
//!
//! Keeps the most recent batch outcomes in memory with file-backed
//! persistence so history survives worker restarts.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const MAX_HISTORY_SIZE: usize = 100;
const HISTORY_FILE: &str = "logs/job-history.json";

/// One finished generation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Document kind rendered, `draft` or `softCopy`
    pub kind: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_filename: Option<String>,
}

/// Response for listing job history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHistoryResponse {
    pub jobs: Vec<JobHistoryEntry>,
    pub total: usize,
}

/// History storage backed by an in-memory deque + JSON file on disk.
pub struct JobHistoryService {
    history: Arc<RwLock<VecDeque<JobHistoryEntry>>>,
}

impl JobHistoryService {
    pub fn new() -> Self {
        let mut deque = VecDeque::with_capacity(MAX_HISTORY_SIZE);
        if let Some(loaded) = Self::load_from_disk() {
            for entry in loaded {
                deque.push_back(entry);
            }
            info!("Loaded {} job history entries from disk", deque.len());
        }
        Self {
            history: Arc::new(RwLock::new(deque)),
        }
    }

    /// Record a batch that produced its deliverable.
    #[allow(clippy::too_many_arguments)]
    pub fn record_completed(
        &self,
        id: Uuid,
        kind: &str,
        user_id: Uuid,
        started_at: DateTime<Utc>,
        details: Option<String>,
        report: Option<serde_json::Value>,
        artifact_filename: Option<String>,
    ) {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds() as u64;

        self.add_entry(JobHistoryEntry {
            id,
            user_id,
            kind: kind.to_string(),
            status: "completed".to_string(),
            started_at,
            completed_at,
            duration_ms,
            error: None,
            details,
            report,
            artifact_filename,
        });
    }

    /// Record a failed batch. Carries the partial report when rows were
    /// already inspected before the failure.
    pub fn record_failed(
        &self,
        id: Uuid,
        kind: &str,
        user_id: Uuid,
        started_at: DateTime<Utc>,
        error: String,
        report: Option<serde_json::Value>,
    ) {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds() as u64;

        self.add_entry(JobHistoryEntry {
            id,
            user_id,
            kind: kind.to_string(),
            status: "failed".to_string(),
            started_at,
            completed_at,
            duration_ms,
            error: Some(error),
            details: None,
            report,
            artifact_filename: None,
        });
    }

    /// Record a cancelled batch
    pub fn record_cancelled(
        &self,
        id: Uuid,
        kind: &str,
        user_id: Uuid,
        started_at: DateTime<Utc>,
        details: Option<String>,
    ) {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds() as u64;

        self.add_entry(JobHistoryEntry {
            id,
            user_id,
            kind: kind.to_string(),
            status: "cancelled".to_string(),
            started_at,
            completed_at,
            duration_ms,
            error: None,
            details,
            report: None,
            artifact_filename: None,
        });
    }

    fn add_entry(&self, entry: JobHistoryEntry) {
        let mut history = self.history.write();

        if history.len() >= MAX_HISTORY_SIZE {
            history.pop_back();
        }

        history.push_front(entry);

        Self::save_to_disk(&history);
    }

    /// Recent history across all users (admin surface)
    pub fn get_recent(&self, limit: usize) -> JobHistoryResponse {
        let history = self.history.read();
        let jobs: Vec<JobHistoryEntry> = history.iter().take(limit).cloned().collect();
        let total = history.len();

        JobHistoryResponse { jobs, total }
    }

    /// Recent history for one user (multi-tenant safe)
    pub fn get_recent_for_user(&self, user_id: Uuid, limit: usize) -> JobHistoryResponse {
        let history = self.history.read();
        let jobs: Vec<JobHistoryEntry> = history
            .iter()
            .filter(|j| j.user_id == user_id)
            .take(limit)
            .cloned()
            .collect();
        let total = jobs.len();

        JobHistoryResponse { jobs, total }
    }

    /// One user's history filtered by document kind
    pub fn get_by_kind(&self, user_id: Uuid, kind: &str, limit: usize) -> JobHistoryResponse {
        let history = self.history.read();
        let jobs: Vec<JobHistoryEntry> = history
            .iter()
            .filter(|j| j.user_id == user_id && j.kind == kind)
            .take(limit)
            .cloned()
            .collect();
        let total = jobs.len();

        JobHistoryResponse { jobs, total }
    }

    /// One user's history filtered by outcome status
    pub fn get_by_status(&self, user_id: Uuid, status: &str, limit: usize) -> JobHistoryResponse {
        let history = self.history.read();
        let jobs: Vec<JobHistoryEntry> = history
            .iter()
            .filter(|j| j.user_id == user_id && j.status == status)
            .take(limit)
            .cloned()
            .collect();
        let total = jobs.len();

        JobHistoryResponse { jobs, total }
    }

    fn load_from_disk() -> Option<Vec<JobHistoryEntry>> {
        let path = Path::new(HISTORY_FILE);
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<JobHistoryEntry>>(&content) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Failed to parse job history file: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read job history file: {}", e);
                None
            }
        }
    }

    fn save_to_disk(history: &VecDeque<JobHistoryEntry>) {
        let path = Path::new(HISTORY_FILE);
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create job history directory: {}", e);
                return;
            }
        }
        let entries: Vec<&JobHistoryEntry> = history.iter().collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!("Failed to write job history file: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize job history: {}", e),
        }
    }
}

impl Default for JobHistoryService {
    fn default() -> Self {
        Self::new()
    }
}

/// Global instance for easy access
pub static JOB_HISTORY: Lazy<JobHistoryService> = Lazy::new(JobHistoryService::new);

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: empty service that skips the disk load
    fn fresh_service() -> JobHistoryService {
        JobHistoryService {
            history: Arc::new(RwLock::new(VecDeque::with_capacity(MAX_HISTORY_SIZE))),
        }
    }

    #[test]
    fn test_record_completed_batch_with_report() {
        let service = fresh_service();
        let id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let started_at = Utc::now() - chrono::Duration::seconds(5);
        let report = serde_json::json!({ "totalRows": 10, "succeeded": 9 });

        service.record_completed(
            id,
            "draft",
            user_id,
            started_at,
            Some("9 generated, 0 failed, 1 skipped of 10 rows".to_string()),
            Some(report.clone()),
            Some("bulk_certificates.zip".to_string()),
        );

        let history = service.get_recent(10);
        assert_eq!(history.jobs.len(), 1);
        assert_eq!(history.jobs[0].id, id);
        assert_eq!(history.jobs[0].status, "completed");
        assert_eq!(history.jobs[0].user_id, user_id);
        assert_eq!(history.jobs[0].report, Some(report));
        assert_eq!(
            history.jobs[0].artifact_filename.as_deref(),
            Some("bulk_certificates.zip")
        );
    }

    #[test]
    fn test_record_failed_batch_keeps_partial_report() {
        let service = fresh_service();
        let started_at = Utc::now();
        let report = serde_json::json!({ "totalRows": 3, "skippedRows": 3 });

        service.record_failed(
            Uuid::new_v4(),
            "softCopy",
            Uuid::new_v4(),
            started_at,
            "No valid records found to process".to_string(),
            Some(report.clone()),
        );

        let history = service.get_recent(10);
        assert_eq!(history.jobs[0].status, "failed");
        assert_eq!(
            history.jobs[0].error.as_deref(),
            Some("No valid records found to process")
        );
        assert_eq!(history.jobs[0].report, Some(report));
    }

    #[test]
    fn test_history_capped_at_limit() {
        let service = fresh_service();
        let user_id = Uuid::new_v4();

        for i in 0..150 {
            service.record_completed(
                Uuid::new_v4(),
                "draft",
                user_id,
                Utc::now(),
                Some(format!("Batch {}", i)),
                None,
                None,
            );
        }

        let history = service.get_recent(200);
        assert_eq!(history.jobs.len(), MAX_HISTORY_SIZE);
    }

    #[test]
    fn test_get_by_kind_filters() {
        let service = fresh_service();
        let user_id = Uuid::new_v4();

        service.record_completed(Uuid::new_v4(), "draft", user_id, Utc::now(), None, None, None);
        service.record_completed(
            Uuid::new_v4(),
            "softCopy",
            user_id,
            Utc::now(),
            None,
            None,
            None,
        );
        service.record_completed(Uuid::new_v4(), "draft", user_id, Utc::now(), None, None, None);
        service.record_completed(
            Uuid::new_v4(),
            "draft",
            Uuid::new_v4(),
            Utc::now(),
            None,
            None,
            None,
        );

        let drafts = service.get_by_kind(user_id, "draft", 10);
        assert_eq!(drafts.jobs.len(), 2);
    }

    #[test]
    fn test_record_cancelled_appears_in_history() {
        let service = fresh_service();
        let id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let started_at = Utc::now() - chrono::Duration::seconds(3);

        service.record_cancelled(
            id,
            "draft",
            user_id,
            started_at,
            Some("cancelled after 4 of 9 valid rows".to_string()),
        );

        let history = service.get_recent(10);
        assert_eq!(history.jobs.len(), 1);
        assert_eq!(history.jobs[0].id, id);
        assert_eq!(history.jobs[0].status, "cancelled");
        assert!(history.jobs[0].error.is_none());
    }

    #[test]
    fn test_get_recent_for_user_isolates_users() {
        let service = fresh_service();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        service.record_completed(Uuid::new_v4(), "draft", user_a, Utc::now(), None, None, None);
        service.record_completed(
            Uuid::new_v4(),
            "softCopy",
            user_b,
            Utc::now(),
            None,
            None,
            None,
        );
        service.record_completed(Uuid::new_v4(), "draft", user_a, Utc::now(), None, None, None);
        service.record_cancelled(Uuid::new_v4(), "draft", user_b, Utc::now(), None);

        let history_a = service.get_recent_for_user(user_a, 50);
        assert_eq!(history_a.jobs.len(), 2);
        assert!(history_a.jobs.iter().all(|j| j.user_id == user_a));

        let history_b = service.get_recent_for_user(user_b, 50);
        assert_eq!(history_b.jobs.len(), 2);
        assert!(history_b.jobs.iter().all(|j| j.user_id == user_b));
    }
}
