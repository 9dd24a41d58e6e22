//! Scheduler collaborator contract.
//!
//! The scheduler itself lives outside this subsystem; these are the job
//! types it exchanges and the client trait the resume bridge calls. Every
//! call may fail and callers here treat any failure as "no jobs".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schedule {
    #[serde(rename_all = "camelCase")]
    Cron { expression: String },
    #[serde(rename_all = "camelCase")]
    Fixed { delay_ms: u64, one_time: bool },
    /// One-shot execution at an absolute instant (RFC3339).
    #[serde(rename_all = "camelCase")]
    Reserved { reserved_execution_time: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub content: String,
    pub project_id: String,
    pub base_session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    Skip,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerJob {
    pub id: String,
    pub name: String,
    pub schedule: Schedule,
    pub message: JobMessage,
    pub enabled: bool,
    pub concurrency_policy: ConcurrencyPolicy,
    pub created_at: String,
    pub last_run_at: Option<String>,
    pub last_run_status: Option<JobStatus>,
}

/// A job as submitted; the scheduler assigns id and runtime fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedulerJob {
    pub name: String,
    pub schedule: Schedule,
    pub message: JobMessage,
    pub enabled: bool,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSchedulerJob {
    pub name: Option<String>,
    pub schedule: Option<Schedule>,
    pub message: Option<JobMessage>,
    pub enabled: Option<bool>,
}

#[async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn get_jobs(&self) -> Result<Vec<SchedulerJob>, SchedulerError>;

    async fn add_job(&self, job: NewSchedulerJob) -> Result<SchedulerJob, SchedulerError>;

    async fn update_job(
        &self,
        id: &str,
        update: UpdateSchedulerJob,
    ) -> Result<SchedulerJob, SchedulerError>;
}
