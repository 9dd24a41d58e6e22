//! In-memory scheduler with switchable failure modes and call counters.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use agent_keeper_common::mutex_lock_or_recover;

use crate::error::SchedulerError;
use crate::scheduler::{
    ConcurrencyPolicy, NewSchedulerJob, SchedulerClient, SchedulerJob, UpdateSchedulerJob,
};

#[derive(Default)]
pub struct MockScheduler {
    jobs: Mutex<Vec<SchedulerJob>>,
    fail_gets: AtomicBool,
    fail_adds: AtomicBool,
    fail_updates: AtomicBool,
    get_count: AtomicUsize,
    add_count: AtomicUsize,
    update_count: AtomicUsize,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All operations fail until [`MockScheduler::heal`] is called.
    pub fn failing(self) -> Self {
        self.fail_all();
        self
    }

    pub fn fail_all(&self) {
        self.fail_gets.store(true, Ordering::SeqCst);
        self.fail_adds.store(true, Ordering::SeqCst);
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_gets.store(false, Ordering::SeqCst);
        self.fail_adds.store(false, Ordering::SeqCst);
        self.fail_updates.store(false, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.add_count.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    fn unavailable() -> SchedulerError {
        SchedulerError::Unavailable("mock failure".to_string())
    }
}

#[async_trait]
impl SchedulerClient for MockScheduler {
    async fn get_jobs(&self) -> Result<Vec<SchedulerJob>, SchedulerError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(mutex_lock_or_recover(&self.jobs).clone())
    }

    async fn add_job(&self, job: NewSchedulerJob) -> Result<SchedulerJob, SchedulerError> {
        self.add_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_adds.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let job = SchedulerJob {
            id: Uuid::new_v4().to_string(),
            name: job.name,
            schedule: job.schedule,
            message: job.message,
            enabled: job.enabled,
            concurrency_policy: ConcurrencyPolicy::Skip,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            last_run_at: None,
            last_run_status: None,
        };
        mutex_lock_or_recover(&self.jobs).push(job.clone());
        Ok(job)
    }

    async fn update_job(
        &self,
        id: &str,
        update: UpdateSchedulerJob,
    ) -> Result<SchedulerJob, SchedulerError> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let mut jobs = mutex_lock_or_recover(&self.jobs);
        let job = jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))?;

        if let Some(name) = update.name {
            job.name = name;
        }
        if let Some(schedule) = update.schedule {
            job.schedule = schedule;
        }
        if let Some(message) = update.message {
            job.message = message;
        }
        if let Some(enabled) = update.enabled {
            job.enabled = enabled;
        }

        Ok(job.clone())
    }
}
