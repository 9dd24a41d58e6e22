//! Create-or-update of the scheduled resume job for a rate-limited session.
//!
//! Best-effort bridge between the monitor and the scheduler: when anything
//! here fails — flag disabled, message unparsable, scheduler unreachable —
//! the answer is `None`, never an error. A failure at this layer must not
//! destabilize the monitor.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::rate_limit::{calculate_resume_datetime, parse_rate_limit_message};
use crate::scheduler::{
    JobMessage, NewSchedulerJob, Schedule, SchedulerClient, SchedulerJob, UpdateSchedulerJob,
};
use crate::session::AssistantEntry;

/// Substring marking a job as the auto-resume job for its session. Job
/// identity is this marker plus `message.base_session_id`; the scheduler
/// itself does not enforce uniqueness.
pub const RESUME_JOB_MARKER: &str = "Auto-resume";

/// Message content that triggers a session continuation when the job runs.
pub const RESUME_MESSAGE_CONTENT: &str = "continue";

#[derive(Debug, Clone)]
pub struct ResumeJobParams<'a> {
    pub entry: &'a AssistantEntry,
    pub session_id: &'a str,
    pub project_id: &'a str,
    pub auto_resume_enabled: bool,
}

/// Upsert the resume job for `params.session_id`, scheduled for one minute
/// past the rate-limit reset. At most one live resume job exists per
/// session: an existing job is rescheduled in place.
pub async fn create_rate_limit_resume_job(
    scheduler: &dyn SchedulerClient,
    params: ResumeJobParams<'_>,
) -> Option<SchedulerJob> {
    create_rate_limit_resume_job_at(scheduler, params, Utc::now()).await
}

/// Same as [`create_rate_limit_resume_job`] with an explicit clock.
pub async fn create_rate_limit_resume_job_at(
    scheduler: &dyn SchedulerClient,
    params: ResumeJobParams<'_>,
    now: DateTime<Utc>,
) -> Option<SchedulerJob> {
    if !params.auto_resume_enabled {
        debug!(session_id = params.session_id, "auto-resume disabled");
        return None;
    }

    let reset_token = parse_rate_limit_message(params.entry)?;
    let resume_at = calculate_resume_datetime(&reset_token, now)?;
    let resume_at = resume_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    let schedule = Schedule::Reserved {
        reserved_execution_time: resume_at.clone(),
    };

    let existing_jobs = match scheduler.get_jobs().await {
        Ok(jobs) => jobs,
        Err(err) => {
            warn!(error = %err, "Failed to list scheduler jobs");
            Vec::new()
        }
    };

    let existing = existing_jobs.iter().find(|job| {
        job.message.base_session_id.as_deref() == Some(params.session_id)
            && job.name.contains(RESUME_JOB_MARKER)
    });

    if let Some(existing) = existing {
        let update = UpdateSchedulerJob {
            schedule: Some(schedule.clone()),
            ..UpdateSchedulerJob::default()
        };
        match scheduler.update_job(&existing.id, update).await {
            Ok(updated) => return Some(updated),
            Err(err) => {
                // The job may have been deleted since we listed; fall
                // through and create a fresh one.
                warn!(job_id = %existing.id, error = %err, "Failed to update resume job");
            }
        }
    }

    let new_job = NewSchedulerJob {
        name: format!("{RESUME_JOB_MARKER}: {}", params.session_id),
        schedule,
        message: JobMessage {
            content: RESUME_MESSAGE_CONTENT.to_string(),
            project_id: params.project_id.to_string(),
            base_session_id: Some(params.session_id.to_string()),
        },
        enabled: true,
    };

    match scheduler.add_job(new_job).await {
        Ok(job) => {
            debug!(session_id = params.session_id, resume_at = %resume_at, "scheduled resume job");
            Some(job)
        }
        Err(err) => {
            warn!(session_id = params.session_id, error = %err, "Failed to create resume job");
            None
        }
    }
}
