//! Rate-limit monitor.
//!
//! Subscribes to session-changed notifications and, whenever the latest
//! transcript entry is a rate-limit notice, asks the resume bridge to
//! schedule a continuation. Every per-event failure is swallowed: a bad
//! event must never tear down the subscription.

use std::sync::Arc;
use std::sync::Mutex;

use tracing::{debug, warn};

use agent_keeper_common::mutex_lock_or_recover;

use crate::config::UserConfigSource;
use crate::events::{SessionChanged, SessionEventBus, SubscriptionHandle};
use crate::resume::{ResumeJobParams, create_rate_limit_resume_job};
use crate::scheduler::SchedulerClient;
use crate::session::{ConversationEntry, SessionSource};

enum MonitorState {
    Inactive,
    Active(SubscriptionHandle),
}

pub struct RateLimitMonitor {
    bus: Arc<SessionEventBus>,
    sessions: Arc<dyn SessionSource>,
    user_config: Arc<dyn UserConfigSource>,
    scheduler: Arc<dyn SchedulerClient>,
    state: Mutex<MonitorState>,
}

impl RateLimitMonitor {
    pub fn new(
        bus: Arc<SessionEventBus>,
        sessions: Arc<dyn SessionSource>,
        user_config: Arc<dyn UserConfigSource>,
        scheduler: Arc<dyn SchedulerClient>,
    ) -> Self {
        Self {
            bus,
            sessions,
            user_config,
            scheduler,
            state: Mutex::new(MonitorState::Inactive),
        }
    }

    /// Begin watching session-changed events. Idempotent: a second call
    /// while active changes nothing, so events are never handled twice.
    ///
    /// Must be called from within a tokio runtime; event handling runs as
    /// detached tasks on it.
    pub fn start_monitoring(&self) {
        let mut state = mutex_lock_or_recover(&self.state);
        if matches!(*state, MonitorState::Active(_)) {
            return;
        }

        let sessions = Arc::clone(&self.sessions);
        let user_config = Arc::clone(&self.user_config);
        let scheduler = Arc::clone(&self.scheduler);

        let handle = self.bus.subscribe(Arc::new(move |event| {
            // Detach so the emitter never waits on session reads or
            // scheduler calls.
            tokio::spawn(handle_session_changed(
                Arc::clone(&sessions),
                Arc::clone(&user_config),
                Arc::clone(&scheduler),
                event,
            ));
        }));

        *state = MonitorState::Active(handle);
    }

    /// Stop watching. Idempotent. Events emitted after this spawn no
    /// handlers; a handler already in flight runs to completion.
    pub fn stop_monitoring(&self) {
        let mut state = mutex_lock_or_recover(&self.state);
        if let MonitorState::Active(handle) = std::mem::replace(&mut *state, MonitorState::Inactive)
        {
            self.bus.unsubscribe(&handle);
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            *mutex_lock_or_recover(&self.state),
            MonitorState::Active(_)
        )
    }
}

impl Drop for RateLimitMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

async fn handle_session_changed(
    sessions: Arc<dyn SessionSource>,
    user_config: Arc<dyn UserConfigSource>,
    scheduler: Arc<dyn SchedulerClient>,
    event: SessionChanged,
) {
    let session = match sessions
        .get_session(&event.project_id, &event.session_id)
        .await
    {
        Ok(session) => session,
        Err(err) => {
            // The session may simply not exist on disk yet
            debug!(
                project_id = %event.project_id,
                session_id = %event.session_id,
                error = %err,
                "session fetch failed, skipping event"
            );
            return;
        }
    };

    let Some(ConversationEntry::Assistant(entry)) = session.conversations.last() else {
        return;
    };

    if crate::rate_limit::parse_rate_limit_message(entry).is_none() {
        return;
    }

    let config = user_config.user_config().await;

    // The bridge owns the enabled check; we only pass the flag through.
    let job = create_rate_limit_resume_job(
        scheduler.as_ref(),
        ResumeJobParams {
            entry,
            session_id: &event.session_id,
            project_id: &event.project_id,
            auto_resume_enabled: config.auto_resume_on_rate_limit,
        },
    )
    .await;

    match job {
        Some(job) => debug!(job_id = %job.id, session_id = %event.session_id, "resume job upserted"),
        None => warn!(session_id = %event.session_id, "rate limit seen but no resume job created"),
    }
}
