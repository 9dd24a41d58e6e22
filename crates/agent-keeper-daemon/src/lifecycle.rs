//! Session-lifecycle boundary.
//!
//! Spawning and aborting agent processes is owned by an external service;
//! [`SessionLifecycle`] is its contract. The two helpers here are the
//! PID-tracking steps that service performs around a spawn and an abort,
//! wired through the detection service and the PID repository.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::LifecycleError;
use crate::pid_repository::{PidMetadata, PidStore, ProcessRecord};
use crate::process::{DetectionHint, NewProcessMatcher, ProcessDetector, ProcessEntry};

/// Contract of the external process-lifecycle service.
#[async_trait]
pub trait SessionLifecycle: Send + Sync {
    /// Start a new agent process for a session, tracking its PID.
    async fn start_session(
        &self,
        project_id: &str,
        session_process_id: &str,
    ) -> Result<(), LifecycleError>;

    /// Continue an existing session with a follow-up message.
    async fn continue_session(
        &self,
        project_id: &str,
        session_process_id: &str,
        message: &str,
    ) -> Result<(), LifecycleError>;

    /// Abort the session's process, best effort.
    async fn abort_session(&self, session_process_id: &str) -> Result<(), LifecycleError>;
}

/// Everything needed to attribute a newly spawned process to a session.
#[derive(Debug, Clone)]
pub struct SpawnContext<'a> {
    pub session_process_id: &'a str,
    pub project_id: &'a str,
    pub cwd: &'a str,
    pub command_pattern: &'a str,
}

/// Post-spawn step: snapshot the process table again, diff it against the
/// pre-spawn snapshot, and persist the detected PID.
///
/// Returns `None` when no new matching process can be found or the record
/// cannot be persisted — the session then runs untracked and a later abort
/// degrades to a no-op instead of failing the lifecycle.
pub async fn track_spawned_process(
    detector: &dyn ProcessDetector,
    matcher: &dyn NewProcessMatcher,
    pids: &dyn PidStore,
    before: &[ProcessEntry],
    ctx: SpawnContext<'_>,
) -> Option<ProcessRecord> {
    let after = match detector.current_process_list().await {
        Ok(after) => after,
        Err(err) => {
            warn!(error = %err, "process listing failed after spawn");
            return None;
        }
    };

    let hint = DetectionHint {
        cwd: ctx.cwd,
        command_pattern: ctx.command_pattern,
    };
    let Some(pid) = matcher.detect(before, &after, &hint) else {
        warn!(
            session_process_id = ctx.session_process_id,
            "no new agent process detected"
        );
        return None;
    };

    match pids
        .save_pid(
            ctx.session_process_id,
            pid,
            PidMetadata {
                project_id: ctx.project_id.to_string(),
                cwd: ctx.cwd.to_string(),
            },
        )
        .await
    {
        Ok(record) => {
            debug!(session_process_id = ctx.session_process_id, pid, "tracking agent process");
            Some(record)
        }
        Err(err) => {
            warn!(error = %err, "failed to persist PID record");
            None
        }
    }
}

/// Abort-time step: look up the tracked PID, signal it if still alive, and
/// drop the record either way.
///
/// Termination is fire-and-confirm-later: a true result from the signal
/// only means delivery, so callers that must see the process gone re-poll
/// [`ProcessDetector::is_alive`]. Returns the removed record, or `None` if
/// the session had no tracked process.
pub async fn release_tracked_process(
    detector: &dyn ProcessDetector,
    pids: &dyn PidStore,
    session_process_id: &str,
) -> Option<ProcessRecord> {
    let record = pids.get_pid(session_process_id).await?;

    if detector.is_alive(record.pid).await {
        if !detector.terminate(record.pid).await {
            warn!(pid = record.pid, "termination signal not accepted");
        }
    } else {
        debug!(pid = record.pid, "tracked process already gone");
    }

    match pids.remove_pid(session_process_id).await {
        Ok(removed) => removed,
        Err(err) => {
            warn!(error = %err, "failed to remove PID record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid_repository::FilePidRepository;
    use crate::process::CwdThenHighestPidMatcher;
    use crate::test_support::MockProcessDetector;

    fn ctx<'a>() -> SpawnContext<'a> {
        SpawnContext {
            session_process_id: "s1",
            project_id: "p1",
            cwd: "/work/p1",
            command_pattern: "sleep",
        }
    }

    fn entry(pid: u32, command: &str) -> ProcessEntry {
        ProcessEntry {
            pid,
            command: command.to_string(),
        }
    }

    #[tokio::test]
    async fn test_track_then_release_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pids = FilePidRepository::new(dir.path().join("processes.json"));
        let detector = MockProcessDetector::new();

        let before = vec![entry(1000, "existing")];
        detector.set_process_list(vec![entry(1000, "existing"), entry(1002, "sleep 30")]);

        let record = track_spawned_process(&detector, &CwdThenHighestPidMatcher, &pids, &before, ctx())
            .await
            .unwrap();
        assert_eq!(record.pid, 1002);
        assert_eq!(pids.get_pid("s1").await.unwrap().pid, 1002);

        // Process already exited: release must still clean up, no signal
        let removed = release_tracked_process(&detector, &pids, "s1")
            .await
            .unwrap();
        assert_eq!(removed.pid, 1002);
        assert!(pids.get_pid("s1").await.is_none());
        assert!(pids.get_all_pids().await.is_empty());
        assert!(detector.terminated().is_empty());
    }

    #[tokio::test]
    async fn test_release_signals_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let pids = FilePidRepository::new(dir.path().join("processes.json"));
        let detector = MockProcessDetector::new();

        pids.save_pid(
            "s1",
            4242,
            PidMetadata {
                project_id: "p1".to_string(),
                cwd: "/work/p1".to_string(),
            },
        )
        .await
        .unwrap();
        detector.mark_alive(4242);

        let removed = release_tracked_process(&detector, &pids, "s1")
            .await
            .unwrap();

        assert_eq!(removed.pid, 4242);
        assert_eq!(detector.terminated(), vec![4242]);
        assert!(pids.get_pid("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_release_removes_record_even_if_signal_refused() {
        let dir = tempfile::tempdir().unwrap();
        let pids = FilePidRepository::new(dir.path().join("processes.json"));
        let detector = MockProcessDetector::new();

        pids.save_pid(
            "s1",
            4242,
            PidMetadata {
                project_id: "p1".to_string(),
                cwd: "/work/p1".to_string(),
            },
        )
        .await
        .unwrap();
        detector.mark_alive(4242);
        detector.refuse_signals();

        let removed = release_tracked_process(&detector, &pids, "s1")
            .await
            .unwrap();

        assert_eq!(removed.pid, 4242);
        assert!(pids.get_pid("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_release_without_tracked_pid_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let pids = FilePidRepository::new(dir.path().join("processes.json"));
        let detector = MockProcessDetector::new();

        assert!(release_tracked_process(&detector, &pids, "ghost")
            .await
            .is_none());
        assert!(detector.terminated().is_empty());
    }

    #[tokio::test]
    async fn test_track_returns_none_when_detection_misses() {
        let dir = tempfile::tempdir().unwrap();
        let pids = FilePidRepository::new(dir.path().join("processes.json"));
        let detector = MockProcessDetector::new();

        let before = vec![entry(1000, "existing")];
        detector.set_process_list(vec![entry(1000, "existing")]);

        let record =
            track_spawned_process(&detector, &CwdThenHighestPidMatcher, &pids, &before, ctx())
                .await;

        assert!(record.is_none());
        assert!(pids.get_all_pids().await.is_empty());
    }

    #[tokio::test]
    async fn test_track_returns_none_when_listing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pids = FilePidRepository::new(dir.path().join("processes.json"));
        let detector = MockProcessDetector::new();
        detector.fail_listing();

        let record =
            track_spawned_process(&detector, &CwdThenHighestPidMatcher, &pids, &[], ctx()).await;

        assert!(record.is_none());
    }
}
