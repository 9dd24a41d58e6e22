//! OS process table access and new-process re-identification.
//!
//! Listing shells out to `ps -eo pid,command` (POSIX options only);
//! liveness and termination go through `kill(2)` directly. The heuristic
//! that picks the newly spawned agent process out of a before/after diff is
//! a pluggable strategy so it can be swapped per platform.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProcessError;

/// One row of the OS process table. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub command: String,
}

/// Context for matching the newly spawned process.
#[derive(Debug, Clone)]
pub struct DetectionHint<'a> {
    pub cwd: &'a str,
    pub command_pattern: &'a str,
}

/// Strategy for re-identifying a freshly spawned process from two process
/// table snapshots.
pub trait NewProcessMatcher: Send + Sync {
    fn detect(
        &self,
        before: &[ProcessEntry],
        after: &[ProcessEntry],
        hint: &DetectionHint<'_>,
    ) -> Option<u32>;
}

/// Default heuristic:
///
/// 1. candidates are pids present in `after` but not `before` whose
///    command contains the pattern,
/// 2. among multiple candidates, prefer commands that also mention the
///    working directory,
/// 3. tie-break on the highest pid.
///
/// Step 3 assumes pids are handed out monotonically, which holds on the
/// platforms we target but is not guaranteed by POSIX.
pub struct CwdThenHighestPidMatcher;

impl NewProcessMatcher for CwdThenHighestPidMatcher {
    fn detect(
        &self,
        before: &[ProcessEntry],
        after: &[ProcessEntry],
        hint: &DetectionHint<'_>,
    ) -> Option<u32> {
        let before_pids: HashSet<u32> = before.iter().map(|p| p.pid).collect();

        let candidates: Vec<&ProcessEntry> = after
            .iter()
            .filter(|p| !before_pids.contains(&p.pid) && p.command.contains(hint.command_pattern))
            .collect();

        if candidates.len() > 1 {
            let with_cwd: Vec<&&ProcessEntry> = candidates
                .iter()
                .filter(|p| p.command.contains(hint.cwd))
                .collect();
            if let Some(best) = with_cwd.iter().map(|p| p.pid).max() {
                return Some(best);
            }
        }

        candidates.iter().map(|p| p.pid).max()
    }
}

/// Asynchronous access to the OS process table.
#[async_trait]
pub trait ProcessDetector: Send + Sync {
    /// Snapshot all processes with their command lines. The caller's own
    /// process is part of the result.
    async fn current_process_list(&self) -> Result<Vec<ProcessEntry>, ProcessError>;

    /// Signal-0 probe: true iff `pid` currently exists and is signalable.
    async fn is_alive(&self, pid: u32) -> bool;

    /// Send SIGTERM. Returns whether the signal was accepted, which says
    /// nothing about whether the process has exited yet; callers that need
    /// confirmation must re-poll [`ProcessDetector::is_alive`].
    async fn terminate(&self, pid: u32) -> bool;
}

/// `ps`-backed detector for POSIX hosts.
pub struct PsProcessDetector;

#[async_trait]
impl ProcessDetector for PsProcessDetector {
    async fn current_process_list(&self) -> Result<Vec<ProcessEntry>, ProcessError> {
        let output = tokio::process::Command::new("ps")
            .args(["-eo", "pid,command"])
            .output()
            .await
            .map_err(|e| ProcessError::Listing(e.to_string()))?;

        if !output.status.success() {
            return Err(ProcessError::ListingStatus(
                output.status.code().unwrap_or(-1),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ps_output(&stdout))
    }

    async fn is_alive(&self, pid: u32) -> bool {
        send_signal(pid, 0)
    }

    async fn terminate(&self, pid: u32) -> bool {
        let accepted = send_signal(pid, libc::SIGTERM);
        debug!(pid, accepted, "sent SIGTERM");
        accepted
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: i32) -> bool {
    unsafe { libc::kill(pid as i32, signal) == 0 }
}

fn parse_ps_output(output: &str) -> Vec<ProcessEntry> {
    output
        .lines()
        .skip(1) // header
        .filter_map(|line| {
            let line = line.trim();
            let (pid, command) = line.split_once(char::is_whitespace)?;
            let pid: u32 = pid.trim().parse().ok()?;
            Some(ProcessEntry {
                pid,
                command: command.trim().to_string(),
            })
        })
        .collect()
}

/// Run the default matcher over two snapshots.
pub fn detect_agent_pid(
    before: &[ProcessEntry],
    after: &[ProcessEntry],
    hint: &DetectionHint<'_>,
) -> Option<u32> {
    CwdThenHighestPidMatcher.detect(before, after, hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: u32, command: &str) -> ProcessEntry {
        ProcessEntry {
            pid,
            command: command.to_string(),
        }
    }

    #[test]
    fn test_parse_ps_output_skips_header_and_garbage() {
        let output = "  PID COMMAND\n  100 /bin/bash\n\n 1002 sleep 30\nnot-a-pid something\n";
        let entries = parse_ps_output(output);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry(100, "/bin/bash"));
        assert_eq!(entries[1], entry(1002, "sleep 30"));
    }

    #[test]
    fn test_detect_single_new_process() {
        let before = vec![entry(1000, "existing")];
        let after = vec![entry(1000, "existing"), entry(1002, "sleep 30")];
        let hint = DetectionHint {
            cwd: "/tmp",
            command_pattern: "sleep",
        };

        assert_eq!(detect_agent_pid(&before, &after, &hint), Some(1002));
    }

    #[test]
    fn test_detect_prefers_cwd_match() {
        let before = vec![];
        let after = vec![
            entry(2001, "claude --dir /work/other"),
            entry(2000, "claude --dir /work/mine"),
        ];
        let hint = DetectionHint {
            cwd: "/work/mine",
            command_pattern: "claude",
        };

        assert_eq!(detect_agent_pid(&before, &after, &hint), Some(2000));
    }

    #[test]
    fn test_detect_ties_break_on_highest_pid() {
        let before = vec![];
        let after = vec![entry(3000, "claude run"), entry(3005, "claude run")];
        let hint = DetectionHint {
            cwd: "/nowhere",
            command_pattern: "claude",
        };

        assert_eq!(detect_agent_pid(&before, &after, &hint), Some(3005));
    }

    #[test]
    fn test_detect_none_when_no_new_match() {
        let before = vec![entry(1000, "claude run")];
        let after = vec![entry(1000, "claude run"), entry(1001, "vim notes.txt")];
        let hint = DetectionHint {
            cwd: "/tmp",
            command_pattern: "claude",
        };

        assert_eq!(detect_agent_pid(&before, &after, &hint), None);
    }

    #[test]
    fn test_detect_ignores_pattern_misses_even_with_cwd() {
        let before = vec![];
        let after = vec![entry(4000, "tail -f /work/mine/log")];
        let hint = DetectionHint {
            cwd: "/work/mine",
            command_pattern: "claude",
        };

        assert_eq!(detect_agent_pid(&before, &after, &hint), None);
    }

    #[tokio::test]
    async fn test_current_process_list_includes_self() {
        let detector = PsProcessDetector;
        let list = detector.current_process_list().await.unwrap();
        let own_pid = std::process::id();

        assert!(list.iter().any(|p| p.pid == own_pid));
    }

    #[tokio::test]
    async fn test_is_alive_for_own_and_bogus_pid() {
        let detector = PsProcessDetector;

        assert!(detector.is_alive(std::process::id()).await);
        assert!(!detector.is_alive(999_999_999).await);
    }
}
