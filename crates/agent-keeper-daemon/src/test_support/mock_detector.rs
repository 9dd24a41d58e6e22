//! Mock process-table access.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use agent_keeper_common::mutex_lock_or_recover;

use crate::error::ProcessError;
use crate::process::{ProcessDetector, ProcessEntry};

#[derive(Default)]
pub struct MockProcessDetector {
    processes: Mutex<Vec<ProcessEntry>>,
    alive: Mutex<HashSet<u32>>,
    terminated: Mutex<Vec<u32>>,
    fail_listing: AtomicBool,
    refuse_signals: AtomicBool,
}

impl MockProcessDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_process_list(&self, processes: Vec<ProcessEntry>) {
        *mutex_lock_or_recover(&self.processes) = processes;
    }

    pub fn mark_alive(&self, pid: u32) {
        mutex_lock_or_recover(&self.alive).insert(pid);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn refuse_signals(&self) {
        self.refuse_signals.store(true, Ordering::SeqCst);
    }

    /// Pids that received a termination signal, in order.
    pub fn terminated(&self) -> Vec<u32> {
        mutex_lock_or_recover(&self.terminated).clone()
    }
}

#[async_trait]
impl ProcessDetector for MockProcessDetector {
    async fn current_process_list(&self) -> Result<Vec<ProcessEntry>, ProcessError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ProcessError::Listing("mock failure".to_string()));
        }
        Ok(mutex_lock_or_recover(&self.processes).clone())
    }

    async fn is_alive(&self, pid: u32) -> bool {
        mutex_lock_or_recover(&self.alive).contains(&pid)
    }

    async fn terminate(&self, pid: u32) -> bool {
        if self.refuse_signals.load(Ordering::SeqCst) {
            return false;
        }
        mutex_lock_or_recover(&self.terminated).push(pid);
        mutex_lock_or_recover(&self.alive).remove(&pid);
        true
    }
}
