//! Durable tracking of which OS process backs which logical session.
//!
//! Unlike the generic cache, every mutation here awaits its flush: losing a
//! PID record would leak an orphaned agent process. Mutations are
//! serialized through a writer mutex and land via atomic rename, so two
//! concurrent saves cannot tear the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::PersistenceError;
use crate::persist::write_atomic;

/// One tracked OS process, keyed by its logical session process id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub pid: u32,
    pub session_process_id: String,
    pub project_id: String,
    pub cwd: String,
    pub created_at: String,
}

/// Metadata captured alongside a newly detected PID.
#[derive(Debug, Clone)]
pub struct PidMetadata {
    pub project_id: String,
    pub cwd: String,
}

/// Durable shape of the PID file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessPidsFile {
    pub processes: BTreeMap<String, ProcessRecord>,
}

impl ProcessPidsFile {
    /// Structural validity beyond what serde enforces: positive pids and
    /// keys matching their record's session process id.
    fn is_valid(&self) -> bool {
        self.processes
            .iter()
            .all(|(key, record)| record.pid > 0 && record.session_process_id == *key)
    }
}

/// Storage contract for tracked PIDs.
///
/// Reads never fail: a missing or corrupted backing file is treated as an
/// empty map so a bad state file can never block process cleanup.
#[async_trait]
pub trait PidStore: Send + Sync {
    async fn save_pid(
        &self,
        session_process_id: &str,
        pid: u32,
        metadata: PidMetadata,
    ) -> Result<ProcessRecord, PersistenceError>;

    /// Remove and return the record for `session_process_id`. Removing an
    /// unknown id is not an error; it returns `None`.
    async fn remove_pid(
        &self,
        session_process_id: &str,
    ) -> Result<Option<ProcessRecord>, PersistenceError>;

    async fn get_pid(&self, session_process_id: &str) -> Option<ProcessRecord>;

    async fn get_all_pids(&self) -> Vec<ProcessRecord>;

    /// Unconditionally write an empty map. Shutdown hygiene.
    async fn clear_all_pids(&self) -> Result<(), PersistenceError>;
}

pub struct FilePidRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePidRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn write_file(&self, data: &ProcessPidsFile) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string_pretty(data)
            .map_err(|e| PersistenceError::new("serialize", e))?;
        write_atomic(&self.path, &payload).await
    }
}

#[async_trait]
impl PidStore for FilePidRepository {
    async fn save_pid(
        &self,
        session_process_id: &str,
        pid: u32,
        metadata: PidMetadata,
    ) -> Result<ProcessRecord, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let mut data = read_pid_file(&self.path).await;
        let record = ProcessRecord {
            pid,
            session_process_id: session_process_id.to_string(),
            project_id: metadata.project_id,
            cwd: metadata.cwd,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        data.processes
            .insert(session_process_id.to_string(), record.clone());
        self.write_file(&data).await?;

        Ok(record)
    }

    async fn remove_pid(
        &self,
        session_process_id: &str,
    ) -> Result<Option<ProcessRecord>, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let mut data = read_pid_file(&self.path).await;
        let removed = data.processes.remove(session_process_id);
        self.write_file(&data).await?;

        Ok(removed)
    }

    async fn get_pid(&self, session_process_id: &str) -> Option<ProcessRecord> {
        read_pid_file(&self.path)
            .await
            .processes
            .remove(session_process_id)
    }

    async fn get_all_pids(&self) -> Vec<ProcessRecord> {
        read_pid_file(&self.path)
            .await
            .processes
            .into_values()
            .collect()
    }

    async fn clear_all_pids(&self) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.write_file(&ProcessPidsFile::default()).await
    }
}

async fn read_pid_file(path: &Path) -> ProcessPidsFile {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => return ProcessPidsFile::default(),
    };

    match serde_json::from_str::<ProcessPidsFile>(&content) {
        Ok(data) if data.is_valid() => data,
        Ok(_) => {
            warn!(path = %path.display(), "PID file fails validation, treating as empty");
            ProcessPidsFile::default()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "PID file parse error, treating as empty");
            ProcessPidsFile::default()
        }
    }
}
