//! Mock session data and user-config sources.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use agent_keeper_common::mutex_lock_or_recover;

use crate::config::{UserConfig, UserConfigSource};
use crate::error::SessionSourceError;
use crate::session::{SessionData, SessionSource};

#[derive(Default)]
pub struct MockSessionSource {
    sessions: Mutex<HashMap<(String, String), SessionData>>,
    get_count: AtomicUsize,
}

impl MockSessionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project_id: &str, session_id: &str, data: SessionData) {
        mutex_lock_or_recover(&self.sessions)
            .insert((project_id.to_string(), session_id.to_string()), data);
    }

    pub fn get_calls(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionSource for MockSessionSource {
    async fn get_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<SessionData, SessionSourceError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        mutex_lock_or_recover(&self.sessions)
            .get(&(project_id.to_string(), session_id.to_string()))
            .cloned()
            .ok_or_else(|| SessionSourceError::NotFound {
                project_id: project_id.to_string(),
                session_id: session_id.to_string(),
            })
    }
}

/// A user-config source that always returns the same settings.
pub struct StaticUserConfig {
    config: UserConfig,
}

impl StaticUserConfig {
    pub fn new(config: UserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UserConfigSource for StaticUserConfig {
    async fn user_config(&self) -> UserConfig {
        self.config.clone()
    }
}
