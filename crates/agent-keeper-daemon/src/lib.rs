#![deny(clippy::all)]

//! Process tracking and rate-limit auto-resume for externally spawned
//! coding-agent sessions.
//!
//! The pieces fit together as a pipeline: the lifecycle boundary detects a
//! freshly spawned agent process by diffing process-table snapshots and
//! persists its PID; the monitor watches session-changed events, parses
//! the latest transcript entry for a rate-limit notice, and upserts a
//! one-shot resume job through the scheduler contract.

mod config;
mod error;
mod events;
mod lifecycle;
mod monitor;
mod persist;
mod pid_repository;
mod process;
mod rate_limit;
mod resume;
mod scheduler;
mod session;
mod store;
pub mod test_support;

pub use config::FileUserConfigSource;
pub use config::KeeperConfig;
pub use config::UserConfig;
pub use config::UserConfigSource;
pub use error::LifecycleError;
pub use error::PersistenceError;
pub use error::ProcessError;
pub use error::SchedulerError;
pub use error::SessionSourceError;
pub use events::SessionChanged;
pub use events::SessionEventBus;
pub use events::SessionListener;
pub use events::SubscriptionHandle;
pub use lifecycle::SessionLifecycle;
pub use lifecycle::SpawnContext;
pub use lifecycle::release_tracked_process;
pub use lifecycle::track_spawned_process;
pub use monitor::RateLimitMonitor;
pub use pid_repository::FilePidRepository;
pub use pid_repository::PidMetadata;
pub use pid_repository::PidStore;
pub use pid_repository::ProcessPidsFile;
pub use pid_repository::ProcessRecord;
pub use process::CwdThenHighestPidMatcher;
pub use process::DetectionHint;
pub use process::NewProcessMatcher;
pub use process::ProcessDetector;
pub use process::ProcessEntry;
pub use process::PsProcessDetector;
pub use process::detect_agent_pid;
pub use rate_limit::ResetTime;
pub use rate_limit::calculate_resume_datetime;
pub use rate_limit::parse_rate_limit_message;
pub use rate_limit::parse_reset_time;
pub use resume::RESUME_JOB_MARKER;
pub use resume::RESUME_MESSAGE_CONTENT;
pub use resume::ResumeJobParams;
pub use resume::create_rate_limit_resume_job;
pub use resume::create_rate_limit_resume_job_at;
pub use scheduler::ConcurrencyPolicy;
pub use scheduler::JobMessage;
pub use scheduler::JobStatus;
pub use scheduler::NewSchedulerJob;
pub use scheduler::Schedule;
pub use scheduler::SchedulerClient;
pub use scheduler::SchedulerJob;
pub use scheduler::UpdateSchedulerJob;
pub use session::AssistantEntry;
pub use session::ContentBlock;
pub use session::ConversationEntry;
pub use session::EntryMessage;
pub use session::MessageContent;
pub use session::SessionData;
pub use session::SessionSource;
pub use store::FileCacheStore;
