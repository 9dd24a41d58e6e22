//! Configurable mock collaborators for tests.

mod mock_detector;
mod mock_scheduler;
mod mock_session_source;

pub use mock_detector::MockProcessDetector;
pub use mock_scheduler::MockScheduler;
pub use mock_session_source::{MockSessionSource, StaticUserConfig};
