//! Capture session lifecycle.
//!
//! A session moves idle -> active -> finalizing -> idle. Only one session is
//! live per process; the [`session_manager::SessionManager`] guards the
//! transitions and owns the per-session correlation state.

use serde::Serialize;

/// Submodule for the owned session value.
pub mod session;
/// Submodule for the lifecycle driver.
pub mod session_manager;

pub use session::Session;
pub use session_manager::{SessionManager, StopReport};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Active,
    /// Event delivery has stopped and the archive is being assembled.
    Finalizing,
}
