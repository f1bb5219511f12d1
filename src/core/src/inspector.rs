//! Host automation boundary.
//!
//! An [`Inspector`] attaches to a capture subject (a browsing tab), streams
//! its network events into the controller's inbound channel and answers body
//! fetch requests through the same channel. Implementations are thin I/O
//! wrappers; everything they deliver is interpreted by the session manager.

pub mod replay;

use tokio::sync::mpsc;

use crate::data_capture::events::{BodyRequest, InboundEvent};
use crate::error_handling::types::InspectorError;

pub use replay::ReplayInspector;

/// URL prefixes of pages that cannot be inspected.
pub const RESTRICTED_SCHEMES: [&str; 4] = ["chrome://", "edge://", "about:", "devtools://"];

/// The page a capture session observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub url: String,
}

impl Subject {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Checks that the subject can be captured, returning the reason it
    /// cannot otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() || self.url.is_empty() {
            return Err("subject has no id or url".to_string());
        }
        let lower = self.url.to_ascii_lowercase();
        if let Some(scheme) = RESTRICTED_SCHEMES.iter().find(|s| lower.starts_with(*s)) {
            return Err(format!("restricted scheme {}", scheme));
        }
        Ok(())
    }
}

/// Attachment to the inspection source of one subject at a time.
pub trait Inspector: Send {
    /// The subject a new session would capture.
    fn resolve_subject(&mut self) -> Result<Subject, InspectorError>;

    /// Starts delivering the subject's events into `events`.
    fn attach(
        &mut self,
        subject: &Subject,
        events: mpsc::Sender<InboundEvent>,
    ) -> Result<(), InspectorError>;

    /// Stops event delivery. Completions already in flight may still arrive.
    fn detach(&mut self, subject: &Subject) -> Result<(), InspectorError>;

    /// Fetches a response body asynchronously. The outcome arrives later as a
    /// `BodyFetched` event; a fetch that never completes is simply dropped.
    fn request_body(&mut self, request: BodyRequest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_schemes_are_rejected() {
        assert!(Subject::new("1", "chrome://settings").validate().is_err());
        assert!(Subject::new("1", "EDGE://flags").validate().is_err());
        assert!(Subject::new("1", "about:blank").validate().is_err());
        assert!(Subject::new("", "https://a.test/").validate().is_err());
        assert!(Subject::new("1", "https://a.test/").validate().is_ok());
    }
}
