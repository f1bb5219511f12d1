use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

use crate::data_capture::correlator::EventCorrelator;
use crate::data_capture::types::FilterSet;
use crate::inspector::Subject;
use crate::session_management::SessionPhase;

/// The single live capture session and everything it has correlated.
#[derive(Debug, Default)]
pub struct Session {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub subject: Option<Subject>,
    pub filters: FilterSet,
    pub started_at: Option<DateTime<Utc>>,
    pub correlator: EventCorrelator,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Enters the active phase with a fresh id and empty correlation state.
    pub fn begin(&mut self, subject: Subject, filters: FilterSet) {
        self.reset();
        self.id = Uuid::new_v4();
        self.phase = SessionPhase::Active;
        self.subject = Some(subject);
        self.filters = filters;
        self.started_at = Some(Utc::now());
        self.correlator = EventCorrelator::new(self.id, filters);
    }

    /// Returns to idle, dropping every request, response, frame and resource.
    pub fn reset(&mut self) {
        if self.phase != SessionPhase::Idle {
            debug!("[{}] Resetting session", self.id);
        }
        self.phase = SessionPhase::Idle;
        self.subject = None;
        self.filters = FilterSet::default();
        self.started_at = None;
        self.correlator.clear();
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject.as_ref().map(|s| s.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::events::CaptureEvent;
    use crate::data_capture::types::{Headers, RequestRecord};

    #[test]
    fn begin_and_reset() {
        let mut session = Session::default();
        assert!(!session.is_active());

        let filters = FilterSet {
            js: true,
            ..Default::default()
        };
        session.begin(Subject::new("tab-1", "https://a.test/"), filters);
        assert!(session.is_active());
        assert_eq!(session.subject_id(), Some("tab-1"));
        assert_eq!(session.correlator.filters(), filters);
        let first_id = session.id;

        session.correlator.apply(CaptureEvent::RequestSent {
            request_id: "1".into(),
            request: RequestRecord {
                url: "https://a.test/".into(),
                method: "GET".into(),
                headers: Headers::new(),
                post_data: None,
                timestamp: 0.0,
                initiator: None,
            },
        });
        assert!(!session.correlator.is_empty());

        session.reset();
        assert_eq!(session.phase, SessionPhase::Idle);
        assert!(session.subject.is_none());
        assert!(session.started_at.is_none());
        assert!(session.correlator.is_empty());

        session.begin(Subject::new("tab-1", "https://a.test/"), filters);
        assert_ne!(session.id, first_id);
    }
}
