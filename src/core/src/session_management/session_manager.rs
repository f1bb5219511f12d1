use crate::archive::{archive_name, build, packets_manifest, ArchiveEntry, PACKETS_MANIFEST_PATH};
use crate::data_capture::events::{BodyRequest, CaptureEvent, InboundEvent};
use crate::data_capture::types::FilterSet;
use crate::error_handling::types::SessionError;
use crate::inspector::Inspector;
use crate::session_management::{Session, SessionPhase};
use crate::storage::ArchiveSink;
use chrono::{Local, Utc};
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outcome of a successful stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub file_name: String,
    pub path: PathBuf,
    pub entries: usize,
}

/// Drives the single capture session.
///
/// # Fields Overview
///
/// - `session`: the live session; idle between captures
/// - `inspector`: attachment to the capture subject, also used for body fetches
/// - `sink`: where finished archives are handed off
/// - `archive_prefix`: leading part of every archive file name
/// - `events_tx`: inbound channel handed to the inspector on attach
///
/// Every method runs on the controller's event loop, so the session is never
/// shared and needs no locking.
pub struct SessionManager {
    session: Session,
    inspector: Box<dyn Inspector>,
    sink: Arc<dyn ArchiveSink>,
    archive_prefix: String,
    events_tx: mpsc::Sender<InboundEvent>,
}

impl SessionManager {
    pub fn new(
        inspector: Box<dyn Inspector>,
        sink: Arc<dyn ArchiveSink>,
        archive_prefix: impl Into<String>,
        events_tx: mpsc::Sender<InboundEvent>,
    ) -> Self {
        Self {
            session: Session::default(),
            inspector,
            sink,
            archive_prefix: archive_prefix.into(),
            events_tx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether a capture is running.
    pub fn status(&self) -> bool {
        self.session.is_active()
    }

    /// Starts capturing the inspector's current subject with `filters`.
    ///
    /// Rejections (`AlreadyActive`, `InvalidSubject`) leave the session
    /// untouched. An attach failure resets the freshly begun session.
    pub fn start(&mut self, filters: FilterSet) -> Result<Uuid, SessionError> {
        if self.session.phase != SessionPhase::Idle {
            return Err(SessionError::AlreadyActive);
        }

        let subject = self
            .inspector
            .resolve_subject()
            .map_err(|e| SessionError::InvalidSubject(e.to_string()))?;
        subject.validate().map_err(SessionError::InvalidSubject)?;

        self.session.begin(subject.clone(), filters);
        let session_id = self.session.id;
        if let Err(e) = self.inspector.attach(&subject, self.events_tx.clone()) {
            error!("[{}] Failed to attach to {}: {}", session_id, subject.id, e);
            self.session.reset();
            return Err(SessionError::Inspector(e));
        }

        info!(
            "[{}] Capture started on {} ({}) with filters {:?}",
            session_id, subject.id, subject.url, filters
        );
        Ok(session_id)
    }

    /// Stops the capture, builds the archive and hands it to the sink.
    ///
    /// Body fetches still in flight are left out. The session is reset
    /// whether or not the export succeeds.
    pub fn stop(&mut self) -> Result<StopReport, SessionError> {
        if !self.session.is_active() {
            return Err(SessionError::NotActive);
        }
        let session_id = self.session.id;
        self.session.phase = SessionPhase::Finalizing;

        if let Some(subject) = &self.session.subject {
            if let Err(e) = self.inspector.detach(subject) {
                warn!("[{}] Detach from {} failed: {}", session_id, subject.id, e);
            }
        }

        let pending = self.session.correlator.pending_fetches();
        if pending > 0 {
            info!(
                "[{}] Omitting {} body fetches still in flight",
                session_id, pending
            );
        }

        let result = self.export();
        match &result {
            Ok(report) => info!(
                "[{}] Archive {} saved with {} entries",
                session_id, report.file_name, report.entries
            ),
            Err(e) => error!("[{}] Export failed: {}", session_id, e),
        }
        self.session.reset();
        result
    }

    fn export(&self) -> Result<StopReport, SessionError> {
        let entries = self.archive_entries()?;
        let bytes = build(&entries).map_err(SessionError::Archive)?;
        let file_name = archive_name(&self.archive_prefix, &Local::now());
        let path = self
            .sink
            .save_archive(&file_name, &bytes)
            .map_err(SessionError::Storage)?;
        Ok(StopReport {
            file_name,
            path,
            entries: entries.len(),
        })
    }

    /// Captured resources in capture order, then the metadata document when
    /// packets were requested. A later entry with an already used path
    /// replaces the earlier one in place.
    fn archive_entries(&self) -> Result<Vec<ArchiveEntry>, SessionError> {
        let correlator = &self.session.correlator;
        let mut entries: Vec<ArchiveEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut push = |entry: ArchiveEntry| match positions.get(&entry.path) {
            Some(&at) => {
                if entry.path == PACKETS_MANIFEST_PATH {
                    warn!(
                        "[{}] Captured resource at {} is shadowed by the packets document",
                        self.session.id, entry.path
                    );
                } else {
                    debug!(
                        "[{}] Replacing duplicate archive path {}",
                        self.session.id, entry.path
                    );
                }
                entries[at] = entry;
            }
            None => {
                positions.insert(entry.path.clone(), entries.len());
                entries.push(entry);
            }
        };

        for resource in correlator.resources() {
            push(ArchiveEntry::new(
                resource.path.clone(),
                resource.bytes.clone(),
            ));
        }
        if self.session.filters.packets {
            push(packets_manifest(correlator, Utc::now()).map_err(SessionError::Archive)?);
        }
        Ok(entries)
    }

    /// Routes one inbound event into the live session.
    ///
    /// Events arriving while idle or for another subject are dropped, as are
    /// body completions issued by an earlier session. Detachment discards
    /// the capture without producing an archive.
    pub fn handle_event(&mut self, inbound: InboundEvent) {
        if !self.session.is_active() {
            trace!("Dropping event while idle: {:?}", inbound.event);
            return;
        }
        if self.session.subject_id() != Some(inbound.subject_id.as_str()) {
            trace!(
                "[{}] Dropping event for foreign subject {}",
                self.session.id,
                inbound.subject_id
            );
            return;
        }

        let session_id = self.session.id;
        match inbound.event {
            CaptureEvent::Detached => {
                warn!(
                    "[{}] Inspector detached from {}, discarding capture",
                    session_id, inbound.subject_id
                );
                self.session.reset();
            }
            CaptureEvent::BodyFetched {
                session_id: issued_by,
                ref request_id,
                ..
            } if issued_by != session_id => {
                debug!(
                    "[{}] Dropping stale body for {} from session {}",
                    session_id, request_id, issued_by
                );
            }
            event => {
                if let Some(request_id) = self.session.correlator.apply(event) {
                    trace!("[{}] Fetching body for {}", session_id, request_id);
                    self.inspector.request_body(BodyRequest {
                        session_id,
                        subject_id: inbound.subject_id,
                        request_id,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::builder::tests::read_archive;
    use crate::data_capture::types::{
        BodyEncoding, FetchedBody, Headers, RequestRecord, ResponseInfo,
    };
    use crate::error_handling::types::{InspectorError, StorageError};
    use crate::inspector::Subject;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        attached: usize,
        detached: usize,
        bodies: Vec<BodyRequest>,
    }

    struct ScriptedInspector {
        subject: Option<Subject>,
        fail_attach: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl Inspector for ScriptedInspector {
        fn resolve_subject(&mut self) -> Result<Subject, InspectorError> {
            self.subject.clone().ok_or(InspectorError::NoSubject)
        }

        fn attach(
            &mut self,
            _subject: &Subject,
            _events: mpsc::Sender<InboundEvent>,
        ) -> Result<(), InspectorError> {
            if self.fail_attach {
                return Err(InspectorError::AttachFailed("scripted".into()));
            }
            self.calls.lock().unwrap().attached += 1;
            Ok(())
        }

        fn detach(&mut self, _subject: &Subject) -> Result<(), InspectorError> {
            self.calls.lock().unwrap().detached += 1;
            Ok(())
        }

        fn request_body(&mut self, request: BodyRequest) {
            self.calls.lock().unwrap().bodies.push(request);
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl ArchiveSink for MemorySink {
        fn save_archive(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
            if self.fail {
                return Err(StorageError::WriteFailed);
            }
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from(file_name))
        }
    }

    const TAB: &str = "tab-1";

    struct Fixture {
        manager: SessionManager,
        calls: Arc<Mutex<Calls>>,
        sink: Arc<MemorySink>,
    }

    fn fixture_with(subject: Option<Subject>, fail_attach: bool, sink: MemorySink) -> Fixture {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let sink = Arc::new(sink);
        let (events_tx, _events_rx) = mpsc::channel(8);
        let inspector = ScriptedInspector {
            subject,
            fail_attach,
            calls: calls.clone(),
        };
        let manager = SessionManager::new(Box::new(inspector), sink.clone(), "panima", events_tx);
        Fixture {
            manager,
            calls,
            sink,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            Some(Subject::new(TAB, "https://a.test/")),
            false,
            MemorySink::default(),
        )
    }

    fn feed(manager: &mut SessionManager, event: CaptureEvent) {
        manager.handle_event(InboundEvent::new(TAB, event));
    }

    fn request(id: &str, url: &str) -> CaptureEvent {
        CaptureEvent::RequestSent {
            request_id: id.into(),
            request: RequestRecord {
                url: url.into(),
                method: "GET".into(),
                headers: Headers::new(),
                post_data: None,
                timestamp: 1.0,
                initiator: None,
            },
        }
    }

    fn response(id: &str, url: &str, mime: &str) -> CaptureEvent {
        CaptureEvent::ResponseReceived {
            request_id: id.into(),
            response: ResponseInfo {
                url: url.into(),
                status: 200,
                status_text: "OK".into(),
                headers: Headers::new(),
                mime_type: mime.into(),
                protocol: "h2".into(),
                resource_type: "Script".into(),
            },
        }
    }

    fn finished(id: &str) -> CaptureEvent {
        CaptureEvent::LoadingFinished {
            request_id: id.into(),
        }
    }

    fn body(session_id: Uuid, id: &str, text: &str) -> CaptureEvent {
        CaptureEvent::BodyFetched {
            session_id,
            request_id: id.into(),
            result: Ok(FetchedBody {
                body: text.into(),
                encoding: BodyEncoding::Raw,
            }),
        }
    }

    #[test]
    fn js_and_packets_end_to_end() {
        let mut fx = fixture();
        let filters = FilterSet {
            js: true,
            packets: true,
            ..Default::default()
        };
        let session_id = fx.manager.start(filters).unwrap();
        assert!(fx.manager.status());
        assert_eq!(fx.calls.lock().unwrap().attached, 1);

        feed(&mut fx.manager, request("1", "https://a.test/app.js"));
        feed(
            &mut fx.manager,
            response("1", "https://a.test/app.js", "application/javascript"),
        );
        feed(&mut fx.manager, finished("1"));

        let issued = fx.calls.lock().unwrap().bodies.clone();
        assert_eq!(
            issued,
            vec![BodyRequest {
                session_id,
                subject_id: TAB.into(),
                request_id: "1".into(),
            }]
        );

        // duplicate completion must not duplicate the resource
        feed(&mut fx.manager, body(session_id, "1", "console.log(1)"));
        feed(&mut fx.manager, body(session_id, "1", "console.log(1)"));

        let report = fx.manager.stop().unwrap();
        assert_eq!(report.entries, 2);
        assert!(report.file_name.starts_with("panima_"));
        assert!(report.file_name.ends_with(".zip"));
        assert!(!fx.manager.status());
        assert!(fx.manager.session().correlator.is_empty());
        assert_eq!(fx.calls.lock().unwrap().detached, 1);

        let saved = fx.sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        let entries = read_archive(&saved[0].1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a.test/app.js");
        assert_eq!(entries[0].1, b"console.log(1)");
        assert_eq!(entries[1].0, PACKETS_MANIFEST_PATH);

        let manifest: Value = serde_json::from_slice(&entries[1].1).unwrap();
        let items = manifest["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["requestId"], "1");
        assert!(items[0]["request"].is_object());
        assert!(items[0]["response"].is_object());
        assert!(items[0]["websocket"].is_null());
    }

    #[test]
    fn manifest_is_omitted_without_packets() {
        let mut fx = fixture();
        let session_id = fx
            .manager
            .start(FilterSet {
                css: true,
                ..Default::default()
            })
            .unwrap();
        feed(&mut fx.manager, request("1", "https://a.test/s.css"));
        feed(&mut fx.manager, response("1", "https://a.test/s.css", "text/css"));
        feed(&mut fx.manager, finished("1"));
        feed(&mut fx.manager, body(session_id, "1", "a{}"));

        let report = fx.manager.stop().unwrap();
        assert_eq!(report.entries, 1);
        let saved = fx.sink.saved.lock().unwrap();
        let entries = read_archive(&saved[0].1);
        assert_eq!(entries[0].0, "a.test/s.css");
    }

    #[test]
    fn unfinished_fetches_are_left_out() {
        let mut fx = fixture();
        fx.manager
            .start(FilterSet {
                js: true,
                ..Default::default()
            })
            .unwrap();
        feed(&mut fx.manager, request("1", "https://a.test/app.js"));
        feed(&mut fx.manager, response("1", "https://a.test/app.js", "text/javascript"));
        feed(&mut fx.manager, finished("1"));
        assert_eq!(fx.manager.session().correlator.pending_fetches(), 1);

        let report = fx.manager.stop().unwrap();
        assert_eq!(report.entries, 0);
    }

    #[test]
    fn detach_discards_capture_without_archive() {
        let mut fx = fixture();
        fx.manager
            .start(FilterSet {
                packets: true,
                ..Default::default()
            })
            .unwrap();
        feed(&mut fx.manager, request("1", "https://a.test/"));
        feed(&mut fx.manager, CaptureEvent::Detached);

        assert!(!fx.manager.status());
        assert!(fx.manager.session().correlator.is_empty());
        assert!(fx.sink.saved.lock().unwrap().is_empty());
        assert!(matches!(fx.manager.stop(), Err(SessionError::NotActive)));
    }

    #[test]
    fn conflicting_transitions_are_rejected() {
        let mut fx = fixture();
        assert_eq!(fx.manager.stop().unwrap_err().code(), "not_active");

        fx.manager.start(FilterSet::default()).unwrap();
        let id = fx.manager.session().id;
        assert_eq!(
            fx.manager.start(FilterSet::default()).unwrap_err().code(),
            "already_active"
        );
        assert_eq!(fx.manager.session().id, id);
        assert_eq!(fx.calls.lock().unwrap().attached, 1);
    }

    #[test]
    fn invalid_subjects_fail_before_mutation() {
        let mut fx = fixture_with(None, false, MemorySink::default());
        assert_eq!(
            fx.manager.start(FilterSet::default()).unwrap_err().code(),
            "invalid_subject"
        );
        assert!(!fx.manager.status());

        let mut fx = fixture_with(
            Some(Subject::new(TAB, "chrome://settings")),
            false,
            MemorySink::default(),
        );
        assert_eq!(
            fx.manager.start(FilterSet::default()).unwrap_err().code(),
            "invalid_subject"
        );
        assert_eq!(fx.calls.lock().unwrap().attached, 0);
    }

    #[test]
    fn attach_failure_resets_session() {
        let mut fx = fixture_with(
            Some(Subject::new(TAB, "https://a.test/")),
            true,
            MemorySink::default(),
        );
        let err = fx.manager.start(FilterSet::default()).unwrap_err();
        assert_eq!(err.code(), "inspector_failed");
        assert!(!fx.manager.status());
        assert_eq!(fx.manager.session().phase, SessionPhase::Idle);
    }

    #[test]
    fn storage_failure_still_resets() {
        let mut fx = fixture_with(
            Some(Subject::new(TAB, "https://a.test/")),
            false,
            MemorySink {
                fail: true,
                ..Default::default()
            },
        );
        fx.manager.start(FilterSet::default()).unwrap();
        let err = fx.manager.stop().unwrap_err();
        assert_eq!(err.code(), "storage_failed");
        assert!(!fx.manager.status());
        fx.manager.start(FilterSet::default()).unwrap();
    }

    #[test]
    fn foreign_and_stale_events_are_ignored() {
        let mut fx = fixture();
        fx.manager
            .start(FilterSet {
                js: true,
                ..Default::default()
            })
            .unwrap();

        fx.manager
            .handle_event(InboundEvent::new("tab-2", request("1", "https://b.test/")));
        assert!(fx.manager.session().correlator.request("1").is_none());

        feed(&mut fx.manager, request("1", "https://a.test/app.js"));
        feed(&mut fx.manager, response("1", "https://a.test/app.js", "text/javascript"));
        feed(&mut fx.manager, finished("1"));
        feed(&mut fx.manager, body(Uuid::new_v4(), "1", "stale"));
        assert!(fx.manager.session().correlator.resources().is_empty());
        assert_eq!(fx.manager.session().correlator.pending_fetches(), 1);
    }

    #[test]
    fn duplicate_paths_keep_latest_body() {
        let mut fx = fixture();
        let session_id = fx
            .manager
            .start(FilterSet {
                js: true,
                ..Default::default()
            })
            .unwrap();
        for (id, text) in [("1", "old"), ("2", "new")] {
            feed(&mut fx.manager, request(id, "https://a.test/app.js"));
            feed(&mut fx.manager, response(id, "https://a.test/app.js", "text/javascript"));
            feed(&mut fx.manager, finished(id));
            feed(&mut fx.manager, body(session_id, id, text));
        }
        let report = fx.manager.stop().unwrap();
        assert_eq!(report.entries, 1);
        let saved = fx.sink.saved.lock().unwrap();
        let entries = read_archive(&saved[0].1);
        assert_eq!(entries, vec![("a.test/app.js".to_string(), b"new".to_vec())]);
    }

    #[test]
    fn packets_document_wins_over_colliding_resource() {
        let mut fx = fixture();
        let session_id = fx
            .manager
            .start(FilterSet {
                other: true,
                packets: true,
                ..Default::default()
            })
            .unwrap();
        let url = "https://packets/requests.json";
        feed(&mut fx.manager, request("1", url));
        feed(&mut fx.manager, response("1", url, "application/json"));
        feed(&mut fx.manager, finished("1"));
        feed(&mut fx.manager, body(session_id, "1", "[]"));
        assert_eq!(
            fx.manager.session().correlator.resources()[0].path,
            PACKETS_MANIFEST_PATH
        );

        let report = fx.manager.stop().unwrap();
        assert_eq!(report.entries, 1);
        let saved = fx.sink.saved.lock().unwrap();
        let entries = read_archive(&saved[0].1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, PACKETS_MANIFEST_PATH);
        let manifest: Value = serde_json::from_slice(&entries[0].1).unwrap();
        assert_eq!(manifest["items"][0]["response"]["body"], "[]");
    }
}
