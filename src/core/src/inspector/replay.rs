//! Inspector over a recorded DevTools event log.
//!
//! The log is newline-delimited JSON. Notification lines
//! (`{"method": "Network.responseReceived", "params": {...}}`) are replayed in
//! file order once a session attaches. Lines for `Network.getResponseBody`
//! carry the recorded `result` (or `error`) and answer body requests.
//! Blank lines and unrelated methods are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info, trace, warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Inspector, Subject};
use crate::data_capture::events::{
    decode, BodyRequest, CaptureEvent, InboundEvent, ResponseBodyResult, BODY_FETCH_FAILED,
    GET_RESPONSE_BODY,
};
use crate::data_capture::types::{FetchedBody, RequestId};
use crate::error_handling::types::InspectorError;

const REPLAY_SUBJECT_ID: &str = "replay";

#[derive(Deserialize)]
struct LogLine {
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BodyParams {
    request_id: RequestId,
}

pub struct ReplayInspector {
    events: Vec<CaptureEvent>,
    bodies: HashMap<RequestId, Result<FetchedBody, String>>,
    sender: Option<mpsc::Sender<InboundEvent>>,
    feed: Option<JoinHandle<()>>,
}

impl ReplayInspector {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, InspectorError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let inspector = Self::from_reader(BufReader::new(file))?;
        info!(
            "Loaded replay log {}: {} events, {} bodies",
            path.display(),
            inspector.events.len(),
            inspector.bodies.len()
        );
        Ok(inspector)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, InspectorError> {
        let mut events = Vec::new();
        let mut bodies = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let malformed = |reason: String| InspectorError::MalformedLog {
                line: line_no,
                reason,
            };

            let parsed: LogLine =
                serde_json::from_str(&line).map_err(|e| malformed(e.to_string()))?;
            let Some(method) = parsed.method else {
                trace!("Skipping replay line {} without method", line_no);
                continue;
            };

            if method == GET_RESPONSE_BODY {
                let params: BodyParams =
                    serde_json::from_value(parsed.params).map_err(|e| malformed(e.to_string()))?;
                let outcome = match (parsed.result, parsed.error) {
                    (Some(result), None) => {
                        let result: ResponseBodyResult = serde_json::from_value(result)
                            .map_err(|e| malformed(e.to_string()))?;
                        Ok(FetchedBody::from(result))
                    }
                    _ => Err(BODY_FETCH_FAILED.to_string()),
                };
                bodies.insert(params.request_id, outcome);
                continue;
            }

            match decode(&method, parsed.params).map_err(|e| malformed(e.to_string()))? {
                Some(event) => events.push(event),
                None => trace!("Skipping replay method {} at line {}", method, line_no),
            }
        }

        Ok(Self {
            events,
            bodies,
            sender: None,
            feed: None,
        })
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl Inspector for ReplayInspector {
    /// The subject is the page whose first request opens the log.
    fn resolve_subject(&mut self) -> Result<Subject, InspectorError> {
        self.events
            .iter()
            .find_map(|event| match event {
                CaptureEvent::RequestSent { request, .. } => {
                    Some(Subject::new(REPLAY_SUBJECT_ID, request.url.clone()))
                }
                _ => None,
            })
            .ok_or(InspectorError::NoSubject)
    }

    fn attach(
        &mut self,
        subject: &Subject,
        events: mpsc::Sender<InboundEvent>,
    ) -> Result<(), InspectorError> {
        if self.feed.is_some() {
            return Err(InspectorError::AttachFailed(
                "replay already attached".to_string(),
            ));
        }
        debug!("Replaying {} events to {}", self.events.len(), subject.id);

        let replay = self.events.clone();
        let subject_id = subject.id.clone();
        let tx = events.clone();
        self.feed = Some(tokio::spawn(async move {
            for event in replay {
                if tx
                    .send(InboundEvent::new(subject_id.clone(), event))
                    .await
                    .is_err()
                {
                    warn!("Replay receiver closed early");
                    break;
                }
            }
            debug!("Replay feed finished");
        }));
        self.sender = Some(events);
        Ok(())
    }

    fn detach(&mut self, subject: &Subject) -> Result<(), InspectorError> {
        debug!("Detaching replay from {}", subject.id);
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        self.sender = None;
        Ok(())
    }

    fn request_body(&mut self, request: BodyRequest) {
        let Some(tx) = self.sender.clone() else {
            debug!("Body request for {} while detached", request.request_id);
            return;
        };
        let result = self
            .bodies
            .get(&request.request_id)
            .cloned()
            .unwrap_or_else(|| Err(BODY_FETCH_FAILED.to_string()));
        tokio::spawn(async move {
            let event = CaptureEvent::BodyFetched {
                session_id: request.session_id,
                request_id: request.request_id,
                result,
            };
            let _ = tx.send(InboundEvent::new(request.subject_id, event)).await;
        });
    }
}
