//! Per-request correlation of network lifecycle events for one session.
//!
//! `EventCorrelator` consumes an unordered stream of [`CaptureEvent`]s keyed
//! by request id and keeps, per id, at most one request record, at most one
//! response record and an append-only sequence of message-stream frames. It
//! also decides when a response body is worth fetching and turns fetched
//! bodies into [`ResourceEntry`] values for the archive.
//!
//! The correlator never performs I/O. A `LoadingFinished` that warrants a body
//! fetch makes [`EventCorrelator::apply`] return the request id; the caller
//! issues the fetch and later feeds the outcome back through
//! [`EventCorrelator::complete_body`].
//!
//! Per-resource failures (fetch errors, undecodable bodies) are recorded on
//! the response record and never surface as errors.

use std::collections::{HashMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, trace, warn};
use serde::Serialize;
use uuid::Uuid;

use super::categorizer::classify;
use super::events::CaptureEvent;
use super::path_mapper::to_path;
use super::types::{
    BodyEncoding, Category, Direction, FetchedBody, FilterSet, FrameRecord, RequestId,
    RequestRecord, ResourceEntry, ResponseRecord,
};

/// Reason recorded when a fetched base64 body does not decode.
pub const BODY_DECODE_FAILED: &str = "body_decode_failed";

/// One correlated exchange as listed in the packets metadata document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlated<'a> {
    pub request_id: &'a str,
    pub request: &'a RequestRecord,
    pub response: Option<&'a ResponseRecord>,
    #[serde(rename = "websocket")]
    pub frames: Option<&'a [FrameRecord]>,
}

#[derive(Debug, Default)]
pub struct EventCorrelator {
    session_id: Uuid,
    filters: FilterSet,
    requests: HashMap<RequestId, RequestRecord>,
    /// Request ids in arrival order.
    request_order: Vec<RequestId>,
    responses: HashMap<RequestId, ResponseRecord>,
    frames: HashMap<RequestId, Vec<FrameRecord>>,
    resources: Vec<ResourceEntry>,
    /// Ids that already produced a resource entry.
    captured: HashSet<RequestId>,
    /// Ids with a body fetch in flight.
    pending: HashSet<RequestId>,
}

impl EventCorrelator {
    pub fn new(session_id: Uuid, filters: FilterSet) -> Self {
        Self {
            session_id,
            filters,
            ..Default::default()
        }
    }

    pub fn filters(&self) -> FilterSet {
        self.filters
    }

    /// Applies one inbound event.
    ///
    /// Returns the request id whose body should be fetched, if any.
    pub fn apply(&mut self, event: CaptureEvent) -> Option<RequestId> {
        match event {
            CaptureEvent::RequestSent { request_id, request } => {
                if self.requests.contains_key(&request_id) {
                    debug!(
                        "[{}] Ignoring repeated request for {}",
                        self.session_id, request_id
                    );
                    return None;
                }
                trace!("[{}] {} {} {}", self.session_id, request_id, request.method, request.url);
                self.request_order.push(request_id.clone());
                self.requests.insert(request_id, request);
                None
            }
            CaptureEvent::ResponseReceived {
                request_id,
                response,
            } => {
                let mime = Some(response.mime_type.as_str()).filter(|m| !m.is_empty());
                let category = classify(&response.url, mime);
                trace!(
                    "[{}] {} -> {} ({})",
                    self.session_id,
                    request_id,
                    response.status,
                    category
                );
                self.responses
                    .insert(request_id, ResponseRecord::from_info(response, category));
                None
            }
            CaptureEvent::LoadingFinished { request_id } => self.on_loading_finished(request_id),
            CaptureEvent::MessageFrameSent { request_id, frame } => {
                self.frames_entry(&request_id)
                    .push(FrameRecord::new(Direction::Sent, frame));
                None
            }
            CaptureEvent::MessageFrameReceived { request_id, frame } => {
                self.frames_entry(&request_id)
                    .push(FrameRecord::new(Direction::Received, frame));
                None
            }
            CaptureEvent::BodyFetched {
                request_id, result, ..
            } => {
                self.complete_body(&request_id, result);
                None
            }
            CaptureEvent::Detached => None,
        }
    }

    fn on_loading_finished(&mut self, request_id: RequestId) -> Option<RequestId> {
        let category = self
            .responses
            .get(&request_id)
            .map(|r| r.category)
            .unwrap_or(Category::Other);

        if !self.filters.wants_body(category) {
            return None;
        }
        if self.captured.contains(&request_id) || !self.pending.insert(request_id.clone()) {
            debug!(
                "[{}] Body for {} already requested",
                self.session_id, request_id
            );
            return None;
        }
        Some(request_id)
    }

    /// Records the outcome of a body fetch. Safe to call more than once per
    /// request id: the first recorded body wins and a resource entry is
    /// produced at most once.
    pub fn complete_body(&mut self, request_id: &str, result: Result<FetchedBody, String>) {
        self.pending.remove(request_id);

        let recorded = self.captured.contains(request_id)
            || self
                .responses
                .get(request_id)
                .is_some_and(|r| r.body.is_some());
        if recorded {
            debug!(
                "[{}] Body for {} already recorded",
                self.session_id, request_id
            );
            return;
        }

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(reason) => {
                warn!(
                    "[{}] Body unavailable for {}: {}",
                    self.session_id, request_id, reason
                );
                if let Some(response) = self.responses.get_mut(request_id) {
                    response.body = None;
                    response.body_encoding = None;
                    response.body_unavailable_reason = Some(reason);
                }
                return;
            }
        };

        let decoded = decode_body(&fetched);
        if !self.responses.contains_key(request_id) {
            trace!(
                "[{}] Body for {} arrived without a response",
                self.session_id, request_id
            );
            let url = self
                .requests
                .get(request_id)
                .map(|r| r.url.clone())
                .unwrap_or_default();
            self.responses
                .insert(request_id.to_string(), ResponseRecord::unanswered(url));
        }
        if let Some(response) = self.responses.get_mut(request_id) {
            response.body = Some(fetched.body);
            response.body_encoding = Some(fetched.encoding);
            response.body_unavailable_reason = match decoded {
                Ok(_) => None,
                Err(_) => Some(BODY_DECODE_FAILED.to_string()),
            };
        }

        let bytes = match decoded {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "[{}] Undecodable body for {}: {}",
                    self.session_id, request_id, e
                );
                return;
            }
        };

        let response = self.responses.get(request_id);
        let category = response.map(|r| r.category).unwrap_or(Category::Other);
        if !self.filters.selects(category) {
            return;
        }
        let url = response
            .map(|r| r.url.clone())
            .or_else(|| self.requests.get(request_id).map(|r| r.url.clone()))
            .unwrap_or_default();
        let mime_type = response.map(|r| r.mime_type.clone()).unwrap_or_default();
        let source = if url.is_empty() { request_id } else { url.as_str() };
        let path = to_path(
            source,
            Some(mime_type.as_str()).filter(|m| !m.is_empty()),
            category,
        );

        debug!(
            "[{}] Captured {} ({} bytes) as {}",
            self.session_id,
            request_id,
            bytes.len(),
            path
        );
        self.resources.push(ResourceEntry {
            request_id: request_id.to_string(),
            path,
            bytes,
            encoding: fetched.encoding,
            status: response.map(|r| r.status).unwrap_or(0),
            mime_type,
            url,
        });
        self.captured.insert(request_id.to_string());
    }

    /// Frame sequence for `request_id`, created empty on first use.
    pub fn frames_entry(&mut self, request_id: &str) -> &mut Vec<FrameRecord> {
        self.frames.entry(request_id.to_string()).or_default()
    }

    pub fn request(&self, request_id: &str) -> Option<&RequestRecord> {
        self.requests.get(request_id)
    }

    pub fn response(&self, request_id: &str) -> Option<&ResponseRecord> {
        self.responses.get(request_id)
    }

    pub fn frames(&self, request_id: &str) -> Option<&[FrameRecord]> {
        self.frames.get(request_id).map(Vec::as_slice)
    }

    pub fn resources(&self) -> &[ResourceEntry] {
        &self.resources
    }

    pub fn pending_fetches(&self) -> usize {
        self.pending.len()
    }

    /// Every known request, in arrival order, with its response and frames.
    pub fn correlated(&self) -> impl Iterator<Item = Correlated<'_>> {
        self.request_order.iter().filter_map(move |id| {
            self.requests.get(id).map(|request| Correlated {
                request_id: id,
                request,
                response: self.responses.get(id),
                frames: self.frames.get(id).map(Vec::as_slice),
            })
        })
    }

    /// Drops every map and list.
    pub fn clear(&mut self) {
        self.requests.clear();
        self.request_order.clear();
        self.responses.clear();
        self.frames.clear();
        self.resources.clear();
        self.captured.clear();
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
            && self.responses.is_empty()
            && self.frames.is_empty()
            && self.resources.is_empty()
            && self.pending.is_empty()
    }
}

fn decode_body(fetched: &FetchedBody) -> Result<Vec<u8>, base64::DecodeError> {
    match fetched.encoding {
        BodyEncoding::Raw => Ok(fetched.body.as_bytes().to_vec()),
        BodyEncoding::Base64 => BASE64.decode(fetched.body.as_bytes()),
    }
}
