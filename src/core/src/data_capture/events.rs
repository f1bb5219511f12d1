//! Inbound capture events and their decoding from DevTools protocol messages.
//!
//! The inspection source speaks the Chrome DevTools protocol: every
//! notification is a `{ "method": ..., "params": ... }` object. Only the
//! network notifications the correlator cares about are decoded; any other
//! method yields `None` and is dropped by the caller.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::types::{FetchedBody, FramePayload, Headers, RequestId, RequestRecord, ResponseInfo};

pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
pub const LOADING_FINISHED: &str = "Network.loadingFinished";
pub const WEB_SOCKET_FRAME_SENT: &str = "Network.webSocketFrameSent";
pub const WEB_SOCKET_FRAME_RECEIVED: &str = "Network.webSocketFrameReceived";
pub const GET_RESPONSE_BODY: &str = "Network.getResponseBody";
pub const INSPECTOR_DETACHED: &str = "Inspector.detached";

/// Reason recorded when the inspection source could not return a body.
pub const BODY_FETCH_FAILED: &str = "getResponseBody_failed";

/// One tagged event from the inspection source, or a body fetch completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    RequestSent {
        request_id: RequestId,
        request: RequestRecord,
    },
    ResponseReceived {
        request_id: RequestId,
        response: ResponseInfo,
    },
    LoadingFinished {
        request_id: RequestId,
    },
    MessageFrameSent {
        request_id: RequestId,
        frame: FramePayload,
    },
    MessageFrameReceived {
        request_id: RequestId,
        frame: FramePayload,
    },
    /// Completion of a body fetch issued by session `session_id`.
    BodyFetched {
        session_id: Uuid,
        request_id: RequestId,
        result: Result<FetchedBody, String>,
    },
    /// The inspection link to the subject was lost.
    Detached,
}

/// A capture event tagged with the subject it was observed on.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub subject_id: String,
    pub event: CaptureEvent,
}

impl InboundEvent {
    pub fn new(subject_id: impl Into<String>, event: CaptureEvent) -> Self {
        Self {
            subject_id: subject_id.into(),
            event,
        }
    }
}

/// Outgoing request for a response body, answered with
/// [`CaptureEvent::BodyFetched`] carrying the same session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyRequest {
    pub session_id: Uuid,
    pub subject_id: String,
    pub request_id: RequestId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestWillBeSentParams {
    request_id: RequestId,
    request: WireRequest,
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    initiator: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    url: String,
    method: String,
    #[serde(default)]
    headers: Option<Headers>,
    #[serde(default)]
    post_data: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseReceivedParams {
    request_id: RequestId,
    #[serde(default, rename = "type")]
    resource_type: Option<String>,
    response: WireResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    url: String,
    status: u16,
    #[serde(default)]
    status_text: String,
    #[serde(default)]
    headers: Option<Headers>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadingFinishedParams {
    request_id: RequestId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebSocketFrameParams {
    request_id: RequestId,
    #[serde(default)]
    timestamp: f64,
    response: WireFrame,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFrame {
    opcode: u8,
    #[serde(default)]
    mask: bool,
    #[serde(default)]
    payload_data: String,
}

/// Result payload of `Network.getResponseBody`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBodyResult {
    pub body: String,
    #[serde(default)]
    pub base64_encoded: bool,
}

impl From<ResponseBodyResult> for FetchedBody {
    fn from(result: ResponseBodyResult) -> Self {
        use super::types::BodyEncoding;
        FetchedBody {
            body: result.body,
            encoding: if result.base64_encoded {
                BodyEncoding::Base64
            } else {
                BodyEncoding::Raw
            },
        }
    }
}

/// Decodes a DevTools notification into a [`CaptureEvent`].
///
/// Returns `Ok(None)` for methods outside the network lifecycle, and an error
/// when a known method carries malformed params.
pub fn decode(method: &str, params: Value) -> Result<Option<CaptureEvent>, serde_json::Error> {
    let event = match method {
        REQUEST_WILL_BE_SENT => {
            let p: RequestWillBeSentParams = serde_json::from_value(params)?;
            CaptureEvent::RequestSent {
                request_id: p.request_id,
                request: RequestRecord {
                    url: p.request.url,
                    method: p.request.method,
                    headers: p.request.headers.unwrap_or_default(),
                    post_data: p.request.post_data,
                    timestamp: p.timestamp,
                    initiator: p.initiator.filter(|i| !i.is_null()),
                },
            }
        }
        RESPONSE_RECEIVED => {
            let p: ResponseReceivedParams = serde_json::from_value(params)?;
            CaptureEvent::ResponseReceived {
                request_id: p.request_id,
                response: ResponseInfo {
                    url: p.response.url,
                    status: p.response.status,
                    status_text: p.response.status_text,
                    headers: p.response.headers.unwrap_or_default(),
                    mime_type: p.response.mime_type.unwrap_or_default(),
                    protocol: p.response.protocol.unwrap_or_default(),
                    resource_type: p.resource_type.unwrap_or_default(),
                },
            }
        }
        LOADING_FINISHED => {
            let p: LoadingFinishedParams = serde_json::from_value(params)?;
            CaptureEvent::LoadingFinished {
                request_id: p.request_id,
            }
        }
        WEB_SOCKET_FRAME_SENT | WEB_SOCKET_FRAME_RECEIVED => {
            let p: WebSocketFrameParams = serde_json::from_value(params)?;
            let frame = FramePayload {
                timestamp: p.timestamp,
                opcode: p.response.opcode,
                mask: p.response.mask,
                payload: p.response.payload_data,
            };
            if method == WEB_SOCKET_FRAME_SENT {
                CaptureEvent::MessageFrameSent {
                    request_id: p.request_id,
                    frame,
                }
            } else {
                CaptureEvent::MessageFrameReceived {
                    request_id: p.request_id,
                    frame,
                }
            }
        }
        INSPECTOR_DETACHED => CaptureEvent::Detached,
        _ => return Ok(None),
    };
    Ok(Some(event))
}
