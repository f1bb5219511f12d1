//! Common data types used across the data_capture subsystem.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque correlation key assigned by the inspection source.
pub type RequestId = String;

/// Header mapping in arrival order.
pub type Headers = Map<String, Value>;

/// Resource class used for filtering and extension inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Js,
    Css,
    Html,
    Image,
    Video,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Js => "js",
            Category::Css => "css",
            Category::Html => "html",
            Category::Image => "image",
            Category::Video => "video",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean filter flags selected when a session starts.
///
/// `packets` is not a category: it asks for the correlated metadata document
/// and forces body fetches for every finished response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub js: bool,
    pub css: bool,
    pub html: bool,
    pub image: bool,
    pub video: bool,
    pub packets: bool,
    pub other: bool,
}

impl FilterSet {
    /// Whether resources of `category` are archived as files.
    pub fn selects(&self, category: Category) -> bool {
        match category {
            Category::Js => self.js,
            Category::Css => self.css,
            Category::Html => self.html,
            Category::Image => self.image,
            Category::Video => self.video,
            Category::Other => self.other,
        }
    }

    /// Whether a finished response of `category` needs its body fetched.
    pub fn wants_body(&self, category: Category) -> bool {
        self.selects(category) || self.packets
    }
}

impl FromStr for FilterSet {
    type Err = String;

    /// Parses a comma separated flag list such as `js,css,packets`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut filters = FilterSet::default();
        for flag in s.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match flag.to_ascii_lowercase().as_str() {
                "js" => filters.js = true,
                "css" => filters.css = true,
                "html" => filters.html = true,
                "image" => filters.image = true,
                "video" => filters.video = true,
                "packets" => filters.packets = true,
                "other" => filters.other = true,
                unknown => return Err(format!("unknown filter flag: {}", unknown)),
            }
        }
        Ok(filters)
    }
}

/// Outgoing request as first announced by the inspection source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub post_data: Option<String>,
    pub timestamp: f64,
    pub initiator: Option<Value>,
}

/// Response metadata carried by a `ResponseReceived` event, before
/// classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub mime_type: String,
    pub protocol: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    Raw,
    Base64,
}

/// Classified response, enriched in place once its body is fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub mime_type: String,
    pub protocol: String,
    pub category: Category,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_encoding: Option<BodyEncoding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_unavailable_reason: Option<String>,
}

impl ResponseRecord {
    pub fn from_info(info: ResponseInfo, category: Category) -> Self {
        Self {
            url: info.url,
            status: info.status,
            status_text: info.status_text,
            headers: info.headers,
            mime_type: info.mime_type,
            protocol: info.protocol,
            category,
            resource_type: info.resource_type,
            body: None,
            body_encoding: None,
            body_unavailable_reason: None,
        }
    }

    /// Placeholder for a body that arrived before (or without) its response.
    pub fn unanswered(url: String) -> Self {
        Self::from_info(
            ResponseInfo {
                url,
                status: 0,
                status_text: String::new(),
                headers: Headers::new(),
                mime_type: String::new(),
                protocol: String::new(),
                resource_type: String::new(),
            },
            Category::Other,
        )
    }
}

/// Body returned by the inspection source for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub body: String,
    pub encoding: BodyEncoding,
}

/// Direction of a message-stream frame relative to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Frame fields as delivered by the inspection source.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePayload {
    pub timestamp: f64,
    pub opcode: u8,
    pub mask: bool,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub direction: Direction,
    pub timestamp: f64,
    pub opcode: u8,
    pub mask: bool,
    #[serde(rename = "payloadData")]
    pub payload: String,
}

impl FrameRecord {
    pub fn new(direction: Direction, payload: FramePayload) -> Self {
        Self {
            direction,
            timestamp: payload.timestamp,
            opcode: payload.opcode,
            mask: payload.mask,
            payload: payload.payload,
        }
    }
}

/// A response body accepted under the active filter, ready for archiving.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    pub request_id: RequestId,
    pub path: String,
    pub bytes: Vec<u8>,
    pub encoding: BodyEncoding,
    pub mime_type: String,
    pub url: String,
    pub status: u16,
}
