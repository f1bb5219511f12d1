use serde::{Deserialize, Serialize};
use warp::http::StatusCode;

use crate::error_handling::types::{ControllerError, SessionError};

/// Reply to `POST /start` and `POST /stop`.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// File name of the archive written by a successful stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    pub fn failed(code: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(code.into()),
            archive: None,
        }
    }
}

/// Reply to `GET /status`.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub active: bool,
}

/// Symbolic error code and HTTP status for a failed control call.
pub fn failure(err: &ControllerError) -> (String, StatusCode) {
    match err {
        ControllerError::Session(e) => {
            let status = match e {
                SessionError::AlreadyActive | SessionError::NotActive => StatusCode::CONFLICT,
                SessionError::InvalidSubject(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (e.code().to_string(), status)
        }
        ControllerError::ChannelClosed => (
            "controller_unavailable".to_string(),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        _ => ("internal".to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}
