use log::{info, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{reply, Filter, Rejection, Reply};

use super::types::{failure, ControlResponse, StatusResponse};
use crate::controller::ControlHandle;
use crate::data_capture::types::FilterSet;

const MAX_BODY: u64 = 16 * 1024;

/// All control routes.
pub fn control_routes(
    handle: ControlHandle,
    default_filters: FilterSet,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    start_route(handle.clone(), default_filters)
        .or(stop_route(handle.clone()))
        .or(status_route(handle))
}

/// POST /start
///
/// Body is a JSON filter set; an empty body falls back to `default_filters`.
pub fn start_route(
    handle: ControlHandle,
    default_filters: FilterSet,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("start")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::bytes())
        .and_then(move |body: Bytes| {
            let handle = handle.clone();
            async move {
                let filters = if body.iter().all(u8::is_ascii_whitespace) {
                    default_filters
                } else {
                    match serde_json::from_slice::<FilterSet>(&body) {
                        Ok(filters) => filters,
                        Err(e) => {
                            warn!("Rejecting start request: {}", e);
                            return Ok::<_, Rejection>(reply::with_status(
                                reply::json(&ControlResponse::failed("bad_request")),
                                StatusCode::BAD_REQUEST,
                            ));
                        }
                    }
                };

                match handle.start(filters).await {
                    Ok(session_id) => {
                        info!("[{}] Started from control surface", session_id);
                        Ok::<_, Rejection>(reply::with_status(
                            reply::json(&ControlResponse::ok()),
                            StatusCode::OK,
                        ))
                    }
                    Err(e) => {
                        let (code, status) = failure(&e);
                        Ok::<_, Rejection>(reply::with_status(
                            reply::json(&ControlResponse::failed(code)),
                            status,
                        ))
                    }
                }
            }
        })
}

/// POST /stop
pub fn stop_route(
    handle: ControlHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("stop")
        .and(warp::path::end())
        .and(warp::post())
        .and_then(move || {
            let handle = handle.clone();
            async move {
                match handle.stop().await {
                    Ok(report) => Ok::<_, Rejection>(reply::with_status(
                        reply::json(&ControlResponse {
                            ok: true,
                            error: None,
                            archive: Some(report.file_name),
                        }),
                        StatusCode::OK,
                    )),
                    Err(e) => {
                        let (code, status) = failure(&e);
                        Ok::<_, Rejection>(reply::with_status(
                            reply::json(&ControlResponse::failed(code)),
                            status,
                        ))
                    }
                }
            }
        })
}

/// GET /status
pub fn status_route(
    handle: ControlHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(move || {
            let handle = handle.clone();
            async move {
                match handle.status().await {
                    Ok(active) => Ok::<_, Rejection>(reply::with_status(
                        reply::json(&StatusResponse { active }),
                        StatusCode::OK,
                    )),
                    Err(e) => {
                        let (code, status) = failure(&e);
                        Ok::<_, Rejection>(reply::with_status(
                            reply::json(&ControlResponse::failed(code)),
                            status,
                        ))
                    }
                }
            }
        })
}
