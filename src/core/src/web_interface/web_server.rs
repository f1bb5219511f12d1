use std::net::SocketAddr;

use log::info;
use warp::Filter;

use super::routes::control_routes;
use crate::controller::ControlHandle;
use crate::data_capture::types::FilterSet;
use crate::error_handling::types::WebError;

/// HTTP control surface in front of the controller.
pub struct WebServer {
    handle: ControlHandle,
    default_filters: FilterSet,
}

impl WebServer {
    pub fn new(handle: ControlHandle, default_filters: FilterSet) -> Self {
        Self {
            handle,
            default_filters,
        }
    }

    /// Serves until the process ends.
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        let routes = control_routes(self.handle.clone(), self.default_filters)
            .with(warp::log("panima::web"));
        let (bound, server) = warp::serve(routes)
            .try_bind_ephemeral(addr)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        info!("Control surface listening on http://{}", bound);
        server.await;
        Ok(())
    }
}
