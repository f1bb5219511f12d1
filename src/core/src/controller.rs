//! The single event loop owning the capture session.

pub mod controller_handler;

pub use controller_handler::{ControlCommand, ControlHandle, Controller};
