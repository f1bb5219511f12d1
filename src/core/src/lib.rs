pub mod archive;
pub mod checksum;
pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod error_handling;
pub mod inspector;
pub mod session_management;
pub mod storage;
pub mod web_interface;

pub use configuration::Config;
pub use controller::{ControlHandle, Controller};
pub use data_capture::types::FilterSet;
