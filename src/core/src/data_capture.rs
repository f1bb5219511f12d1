//! Network capture: event model, classification, path mapping and
//! per-request correlation.

pub mod categorizer;
pub mod correlator;
pub mod events;
pub mod path_mapper;
pub mod types;

pub use categorizer::classify;
pub use correlator::EventCorrelator;
pub use events::{BodyRequest, CaptureEvent, InboundEvent};
pub use path_mapper::to_path;
pub use types::{Category, FilterSet, RequestId, ResourceEntry};
