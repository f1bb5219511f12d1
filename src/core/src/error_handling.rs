//! Error types shared across the capture pipeline.

pub mod types;
