//! Detector facade: parameter aggregation, validation, and the end-to-end
//! pipeline.

pub mod params;
pub mod pipeline;

pub use params::{ConfigError, DetectorParams};
pub use pipeline::{DetectionError, TreeDetector};
