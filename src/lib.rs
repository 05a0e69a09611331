#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod cloud;
pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod types;

// Stage modules — still public, but considered unstable internals.
pub mod axis;
pub mod cluster;
pub mod dbh;
pub mod individualize;
pub mod sections;
pub mod stripe;
pub mod verticality;
pub mod voxel;

// --- High-level re-exports -------------------------------------------------

// Main entry points: detector + results.
pub use crate::cloud::{InputError, PointCloud};
pub use crate::detector::{ConfigError, DetectionError, DetectorParams, TreeDetector};
pub use crate::types::{DbhEstimate, PlotResult, SectionRecord, TreeRecord};

// High-level diagnostics returned by the detector.
pub use crate::diagnostics::{DetectionReport, PipelineTrace};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use tree_detector::prelude::*;
/// use nalgebra::Vector3;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let points: Vec<Vector3<f64>> = vec![Vector3::new(0.0, 0.0, 1.0); 10];
/// let cloud = PointCloud::new(points)?;
///
/// let detector = TreeDetector::new(DetectorParams::default());
/// let plot = detector.process(&cloud)?;
/// println!("trees={} latency_ms={:.3}", plot.trees.len(), plot.latency_ms);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::cloud::PointCloud;
    pub use crate::{DetectorParams, PlotResult, TreeDetector, TreeRecord};
}
