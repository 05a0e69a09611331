//! Detector pipeline driving tree detection end-to-end.
//!
//! The [`TreeDetector`] exposes a simple API: feed a normalized point cloud
//! and get per-tree records with detailed diagnostics. Internally it
//! coordinates the stripe stem search, per-candidate axis fitting, the global
//! point-to-axis scan, and per-tree height, section, and DBH measurement.
//!
//! Typical usage:
//! ```no_run
//! use tree_detector::{DetectorParams, PointCloud, TreeDetector};
//!
//! # fn example(cloud: PointCloud) -> Result<(), tree_detector::DetectionError> {
//! let detector = TreeDetector::new(DetectorParams::default());
//! let report = detector.process_with_diagnostics(&cloud)?;
//! for tree in &report.plot.trees {
//!     println!("tree {} dbh {:?}", tree.id, tree.dbh.diameter);
//! }
//! # Ok(())
//! # }
//! ```

use super::params::{ConfigError, DetectorParams};
use crate::axis::{estimate_axis, Axis};
use crate::cloud::{InputError, PointCloud};
use crate::dbh::derive_dbh;
use crate::diagnostics::{
    AssignStage, AxisStage, DetectionReport, HeightStage, InputDescriptor, PipelineTrace,
    SectionStage, StripeStage, TimingBreakdown,
};
use crate::individualize::{assign_points, tree_height, Assignment};
use crate::sections::measure_tree_sections;
use crate::stripe::extract_stem_candidates;
use crate::types::{PlotResult, TreeRecord};
use log::debug;
use std::fmt;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Anything that can stop a detector run.
#[derive(Debug)]
pub enum DetectionError {
    /// The input cloud is unusable.
    Input(InputError),
    /// The parameter set failed validation.
    Config(ConfigError),
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::Input(e) => write!(f, "input error: {e}"),
            DetectionError::Config(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl std::error::Error for DetectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectionError::Input(e) => Some(e),
            DetectionError::Config(e) => Some(e),
        }
    }
}

impl From<InputError> for DetectionError {
    fn from(e: InputError) -> Self {
        DetectionError::Input(e)
    }
}

impl From<ConfigError> for DetectionError {
    fn from(e: ConfigError) -> Self {
        DetectionError::Config(e)
    }
}

/// Tree detector orchestrating the stripe search, axis fitting, point
/// assignment, and per-tree measurement.
pub struct TreeDetector {
    params: DetectorParams,
}

impl TreeDetector {
    /// Create a detector with the supplied parameters. Validation happens at
    /// `process` time, so a detector can be built and reconfigured freely.
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Run the detector on a normalized cloud, returning a compact result.
    pub fn process(&self, cloud: &PointCloud) -> Result<PlotResult, DetectionError> {
        Ok(self.process_with_diagnostics(cloud)?.plot)
    }

    /// Run the detector and return both the result and a detailed report.
    pub fn process_with_diagnostics(
        &self,
        cloud: &PointCloud,
    ) -> Result<DetectionReport, DetectionError> {
        self.params.validate()?;
        let total_start = Instant::now();
        let mut timings = TimingBreakdown::default();
        debug!(
            "TreeDetector::process start points={} heights={}",
            cloud.len(),
            cloud.has_height_column()
        );

        let stripe_indices = cloud.stripe_indices(
            self.params.stripe.lower_height,
            self.params.stripe.upper_height,
        )?;
        let input = InputDescriptor {
            points: cloud.len(),
            has_height_column: cloud.has_height_column(),
            stripe_points: stripe_indices.len(),
        };

        let stage_start = Instant::now();
        let (candidates, iterations) =
            extract_stem_candidates(cloud, &stripe_indices, &self.params.stripe);
        timings.push("stripe", ms_since(stage_start));
        let stripe_stage = StripeStage {
            iterations,
            candidates: candidates.len(),
        };
        debug!("stripe stage: {} candidates", candidates.len());

        let stage_start = Instant::now();
        let axes: Vec<Axis> = candidates
            .iter()
            .map(|c| estimate_axis(cloud, &c.members, self.params.min_eigen_ratio))
            .collect();
        timings.push("axes", ms_since(stage_start));
        let axis_stage = AxisStage {
            axes: axes.len(),
            low_confidence: axes.iter().filter(|a| a.low_confidence).count(),
        };

        // An empty plot is a valid result, not an error.
        if axes.is_empty() {
            timings.total_ms = ms_since(total_start);
            let plot = PlotResult {
                trees: Vec::new(),
                tree_ids: vec![None; cloud.len()],
                latency_ms: timings.total_ms,
            };
            return Ok(DetectionReport {
                plot,
                trace: PipelineTrace {
                    input,
                    timings,
                    stripe: stripe_stage,
                    axes: axis_stage,
                    assignment: AssignStage {
                        assigned: 0,
                        unassigned: cloud.len(),
                    },
                    heights: HeightStage {
                        measured: 0,
                        missing: 0,
                    },
                    sections: SectionStage::default(),
                },
            });
        }

        let stage_start = Instant::now();
        let assignment = assign_points(cloud, &axes, &self.params.assign);
        timings.push("assign", ms_since(stage_start));
        let assigned = assignment.tree_ids.iter().filter(|t| t.is_some()).count();
        let assign_stage = AssignStage {
            assigned,
            unassigned: cloud.len() - assigned,
        };
        debug!("assignment: {}/{} points assigned", assigned, cloud.len());

        let stage_start = Instant::now();
        let members = assignment.members_per_tree(axes.len());
        let trees = self.measure_trees(cloud, &axes, &members, &assignment);
        timings.push("trees", ms_since(stage_start));

        let measured = trees.iter().filter(|t| t.height.is_some()).count();
        let height_stage = HeightStage {
            measured,
            missing: trees.len() - measured,
        };
        let mut section_stage = SectionStage::default();
        for tree in &trees {
            for s in &tree.sections {
                section_stage.tally(s.status, s.retried);
            }
        }

        timings.total_ms = ms_since(total_start);
        debug!(
            "TreeDetector::process done trees={} total_ms={:.1}",
            trees.len(),
            timings.total_ms
        );
        let plot = PlotResult {
            trees,
            tree_ids: assignment.tree_ids,
            latency_ms: timings.total_ms,
        };
        Ok(DetectionReport {
            plot,
            trace: PipelineTrace {
                input,
                timings,
                stripe: stripe_stage,
                axes: axis_stage,
                assignment: assign_stage,
                heights: height_stage,
                sections: section_stage,
            },
        })
    }

    /// Height, sections, and DBH for every tree. Trees are independent, so
    /// the loop parallelizes over them.
    fn measure_trees(
        &self,
        cloud: &PointCloud,
        axes: &[Axis],
        members: &[Vec<u32>],
        assignment: &Assignment,
    ) -> Vec<TreeRecord> {
        let build = |id: usize| -> TreeRecord {
            let axis = &axes[id];
            let tree_members = &members[id];
            let height = tree_height(cloud, tree_members, &assignment.distances, &self.params.height);
            let tilt_deg = axis.tilt_deg();
            let height_reliable =
                height.is_some() && !axis.low_confidence && tilt_deg <= self.params.height.max_tilt_deg;
            let sections = measure_tree_sections(
                cloud,
                tree_members,
                axis,
                id as u32,
                height,
                &self.params.sections,
            );
            let dbh = derive_dbh(&sections, axis, &self.params.dbh);
            TreeRecord {
                id: id as u32,
                location: dbh.location,
                height,
                height_reliable,
                axis: axis.clone(),
                tilt_deg,
                point_count: tree_members.len(),
                sections,
                dbh,
            }
        };

        #[cfg(feature = "parallel")]
        let trees = (0..axes.len()).into_par_iter().map(build).collect();
        #[cfg(not(feature = "parallel"))]
        let trees = (0..axes.len()).map(build).collect();
        trees
    }
}

fn ms_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::InputError;

    #[test]
    fn config_error_carries_the_field() {
        let mut params = DetectorParams::default();
        params.sections.step = -1.0;
        let detector = TreeDetector::new(params);
        let cloud = PointCloud::new(vec![nalgebra::Vector3::new(0.0, 0.0, 1.0)]).unwrap();
        let err = detector.process(&cloud).unwrap_err();
        assert!(matches!(err, DetectionError::Config(_)));
        assert!(err.to_string().contains("sections.step"));
    }

    #[test]
    fn degenerate_stripe_is_an_input_error() {
        let mut params = DetectorParams::default();
        params.stripe.lower_height = 3.5;
        params.stripe.upper_height = 0.7;
        let detector = TreeDetector::new(params);
        let cloud = PointCloud::new(vec![nalgebra::Vector3::new(0.0, 0.0, 1.0)]).unwrap();
        let err = detector.process(&cloud).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Input(InputError::DegenerateStripe { .. })
        ));
    }

    #[test]
    fn empty_stripe_yields_an_empty_plot() {
        // All points sit below the stripe; nothing to detect, no error.
        let pts: Vec<nalgebra::Vector3<f64>> = (0..50)
            .map(|i| nalgebra::Vector3::new(i as f64 * 0.1, 0.0, 0.1))
            .collect();
        let cloud = PointCloud::new(pts).unwrap();
        let detector = TreeDetector::new(DetectorParams::default());
        let report = detector.process_with_diagnostics(&cloud).unwrap();
        assert!(report.plot.trees.is_empty());
        assert_eq!(report.plot.tree_ids.len(), cloud.len());
        assert!(report.plot.tree_ids.iter().all(|t| t.is_none()));
        assert_eq!(report.trace.stripe.candidates, 0);
    }
}
