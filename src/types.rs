//! Result records emitted by the pipeline.
//!
//! Everything here is plain tabular data for the host application: per-tree
//! records, per-section records with every goodness-of-fit flag (rejected
//! sections are emitted too, never silently dropped), and a point-level
//! tree-id layer for re-attachment to the original cloud. Missing values are
//! explicit `Option`s, never sentinels.

use crate::axis::Axis;
use serde::Serialize;

/// Circle fitted to one horizontal slice.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FittedCircle {
    /// Center in plot coordinates (x, y).
    pub center: [f64; 2],
    /// Radius in meters, always > 0.
    pub radius: f64,
}

/// Outcome of the per-section fit state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// All tests passed on the first fit.
    Accepted,
    /// All tests passed after the single largest-cluster retry.
    AcceptedAfterRetry,
    /// Tests still failed after the retry (or the fit itself failed).
    Rejected,
    /// The slice never held enough points to attempt a fit.
    TooFewPoints,
}

impl SectionStatus {
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            SectionStatus::Accepted | SectionStatus::AcceptedAfterRetry
        )
    }
}

/// Individual goodness-of-fit test outcomes.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SectionChecks {
    /// Few enough points inside the shrunken inner circle (hollow shell).
    pub inner_ok: bool,
    /// Enough angular sectors around the circle contain points.
    pub occupancy_ok: bool,
    /// Radius within the configured plausible bounds.
    pub radius_ok: bool,
    /// Fitted center close to the axis-projected center. Advisory only:
    /// a failure flags the section but never rejects it.
    pub deviation_ok: bool,
}

impl SectionChecks {
    pub fn all_passed(&self) -> bool {
        self.inner_ok && self.occupancy_ok && self.radius_ok && self.deviation_ok
    }
}

/// One measured height slice of one tree. Immutable once computed.
#[derive(Clone, Debug, Serialize)]
pub struct SectionRecord {
    pub tree_id: u32,
    /// Target normalized height of the slice (meters).
    pub target_height: f64,
    /// Fitted circle; `None` when the slice was too small or the fit
    /// degenerate.
    pub circle: Option<FittedCircle>,
    /// Points in the slice used by the recorded fit.
    pub point_count: usize,
    /// Points falling inside the inner validation circle.
    pub inner_points: usize,
    /// Fraction of angular sectors occupied, in `[0, 1]`.
    pub sector_occupancy: f64,
    /// Horizontal offset between fitted center and the axis at this height.
    pub vertical_deviation: Option<f64>,
    pub checks: SectionChecks,
    /// Whether the largest-cluster retry ran.
    pub retried: bool,
    pub status: SectionStatus,
}

/// Where a DBH value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbhProvenance {
    /// Measured from a fully validated section near breast height.
    Measured,
    /// No trustworthy section: location from the axis, no diameter.
    AxisFallback,
}

/// Diameter at breast height plus the tree locator derived with it.
#[derive(Clone, Debug, Serialize)]
pub struct DbhEstimate {
    /// Diameter in meters; absent on axis fallback.
    pub diameter: Option<f64>,
    pub provenance: DbhProvenance,
    /// Tree location (x, y): the DBH section center, or the axis projected
    /// to breast height on fallback.
    pub location: [f64; 2],
    /// Height of the section the diameter came from.
    pub section_height: Option<f64>,
}

/// One detected tree.
#[derive(Clone, Debug, Serialize)]
pub struct TreeRecord {
    pub id: u32,
    /// Location (x, y), from the DBH estimate.
    pub location: [f64; 2],
    /// Total height; `None` when the height cluster was empty.
    pub height: Option<f64>,
    /// Set when the axis was well-conditioned and not overly tilted.
    pub height_reliable: bool,
    pub axis: Axis,
    /// Axis deviation from vertical, degrees.
    pub tilt_deg: f64,
    /// Points assigned to this tree.
    pub point_count: usize,
    pub sections: Vec<SectionRecord>,
    pub dbh: DbhEstimate,
}

/// Full per-plot result.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PlotResult {
    pub trees: Vec<TreeRecord>,
    /// Tree id per input point, aligned with the input cloud.
    pub tree_ids: Vec<Option<u32>>,
    pub latency_ms: f64,
}

impl PlotResult {
    /// Flat view over every section of every tree, in (tree, height) order.
    pub fn sections(&self) -> impl Iterator<Item = &SectionRecord> {
        self.trees.iter().flat_map(|t| t.sections.iter())
    }
}
