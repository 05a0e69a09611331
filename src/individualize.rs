//! Tree individualization: point-to-axis assignment and height estimation.
//!
//! Every point in the full cloud is assigned to the axis with the minimum
//! perpendicular distance, subject to a cutoff; points beyond the cutoff of
//! all axes stay unassigned. Equidistant axes (within floating-point
//! tolerance) resolve to the lower tree id, so reruns and permutations give
//! identical assignments. Each point's decision is independent, which makes
//! the scan trivially parallel.
//!
//! Height estimation reuses the density clusterer: assigned points close to
//! the axis are voxelized coarsely and clustered, and the tree height is the
//! maximum normalized height inside the largest cluster. That keeps
//! overhanging branches of neighbors and isolated noise from inflating the
//! height. An empty main cluster reports no height rather than zero.

use crate::axis::Axis;
use crate::cloud::PointCloud;
use crate::cluster::{self, DensityParams};
use crate::voxel::VoxelGrid;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Distance tolerance below which two axes count as equidistant.
const TIE_EPS: f64 = 1e-9;

/// Point-to-axis assignment cutoff.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignParams {
    /// Points farther than this from every axis stay unassigned (meters).
    pub max_distance: f64,
}

impl Default for AssignParams {
    fn default() -> Self {
        Self { max_distance: 15.0 }
    }
}

/// Height-estimation knobs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightParams {
    /// Only assigned points within this distance of the axis contribute.
    pub search_radius: f64,
    /// Coarse voxel edge length for the height cluster.
    pub resolution: f64,
    /// Axes tilted beyond this many degrees get an unreliable-height flag.
    pub max_tilt_deg: f64,
}

impl Default for HeightParams {
    fn default() -> Self {
        Self {
            search_radius: 1.5,
            resolution: 0.3,
            max_tilt_deg: 25.0,
        }
    }
}

/// Result of the global point-to-axis scan.
#[derive(Clone, Debug)]
pub struct Assignment {
    /// Tree id per point; `None` when no axis is within the cutoff.
    pub tree_ids: Vec<Option<u32>>,
    /// Distance to the assigned axis (meaningless when unassigned).
    pub distances: Vec<f64>,
}

impl Assignment {
    /// Member indices per tree, in ascending point order.
    pub fn members_per_tree(&self, tree_count: usize) -> Vec<Vec<u32>> {
        let mut members = vec![Vec::new(); tree_count];
        for (i, id) in self.tree_ids.iter().enumerate() {
            if let Some(id) = id {
                members[*id as usize].push(i as u32);
            }
        }
        members
    }
}

/// Assign every cloud point to its nearest axis within the cutoff.
pub fn assign_points(cloud: &PointCloud, axes: &[Axis], params: &AssignParams) -> Assignment {
    let decide = |p: &nalgebra::Vector3<f64>| -> (Option<u32>, f64) {
        let mut best_id: Option<u32> = None;
        let mut best_d = f64::INFINITY;
        for (id, axis) in axes.iter().enumerate() {
            let d = axis.distance_to(p);
            // Strictly-closer beyond the tolerance wins; ties keep the
            // earlier (lower) id.
            if d + TIE_EPS < best_d {
                best_d = d;
                best_id = Some(id as u32);
            }
        }
        if best_d <= params.max_distance {
            (best_id, best_d)
        } else {
            (None, best_d)
        }
    };

    #[cfg(feature = "parallel")]
    let pairs: Vec<(Option<u32>, f64)> = cloud.points().par_iter().map(decide).collect();
    #[cfg(not(feature = "parallel"))]
    let pairs: Vec<(Option<u32>, f64)> = cloud.points().iter().map(decide).collect();

    let (tree_ids, distances) = pairs.into_iter().unzip();
    Assignment {
        tree_ids,
        distances,
    }
}

/// Height of one tree from its assigned points, or `None` when no point
/// survives the finer filter.
pub fn tree_height(
    cloud: &PointCloud,
    members: &[u32],
    distances: &[f64],
    params: &HeightParams,
) -> Option<f64> {
    let near: Vec<u32> = members
        .iter()
        .copied()
        .filter(|&i| distances[i as usize] <= params.search_radius)
        .collect();
    if near.is_empty() {
        return None;
    }

    let grid = VoxelGrid::build(cloud.points(), Some(&near), params.resolution, params.resolution);
    let clusters = cluster::cluster(
        grid.centroids(),
        &DensityParams {
            eps: params.resolution * 1.9,
            min_pts: 2,
        },
    );

    let main = cluster::largest_cluster(&clusters)?;
    let mut max_h = f64::NEG_INFINITY;
    for &v in &clusters[main].members {
        for &i in grid.members(v) {
            max_h = max_h.max(cloud.height(i));
        }
    }
    max_h.is_finite().then_some(max_h)
}
