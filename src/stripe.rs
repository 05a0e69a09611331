//! Stem-candidate extraction inside the height stripe.
//!
//! Overview
//! - Voxelize the stripe working set, score each voxel's verticality, and
//!   keep points whose voxel clears the threshold.
//! - Re-voxelize the survivors and density-cluster the voxel centroids;
//!   clusters holding enough member points become stem candidates.
//! - Peel: candidate points are subtracted from the working set before the
//!   next iteration, so later passes focus on the stems still hidden behind
//!   denser ones. The loop stops early once an iteration yields nothing.
//!
//! The working set is an explicit value threaded through each iteration
//! (remaining in, candidates + remaining out); there is no shared mutable
//! stripe state.

use crate::cloud::PointCloud;
use crate::cluster::{self, DensityParams};
use crate::verticality::{voxel_verticality, VerticalityParams};
use crate::voxel::VoxelGrid;
use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Knobs for the iterative stripe stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeParams {
    /// Lower bound of the stripe (normalized height, meters).
    pub lower_height: f64,
    /// Upper bound of the stripe (normalized height, meters).
    pub upper_height: f64,
    /// Horizontal voxel edge length for the stripe stage.
    pub voxel_resolution_xy: f64,
    /// Vertical voxel edge length for the stripe stage.
    pub voxel_resolution_z: f64,
    /// Verticality neighborhood.
    pub verticality: VerticalityParams,
    /// Voxels scoring below this are dropped before clustering.
    pub verticality_threshold: f64,
    /// Density rule applied to the surviving voxel centroids.
    pub density: DensityParams,
    /// Clusters with at most this many member *points* are discarded.
    pub min_cluster_points: usize,
    /// Number of peeling iterations.
    pub iterations: usize,
    /// Optional voxelize-and-cluster denoise pass over the stripe before the
    /// first iteration.
    pub denoise: bool,
    /// Voxel edge length for the denoise pass.
    pub denoise_resolution: f64,
}

impl Default for StripeParams {
    fn default() -> Self {
        Self {
            lower_height: 0.7,
            upper_height: 3.5,
            voxel_resolution_xy: 0.02,
            voxel_resolution_z: 0.02,
            verticality: VerticalityParams::default(),
            verticality_threshold: 0.7,
            density: DensityParams {
                eps: 0.08,
                min_pts: 2,
            },
            min_cluster_points: 1000,
            iterations: 2,
            denoise: false,
            denoise_resolution: 0.15,
        }
    }
}

/// A cluster that survived every stripe filter; seed of one tree.
#[derive(Clone, Debug)]
pub struct StemCandidate {
    /// Indices into the parent cloud.
    pub members: Vec<u32>,
    pub centroid: Vector3<f64>,
}

/// Per-iteration counters surfaced in the pipeline trace.
#[derive(Clone, Debug, Serialize)]
pub struct StripeIteration {
    pub iteration: usize,
    pub working_points: usize,
    pub voxels: usize,
    pub vertical_voxels: usize,
    pub clusters: usize,
    pub candidates: usize,
}

/// Run the iterative stripe loop over `stripe` (indices into `cloud`).
pub fn extract_stem_candidates(
    cloud: &PointCloud,
    stripe: &[u32],
    params: &StripeParams,
) -> (Vec<StemCandidate>, Vec<StripeIteration>) {
    let mut remaining: Vec<u32> = stripe.to_vec();
    if params.denoise {
        let before = remaining.len();
        remaining = denoise(cloud, &remaining, params.denoise_resolution);
        debug!(
            "stripe denoise kept {}/{} points",
            remaining.len(),
            before
        );
    }

    let mut candidates = Vec::new();
    let mut iterations = Vec::new();

    for iteration in 0..params.iterations {
        if remaining.is_empty() {
            break;
        }
        let (new_candidates, stats, next_remaining) =
            run_iteration(cloud, &remaining, iteration, params);
        debug!(
            "stripe iteration {}: {} voxels, {} vertical, {} candidates",
            iteration, stats.voxels, stats.vertical_voxels, stats.candidates
        );
        let produced = new_candidates.len();
        candidates.extend(new_candidates);
        iterations.push(stats);
        remaining = next_remaining;
        if produced == 0 {
            break;
        }
    }

    (candidates, iterations)
}

fn run_iteration(
    cloud: &PointCloud,
    remaining: &[u32],
    iteration: usize,
    params: &StripeParams,
) -> (Vec<StemCandidate>, StripeIteration, Vec<u32>) {
    let grid = VoxelGrid::build(
        cloud.points(),
        Some(remaining),
        params.voxel_resolution_xy,
        params.voxel_resolution_z,
    );
    let scores = voxel_verticality(&grid, &params.verticality);

    let mut survivors: Vec<u32> = Vec::new();
    let mut vertical_voxels = 0usize;
    for v in 0..grid.len() as u32 {
        if scores[v as usize] > params.verticality_threshold {
            vertical_voxels += 1;
            survivors.extend_from_slice(grid.members(v));
        }
    }

    let surv_grid = VoxelGrid::build(
        cloud.points(),
        Some(&survivors),
        params.voxel_resolution_xy,
        params.voxel_resolution_z,
    );
    let clusters = cluster::cluster(surv_grid.centroids(), &params.density);

    let mut new_candidates = Vec::new();
    for c in &clusters {
        let mut members: Vec<u32> = c
            .members
            .iter()
            .flat_map(|&v| surv_grid.members(v).iter().copied())
            .collect();
        if members.len() <= params.min_cluster_points {
            continue;
        }
        members.sort_unstable();
        let mut sum = Vector3::zeros();
        for &i in &members {
            sum += cloud.point(i);
        }
        let centroid = sum / members.len() as f64;
        new_candidates.push(StemCandidate { members, centroid });
    }

    // Peel consumed points from the working set.
    let mut consumed = vec![false; cloud.len()];
    for cand in &new_candidates {
        for &i in &cand.members {
            consumed[i as usize] = true;
        }
    }
    let next_remaining: Vec<u32> = remaining
        .iter()
        .copied()
        .filter(|&i| !consumed[i as usize])
        .collect();

    let stats = StripeIteration {
        iteration,
        working_points: remaining.len(),
        voxels: grid.len(),
        vertical_voxels,
        clusters: clusters.len(),
        candidates: new_candidates.len(),
    };
    (new_candidates, stats, next_remaining)
}

/// Voxelize-and-cluster noise filter: keeps points whose coarse voxel lands
/// in a density cluster of more than two voxels.
fn denoise(cloud: &PointCloud, indices: &[u32], resolution: f64) -> Vec<u32> {
    let grid = VoxelGrid::build(cloud.points(), Some(indices), resolution, resolution);
    let clusters = cluster::cluster(
        grid.centroids(),
        &DensityParams {
            eps: resolution * 2.0,
            min_pts: 2,
        },
    );
    let mut kept = Vec::new();
    for c in &clusters {
        if c.members.len() > 2 {
            for &v in &c.members {
                kept.extend_from_slice(grid.members(v));
            }
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dense hollow cylinder shell centred at (cx, cy).
    fn cylinder(cx: f64, cy: f64, radius: f64, z0: f64, z1: f64) -> Vec<Vector3<f64>> {
        let mut pts = Vec::new();
        let mut z = z0;
        while z < z1 {
            for k in 0..48 {
                let a = k as f64 * std::f64::consts::TAU / 48.0;
                pts.push(Vector3::new(cx + radius * a.cos(), cy + radius * a.sin(), z));
            }
            z += 0.02;
        }
        pts
    }

    fn test_params() -> StripeParams {
        StripeParams {
            lower_height: 0.5,
            upper_height: 3.0,
            min_cluster_points: 200,
            iterations: 2,
            ..StripeParams::default()
        }
    }

    #[test]
    fn single_stem_yields_one_candidate() {
        let pts = cylinder(0.0, 0.0, 0.15, 0.5, 3.0);
        let cloud = PointCloud::new(pts).unwrap();
        let stripe = cloud.stripe_indices(0.5, 3.0).unwrap();
        let (candidates, iterations) = extract_stem_candidates(&cloud, &stripe, &test_params());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].members.len() > 200);
        assert!((candidates[0].centroid.x).abs() < 0.05);
        // Second iteration sees the peeled set and stops without candidates.
        assert!(iterations.len() <= 2);
    }

    #[test]
    fn two_stems_yield_two_candidates() {
        let mut pts = cylinder(0.0, 0.0, 0.15, 0.5, 3.0);
        pts.extend(cylinder(3.0, 0.0, 0.12, 0.5, 3.0));
        let cloud = PointCloud::new(pts).unwrap();
        let stripe = cloud.stripe_indices(0.5, 3.0).unwrap();
        let (candidates, _) = extract_stem_candidates(&cloud, &stripe, &test_params());
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn noise_only_stripe_yields_nothing() {
        // Deterministic pseudo-random scatter, far too sparse for stems.
        let mut state = 0x2545f4914f6cdd1du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        let pts: Vec<Vector3<f64>> = (0..500)
            .map(|_| Vector3::new(next() * 10.0, next() * 10.0, 0.5 + next() * 2.0))
            .collect();
        let cloud = PointCloud::new(pts).unwrap();
        let stripe = cloud.stripe_indices(0.5, 3.0).unwrap();
        let (candidates, _) = extract_stem_candidates(&cloud, &stripe, &test_params());
        assert!(candidates.is_empty());
    }
}
