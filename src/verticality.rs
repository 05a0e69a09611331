//! Local verticality scores from radius-neighborhood eigenanalysis.
//!
//! For each voxel the covariance of the neighboring voxel centroids within a
//! fixed radius is eigendecomposed; the eigenvector of the *smallest*
//! eigenvalue approximates the local surface normal. Verticality is
//! `1 - |normal_z|`: a vertical stem surface has a horizontal normal and
//! scores near 1, flat ground scores near 0. Voxels with too few neighbors
//! are scored 0 and treated as noise rather than failing.
//!
//! Scores depend only on geometric neighbor sets, never on iteration order,
//! so the parallel and sequential paths agree bitwise.

use crate::voxel::VoxelGrid;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Neighborhood definition for the verticality estimator.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalityParams {
    /// Radius of the covariance neighborhood (meters).
    pub radius: f64,
    /// Below this neighbor count a voxel scores 0 (noise).
    pub min_neighbors: usize,
}

impl Default for VerticalityParams {
    fn default() -> Self {
        Self {
            radius: 0.1,
            min_neighbors: 4,
        }
    }
}

/// Verticality score in `[0, 1]` for every voxel of `grid`.
pub fn voxel_verticality(grid: &VoxelGrid, params: &VerticalityParams) -> Vec<f64> {
    let n = grid.len() as u32;

    #[cfg(feature = "parallel")]
    {
        (0..n)
            .into_par_iter()
            .map(|v| score_voxel(grid, v, params))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n).map(|v| score_voxel(grid, v, params)).collect()
    }
}

fn score_voxel(grid: &VoxelGrid, voxel: u32, params: &VerticalityParams) -> f64 {
    let mut neighbors = Vec::new();
    grid.voxels_within(grid.centroid(voxel), params.radius, &mut neighbors);
    if neighbors.len() < params.min_neighbors {
        return 0.0;
    }

    let mut mean = Vector3::zeros();
    for &nb in &neighbors {
        mean += grid.centroid(nb);
    }
    mean /= neighbors.len() as f64;

    let mut cov = Matrix3::zeros();
    for &nb in &neighbors {
        let d = grid.centroid(nb) - mean;
        cov += d * d.transpose();
    }
    cov /= neighbors.len() as f64;

    let eig = SymmetricEigen::new(cov);
    let mut smallest = 0;
    for i in 1..3 {
        if eig.eigenvalues[i] < eig.eigenvalues[smallest] {
            smallest = i;
        }
    }
    let normal = eig.eigenvectors.column(smallest).into_owned();
    (1.0 - normal.z.abs()).clamp(0.0, 1.0)
}
