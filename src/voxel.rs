//! Fixed-resolution voxel grid over point indices.
//!
//! Buckets points into cubic cells keyed by integer coordinates relative to
//! the cloud minimum. The grid is the basis for every density and
//! neighborhood operation downstream: verticality neighborhoods, density
//! clustering, and the coarse height filter all rebuild a grid at their own
//! resolution. Cells are ordered by key after construction so iteration is
//! independent of hash-map internals.

use nalgebra::Vector3;
use std::collections::HashMap;

/// Integer cell coordinates relative to the grid origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoxelKey {
    pub ix: i64,
    pub iy: i64,
    pub iz: i64,
}

/// Voxelized view of a point subset.
///
/// `xy` and `z` resolutions are independent (the stripe stage uses thin
/// cells, the height stage coarse cubes). Member lists hold indices into the
/// parent cloud, so a grid built over a subset still reports global ids.
pub struct VoxelGrid {
    res_xy: f64,
    res_z: f64,
    origin: Vector3<f64>,
    index: HashMap<VoxelKey, u32>,
    keys: Vec<VoxelKey>,
    members: Vec<Vec<u32>>,
    centroids: Vec<Vector3<f64>>,
}

impl VoxelGrid {
    /// Bucket `subset` (or every point when `None`) into cells of
    /// `res_xy × res_xy × res_z`. The representative coordinate of a cell is
    /// the mean of its members.
    pub fn build(
        points: &[Vector3<f64>],
        subset: Option<&[u32]>,
        res_xy: f64,
        res_z: f64,
    ) -> Self {
        let ids: Vec<u32> = match subset {
            Some(ids) => ids.to_vec(),
            None => (0..points.len() as u32).collect(),
        };

        let origin = ids
            .iter()
            .map(|&i| points[i as usize])
            .fold(
                Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                |acc, p| Vector3::new(acc.x.min(p.x), acc.y.min(p.y), acc.z.min(p.z)),
            );

        let mut cells: HashMap<VoxelKey, Vec<u32>> = HashMap::new();
        for &i in &ids {
            let key = key_for(&points[i as usize], &origin, res_xy, res_z);
            cells.entry(key).or_default().push(i);
        }

        let mut keys: Vec<VoxelKey> = cells.keys().copied().collect();
        keys.sort_unstable();

        let mut index = HashMap::with_capacity(keys.len());
        let mut members = Vec::with_capacity(keys.len());
        let mut centroids = Vec::with_capacity(keys.len());
        for (slot, key) in keys.iter().enumerate() {
            let ids = cells.remove(key).unwrap_or_default();
            let mut sum = Vector3::zeros();
            for &i in &ids {
                sum += points[i as usize];
            }
            centroids.push(sum / ids.len().max(1) as f64);
            members.push(ids);
            index.insert(*key, slot as u32);
        }

        Self {
            res_xy,
            res_z,
            origin,
            index,
            keys,
            members,
            centroids,
        }
    }

    /// Number of occupied voxels.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Mean coordinate of the voxel's member points.
    #[inline]
    pub fn centroid(&self, voxel: u32) -> &Vector3<f64> {
        &self.centroids[voxel as usize]
    }

    pub fn centroids(&self) -> &[Vector3<f64>] {
        &self.centroids
    }

    /// Parent-cloud indices of the voxel's member points.
    #[inline]
    pub fn members(&self, voxel: u32) -> &[u32] {
        &self.members[voxel as usize]
    }

    /// Voxel indices whose centroid lies within `radius` of `center`.
    ///
    /// Scans the cube of cells overlapping the ball, then applies the exact
    /// centroid distance. The query point itself need not belong to the grid.
    pub fn voxels_within(&self, center: &Vector3<f64>, radius: f64, out: &mut Vec<u32>) {
        out.clear();
        let r2 = radius * radius;
        for key in self.key_range(center, radius) {
            if let Some(&slot) = self.index.get(&key) {
                if (self.centroids[slot as usize] - center).norm_squared() <= r2 {
                    out.push(slot);
                }
            }
        }
    }

    /// Member point indices within `radius` of `center` (exact distance on
    /// the member coordinates, not the centroids).
    pub fn points_within(
        &self,
        points: &[Vector3<f64>],
        center: &Vector3<f64>,
        radius: f64,
        out: &mut Vec<u32>,
    ) {
        out.clear();
        let r2 = radius * radius;
        for key in self.key_range(center, radius) {
            if let Some(&slot) = self.index.get(&key) {
                for &i in &self.members[slot as usize] {
                    if (points[i as usize] - center).norm_squared() <= r2 {
                        out.push(i);
                    }
                }
            }
        }
    }

    fn key_range(&self, center: &Vector3<f64>, radius: f64) -> impl Iterator<Item = VoxelKey> {
        let lo = key_for(
            &Vector3::new(center.x - radius, center.y - radius, center.z - radius),
            &self.origin,
            self.res_xy,
            self.res_z,
        );
        let hi = key_for(
            &Vector3::new(center.x + radius, center.y + radius, center.z + radius),
            &self.origin,
            self.res_xy,
            self.res_z,
        );
        (lo.ix..=hi.ix).flat_map(move |ix| {
            (lo.iy..=hi.iy)
                .flat_map(move |iy| (lo.iz..=hi.iz).map(move |iz| VoxelKey { ix, iy, iz }))
        })
    }
}

#[inline]
fn key_for(p: &Vector3<f64>, origin: &Vector3<f64>, res_xy: f64, res_z: f64) -> VoxelKey {
    VoxelKey {
        ix: ((p.x - origin.x) / res_xy).floor() as i64,
        iy: ((p.y - origin.y) / res_xy).floor() as i64,
        iz: ((p.z - origin.z) / res_z).floor() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(0.01, 0.01, 0.01),
            Vector3::new(0.02, 0.02, 0.02), // same cell as above at res 0.1
            Vector3::new(0.55, 0.01, 0.01),
            Vector3::new(5.0, 5.0, 5.0),
        ]
    }

    #[test]
    fn points_sharing_a_cell_are_grouped() {
        let pts = sample_points();
        let grid = VoxelGrid::build(&pts, None, 0.1, 0.1);
        assert_eq!(grid.len(), 3);
        let slot = (0..grid.len() as u32)
            .find(|&v| grid.members(v).len() == 2)
            .expect("expected one cell with two members");
        assert_eq!(grid.members(slot), &[0, 1]);
        let c = grid.centroid(slot);
        assert!((c.x - 0.015).abs() < 1e-12);
    }

    #[test]
    fn subset_build_keeps_global_indices() {
        let pts = sample_points();
        let grid = VoxelGrid::build(&pts, Some(&[2, 3]), 0.1, 0.1);
        assert_eq!(grid.len(), 2);
        let mut all: Vec<u32> = (0..grid.len() as u32)
            .flat_map(|v| grid.members(v).to_vec())
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec![2, 3]);
    }

    #[test]
    fn radius_query_finds_neighbor_cells() {
        let pts = sample_points();
        let grid = VoxelGrid::build(&pts, None, 0.1, 0.1);
        let mut out = Vec::new();
        grid.voxels_within(&Vector3::new(0.0, 0.0, 0.0), 1.0, &mut out);
        assert_eq!(out.len(), 2); // far point at (5,5,5) excluded

        let mut pts_out = Vec::new();
        grid.points_within(&pts, &Vector3::new(0.0, 0.0, 0.0), 0.1, &mut pts_out);
        pts_out.sort_unstable();
        assert_eq!(pts_out, vec![0, 1]);
    }

    #[test]
    fn anisotropic_resolution_splits_on_z() {
        let pts = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.4)];
        let grid = VoxelGrid::build(&pts, None, 1.0, 0.1);
        assert_eq!(grid.len(), 2);
    }
}
