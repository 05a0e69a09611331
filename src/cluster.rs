//! Density-based clustering (DBSCAN) with order-independent membership.
//!
//! Core points have at least `min_pts` neighbors (self included) within
//! `eps`; clusters are maximal sets of core points connected through
//! eps-chains, and non-core points within `eps` of a core point join the
//! cluster of their *nearest* core neighbor. The nearest-core rule (ties to
//! the lower cluster id) makes border membership a pure function of the
//! geometry, so cluster membership is invariant under permutation of the
//! input order. Everything else is noise and excluded.

use crate::voxel::VoxelGrid;
use nalgebra::Vector3;

/// Radius / minimum-neighbor rule shared by every clustering call.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DensityParams {
    /// Neighborhood radius (meters).
    pub eps: f64,
    /// Minimum neighbors within `eps` (self included) for a core point.
    pub min_pts: usize,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            eps: 0.08,
            min_pts: 2,
        }
    }
}

/// One density-connected group; member indices refer to the input slice.
#[derive(Clone, Debug)]
pub struct Cluster {
    pub members: Vec<u32>,
    pub centroid: Vector3<f64>,
}

const NOISE: u32 = u32::MAX;

/// Cluster `points` with the given density rule. Empty input yields zero
/// clusters, never an error.
pub fn cluster(points: &[Vector3<f64>], params: &DensityParams) -> Vec<Cluster> {
    if points.is_empty() {
        return Vec::new();
    }

    let grid = VoxelGrid::build(points, None, params.eps, params.eps);
    let n = points.len();

    let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut scratch = Vec::new();
    for i in 0..n {
        grid.points_within(points, &points[i], params.eps, &mut scratch);
        neighbors[i] = scratch.clone();
    }
    let core: Vec<bool> = neighbors.iter().map(|nb| nb.len() >= params.min_pts).collect();

    // Flood-fill over core-core adjacency in ascending index order; labels
    // may depend on order but the resulting partition of core points does not.
    let mut labels = vec![NOISE; n];
    let mut next_label = 0u32;
    let mut queue = Vec::new();
    for seed in 0..n {
        if !core[seed] || labels[seed] != NOISE {
            continue;
        }
        labels[seed] = next_label;
        queue.push(seed as u32);
        while let Some(cur) = queue.pop() {
            for &nb in &neighbors[cur as usize] {
                if core[nb as usize] && labels[nb as usize] == NOISE {
                    labels[nb as usize] = next_label;
                    queue.push(nb);
                }
            }
        }
        next_label += 1;
    }

    // Border points attach to the nearest core neighbor.
    for i in 0..n {
        if core[i] {
            continue;
        }
        let mut best: Option<(f64, u32)> = None;
        for &nb in &neighbors[i] {
            if !core[nb as usize] {
                continue;
            }
            let d = (points[i] - points[nb as usize]).norm_squared();
            let label = labels[nb as usize];
            let candidate = (d, label);
            best = Some(match best {
                None => candidate,
                Some(cur) if candidate < cur => candidate,
                Some(cur) => cur,
            });
        }
        if let Some((_, label)) = best {
            labels[i] = label;
        }
    }

    let mut groups: Vec<Vec<u32>> = vec![Vec::new(); next_label as usize];
    for (i, &label) in labels.iter().enumerate() {
        if label != NOISE {
            groups[label as usize].push(i as u32);
        }
    }

    groups
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(|members| {
            let mut sum = Vector3::zeros();
            for &i in &members {
                sum += points[i as usize];
            }
            let centroid = sum / members.len() as f64;
            Cluster { members, centroid }
        })
        .collect()
}

/// Index of the cluster with the most members, if any.
pub fn largest_cluster(clusters: &[Cluster]) -> Option<usize> {
    clusters
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| c.members.len())
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(cx: f64, cy: f64, n: usize) -> Vec<Vector3<f64>> {
        (0..n)
            .map(|i| {
                let a = i as f64 * 0.7;
                Vector3::new(cx + 0.03 * a.cos(), cy + 0.03 * a.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn two_separated_blobs_form_two_clusters() {
        let mut pts = blob(0.0, 0.0, 20);
        pts.extend(blob(5.0, 0.0, 30));
        let clusters = cluster(
            &pts,
            &DensityParams {
                eps: 0.2,
                min_pts: 3,
            },
        );
        assert_eq!(clusters.len(), 2);
        let mut sizes: Vec<usize> = clusters.iter().map(|c| c.members.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![20, 30]);
        assert_eq!(largest_cluster(&clusters).map(|i| clusters[i].members.len()), Some(30));
    }

    #[test]
    fn isolated_points_are_noise() {
        let mut pts = blob(0.0, 0.0, 10);
        pts.push(Vector3::new(50.0, 50.0, 0.0));
        let clusters = cluster(
            &pts,
            &DensityParams {
                eps: 0.2,
                min_pts: 3,
            },
        );
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 10);
    }

    #[test]
    fn empty_input_yields_zero_clusters() {
        let clusters = cluster(
            &[],
            &DensityParams {
                eps: 0.5,
                min_pts: 2,
            },
        );
        assert!(clusters.is_empty());
    }

    #[test]
    fn membership_is_permutation_invariant() {
        let mut pts = blob(0.0, 0.0, 15);
        pts.extend(blob(3.0, 1.0, 12));
        pts.push(Vector3::new(30.0, 0.0, 0.0));
        let params = DensityParams {
            eps: 0.2,
            min_pts: 3,
        };

        let direct = cluster(&pts, &params);

        let mut shuffled: Vec<(usize, Vector3<f64>)> = pts.iter().copied().enumerate().collect();
        shuffled.reverse();
        shuffled.swap(0, 7);
        shuffled.swap(3, 20);
        let perm_pts: Vec<Vector3<f64>> = shuffled.iter().map(|(_, p)| *p).collect();
        let permuted = cluster(&perm_pts, &params);

        let canon = |clusters: &[Cluster], remap: &dyn Fn(u32) -> u32| -> Vec<Vec<u32>> {
            let mut sets: Vec<Vec<u32>> = clusters
                .iter()
                .map(|c| {
                    let mut m: Vec<u32> = c.members.iter().map(|&i| remap(i)).collect();
                    m.sort_unstable();
                    m
                })
                .collect();
            sets.sort();
            sets
        };
        let identity = canon(&direct, &|i| i);
        let back = canon(&permuted, &|i| shuffled[i as usize].0 as u32);
        assert_eq!(identity, back);
    }
}
