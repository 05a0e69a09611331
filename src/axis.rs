//! Stem-axis estimation via principal component analysis.
//!
//! The axis of a stem candidate is the first principal component of its
//! member points, anchored at their centroid. The direction sign is
//! normalized to point upward (non-negative z) so distance and height math
//! downstream never branches on orientation. A near-isotropic covariance
//! (no dominant direction) flags the axis as low-confidence instead of
//! discarding the candidate; the flag travels to the final tree record.

use crate::cloud::PointCloud;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::Serialize;

/// Oriented stem centerline.
#[derive(Clone, Debug, Serialize)]
pub struct Axis {
    /// Centroid of the stem-candidate points.
    pub origin: Vector3<f64>,
    /// Unit direction with `direction.z >= 0`.
    pub direction: Vector3<f64>,
    /// Normalized height of the origin (mean over the candidate points).
    pub origin_height: f64,
    /// Set when the PCA eigenvalues show no dominant direction.
    pub low_confidence: bool,
}

impl Axis {
    /// Perpendicular distance from `p` to the axis line.
    #[inline]
    pub fn distance_to(&self, p: &Vector3<f64>) -> f64 {
        (p - self.origin).cross(&self.direction).norm()
    }

    /// Point on the axis at the given normalized height.
    ///
    /// Falls back to a vertical extension through the origin when the axis
    /// is (numerically) horizontal.
    pub fn point_at_height(&self, height: f64) -> Vector3<f64> {
        let dh = height - self.origin_height;
        if self.direction.z > 1e-6 {
            self.origin + self.direction * (dh / self.direction.z)
        } else {
            Vector3::new(self.origin.x, self.origin.y, self.origin.z + dh)
        }
    }

    /// Deviation of the axis from vertical, in degrees.
    pub fn tilt_deg(&self) -> f64 {
        let horiz = self.direction.xy().norm();
        horiz.atan2(self.direction.z.abs()).to_degrees()
    }
}

/// Fit an [`Axis`] to the candidate member points.
///
/// `min_eigen_ratio` is the dominance threshold: the fit is flagged
/// low-confidence when the largest covariance eigenvalue is less than
/// `min_eigen_ratio` times the second one.
pub fn estimate_axis(cloud: &PointCloud, members: &[u32], min_eigen_ratio: f64) -> Axis {
    let n = members.len().max(1) as f64;

    let mut centroid = Vector3::zeros();
    let mut height_sum = 0.0;
    for &i in members {
        centroid += cloud.point(i);
        height_sum += cloud.height(i);
    }
    centroid /= n;
    let origin_height = height_sum / n;

    let mut cov = Matrix3::zeros();
    for &i in members {
        let d = cloud.point(i) - centroid;
        cov += d * d.transpose();
    }
    cov /= n;

    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (first, second) = (eig.eigenvalues[order[0]], eig.eigenvalues[order[1]]);

    let mut direction = eig.eigenvectors.column(order[0]).into_owned();
    let mut low_confidence = first < min_eigen_ratio * second || first < 1e-12;
    if direction.norm() < 1e-12 || !direction.x.is_finite() {
        // All members coincide; fall back to a vertical axis.
        direction = Vector3::z();
        low_confidence = true;
    } else {
        direction.normalize_mut();
        if direction.z < 0.0 {
            direction = -direction;
        }
    }

    Axis {
        origin: centroid,
        direction,
        origin_height,
        low_confidence,
    }
}
