//! Point-cloud container consumed by the detector.
//!
//! The cloud is an owned array of `(x, y, z)` coordinates plus an optional
//! normalized-height column. Height normalization itself happens upstream;
//! when the column is absent the `z` coordinate doubles as the normalized
//! height (typical for clouds normalized in place).

use nalgebra::Vector3;

/// Fatal input problems detected before the pipeline runs.
#[derive(Clone, Debug, PartialEq)]
pub enum InputError {
    /// The point array is empty.
    EmptyCloud,
    /// The normalized-height column does not match the point count.
    MismatchedColumns { points: usize, heights: usize },
    /// Stripe bounds with `lower >= upper`.
    DegenerateStripe { lower: f64, upper: f64 },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::EmptyCloud => write!(f, "empty point cloud"),
            InputError::MismatchedColumns { points, heights } => write!(
                f,
                "normalized-height column has {heights} entries for {points} points"
            ),
            InputError::DegenerateStripe { lower, upper } => {
                write!(f, "degenerate stripe bounds ({lower:.3} >= {upper:.3})")
            }
        }
    }
}

impl std::error::Error for InputError {}

/// In-memory forest-plot point cloud.
#[derive(Clone, Debug)]
pub struct PointCloud {
    points: Vec<Vector3<f64>>,
    heights: Option<Vec<f64>>,
}

impl PointCloud {
    /// Build a cloud whose `z` coordinate already holds normalized heights.
    pub fn new(points: Vec<Vector3<f64>>) -> Result<Self, InputError> {
        if points.is_empty() {
            return Err(InputError::EmptyCloud);
        }
        Ok(Self {
            points,
            heights: None,
        })
    }

    /// Build a cloud with a separate normalized-height column (one entry per
    /// point). Useful when `z` holds raw elevations worth preserving.
    pub fn with_normalized_heights(
        points: Vec<Vector3<f64>>,
        heights: Vec<f64>,
    ) -> Result<Self, InputError> {
        if points.is_empty() {
            return Err(InputError::EmptyCloud);
        }
        if heights.len() != points.len() {
            return Err(InputError::MismatchedColumns {
                points: points.len(),
                heights: heights.len(),
            });
        }
        Ok(Self {
            points,
            heights: Some(heights),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    #[inline]
    pub fn point(&self, index: u32) -> &Vector3<f64> {
        &self.points[index as usize]
    }

    /// Normalized height of a point (elevation above ground).
    #[inline]
    pub fn height(&self, index: u32) -> f64 {
        match &self.heights {
            Some(h) => h[index as usize],
            None => self.points[index as usize].z,
        }
    }

    pub fn has_height_column(&self) -> bool {
        self.heights.is_some()
    }

    /// Indices of points whose normalized height lies in `[lower, upper]`.
    pub fn stripe_indices(&self, lower: f64, upper: f64) -> Result<Vec<u32>, InputError> {
        if lower >= upper {
            return Err(InputError::DegenerateStripe { lower, upper });
        }
        let mut out = Vec::new();
        for i in 0..self.points.len() as u32 {
            let h = self.height(i);
            if h >= lower && h <= upper {
                out.push(i);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cloud_is_rejected() {
        assert_eq!(PointCloud::new(Vec::new()).unwrap_err(), InputError::EmptyCloud);
    }

    #[test]
    fn mismatched_height_column_is_rejected() {
        let pts = vec![Vector3::new(0.0, 0.0, 1.0); 3];
        let err = PointCloud::with_normalized_heights(pts, vec![1.0; 2]).unwrap_err();
        assert_eq!(
            err,
            InputError::MismatchedColumns {
                points: 3,
                heights: 2
            }
        );
    }

    #[test]
    fn stripe_selection_uses_height_column() {
        let pts = vec![
            Vector3::new(0.0, 0.0, 100.0),
            Vector3::new(0.0, 0.0, 101.0),
            Vector3::new(0.0, 0.0, 102.0),
        ];
        let cloud = PointCloud::with_normalized_heights(pts, vec![0.5, 1.5, 4.0]).unwrap();
        assert_eq!(cloud.stripe_indices(1.0, 3.0).unwrap(), vec![1]);
    }

    #[test]
    fn degenerate_stripe_bounds_fail_fast() {
        let cloud = PointCloud::new(vec![Vector3::new(0.0, 0.0, 1.0)]).unwrap();
        assert!(matches!(
            cloud.stripe_indices(2.0, 2.0),
            Err(InputError::DegenerateStripe { .. })
        ));
    }
}
