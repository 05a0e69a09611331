//! Least-squares circle fit.
//!
//! Kåsa's algebraic formulation: each point gives the linear equation
//! `2cx·x + 2cy·y + (r² − cx² − cy²) = x² + y²`, solved in the
//! least-squares sense through the 3×3 normal equations. Minimizing the
//! algebraic residual is stable for the thin, nearly complete rings a stem
//! slice produces and needs no iteration.

use crate::types::FittedCircle;
use nalgebra::{Matrix3, Vector3};

/// Fit a circle to 2D points. Returns `None` for fewer than three points or
/// a degenerate configuration (collinear points, non-positive radius).
pub fn fit_circle(xy: &[[f64; 2]]) -> Option<FittedCircle> {
    if xy.len() < 3 {
        return None;
    }

    let mut m = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    for p in xy {
        let (x, y) = (p[0], p[1]);
        let row = Vector3::new(2.0 * x, 2.0 * y, 1.0);
        let b = x * x + y * y;
        m += row * row.transpose();
        rhs += row * b;
    }

    let sol = m.lu().solve(&rhs)?;
    let (cx, cy, c) = (sol[0], sol[1], sol[2]);
    let r2 = c + cx * cx + cy * cy;
    if !r2.is_finite() || r2 <= 0.0 {
        return None;
    }
    Some(FittedCircle {
        center: [cx, cy],
        radius: r2.sqrt(),
    })
}
