//! Goodness-of-fit tests applied to a fitted section circle.
//!
//! A real stem slice is a hollow ring: points concentrate near the fitted
//! circle, spread around most of its circumference, with a plausible radius
//! and a center close to the stem axis. Each test probes one of those
//! properties; the pass/fail flags travel on the section record.

use crate::types::FittedCircle;

/// Number of slice points strictly inside the shrunken inner circle of
/// radius `fraction × r`. A filled-in slice (noise, branch whorl) piles
/// points here; a clean shell leaves it almost empty.
pub fn inner_circle_points(xy: &[[f64; 2]], circle: &FittedCircle, fraction: f64) -> usize {
    let r_in = circle.radius * fraction;
    let r_in2 = r_in * r_in;
    xy.iter()
        .filter(|p| {
            let dx = p[0] - circle.center[0];
            let dy = p[1] - circle.center[1];
            dx * dx + dy * dy < r_in2
        })
        .count()
}

/// Fraction of angular sectors (out of `sector_count`) that contain at least
/// one point within `ring_width` of the fitted circle. Low occupancy means a
/// partial or occluded scan.
pub fn sector_occupancy(
    xy: &[[f64; 2]],
    circle: &FittedCircle,
    sector_count: usize,
    ring_width: f64,
) -> f64 {
    if sector_count == 0 {
        return 0.0;
    }
    let mut occupied = vec![false; sector_count];
    for p in xy {
        let dx = p[0] - circle.center[0];
        let dy = p[1] - circle.center[1];
        let rho = (dx * dx + dy * dy).sqrt();
        if (rho - circle.radius).abs() > ring_width {
            continue;
        }
        let angle = dy.atan2(dx).rem_euclid(std::f64::consts::TAU);
        let sector = ((angle / std::f64::consts::TAU) * sector_count as f64) as usize;
        occupied[sector.min(sector_count - 1)] = true;
    }
    occupied.iter().filter(|&&o| o).count() as f64 / sector_count as f64
}

/// Whether the fitted radius is a plausible stem radius.
pub fn radius_within_bounds(radius: f64, min_radius: f64, max_radius: f64) -> bool {
    radius >= min_radius && radius <= max_radius
}

/// Horizontal offset between the fitted center and the axis-projected
/// center at the slice height.
pub fn center_deviation(circle: &FittedCircle, axis_center: [f64; 2]) -> f64 {
    let dx = circle.center[0] - axis_center[0];
    let dy = circle.center[1] - axis_center[1];
    (dx * dx + dy * dy).sqrt()
}
