//! Diameter at breast height and the tree locator.
//!
//! The DBH comes from the fully validated section closest to breast height,
//! within a tolerance window. A candidate is cross-checked for coherence
//! against its accepted neighbors: a diameter far from the local taper trend
//! is a fit artifact, not a stem. Without a trustworthy section the tree
//! still gets a locator by projecting the axis to breast height, with no
//! diameter.

use crate::axis::Axis;
use crate::types::{DbhEstimate, DbhProvenance, SectionRecord};
use serde::{Deserialize, Serialize};

/// Knobs for DBH derivation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DbhParams {
    /// Breast height above ground (meters).
    pub breast_height: f64,
    /// Sections farther than this from breast height are not DBH candidates.
    pub height_tolerance: f64,
    /// Maximum absolute radius disagreement with the neighbor trend (meters).
    pub coherence_tolerance: f64,
}

impl Default for DbhParams {
    fn default() -> Self {
        Self {
            breast_height: 1.3,
            height_tolerance: 0.2,
            coherence_tolerance: 0.05,
        }
    }
}

/// Derive the DBH estimate for one tree from its section records.
pub fn derive_dbh(sections: &[SectionRecord], axis: &Axis, params: &DbhParams) -> DbhEstimate {
    let candidate = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            s.status.is_accepted()
                && s.checks.all_passed()
                && (s.target_height - params.breast_height).abs() <= params.height_tolerance
        })
        .min_by(|(_, a), (_, b)| {
            let da = (a.target_height - params.breast_height).abs();
            let db = (b.target_height - params.breast_height).abs();
            // Equidistant above/below resolves to the lower section.
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.target_height
                        .partial_cmp(&b.target_height)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

    if let Some((idx, section)) = candidate {
        if let Some(circle) = section.circle {
            if coherent_with_neighbors(sections, idx, circle.radius, params) {
                return DbhEstimate {
                    diameter: Some(circle.radius * 2.0),
                    provenance: DbhProvenance::Measured,
                    location: circle.center,
                    section_height: Some(section.target_height),
                };
            }
        }
    }

    let p = axis.point_at_height(params.breast_height);
    DbhEstimate {
        diameter: None,
        provenance: DbhProvenance::AxisFallback,
        location: [p.x, p.y],
        section_height: None,
    }
}

/// Compare the candidate radius against the radius the accepted neighbors
/// predict at its height. With neighbors on both sides the prediction is the
/// linear interpolation between them; with one side only, that neighbor's
/// radius. A lone candidate has nothing to contradict it and passes.
fn coherent_with_neighbors(
    sections: &[SectionRecord],
    idx: usize,
    radius: f64,
    params: &DbhParams,
) -> bool {
    let height = sections[idx].target_height;
    let accepted = |s: &&SectionRecord| s.status.is_accepted() && s.circle.is_some();

    let below = sections[..idx]
        .iter()
        .rev()
        .find(accepted)
        .and_then(|s| s.circle.map(|c| (s.target_height, c.radius)));
    let above = sections[idx + 1..]
        .iter()
        .find(accepted)
        .and_then(|s| s.circle.map(|c| (s.target_height, c.radius)));

    let predicted = match (below, above) {
        (Some((h0, r0)), Some((h1, r1))) => {
            let span = h1 - h0;
            if span.abs() < 1e-12 {
                (r0 + r1) * 0.5
            } else {
                r0 + (r1 - r0) * (height - h0) / span
            }
        }
        (Some((_, r)), None) | (None, Some((_, r))) => r,
        (None, None) => return true,
    };
    (radius - predicted).abs() <= params.coherence_tolerance
}
