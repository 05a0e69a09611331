//! Parameter types configuring the detector stages.
//!
//! This module aggregates knobs for the stripe extraction, axis fitting,
//! point assignment, height estimation, section measurement, and DBH
//! derivation stages.
//!
//! Defaults target terrestrial scans of mature plots at centimeter point
//! spacing. For tuning, start with the stripe bounds and the section radius
//! limits.

use crate::dbh::DbhParams;
use crate::individualize::{AssignParams, HeightParams};
use crate::sections::SectionParams;
use crate::stripe::StripeParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector-wide parameters controlling the multi-stage pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Stripe stage: voxelization, verticality, clustering, peeling.
    pub stripe: StripeParams,
    /// An axis is flagged low-confidence when the largest covariance
    /// eigenvalue is below this multiple of the second.
    pub min_eigen_ratio: f64,
    /// Point-to-axis assignment.
    pub assign: AssignParams,
    /// Per-tree height estimation.
    pub height: HeightParams,
    /// Per-tree section measurement.
    pub sections: SectionParams,
    /// DBH derivation.
    pub dbh: DbhParams,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            stripe: StripeParams::default(),
            min_eigen_ratio: 3.0,
            assign: AssignParams::default(),
            height: HeightParams::default(),
            sections: SectionParams::default(),
            dbh: DbhParams::default(),
        }
    }
}

/// A rejected parameter set.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field holds a value the pipeline cannot run with.
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidField { field, reason } => {
                write!(f, "invalid parameter `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn require(ok: bool, field: &'static str, reason: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidField {
            field,
            reason: reason.to_string(),
        })
    }
}

impl DetectorParams {
    /// Check every field the pipeline divides by, indexes with, or compares
    /// against. Runs once per `process` call, before any work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stripe;
        require(
            s.voxel_resolution_xy > 0.0 && s.voxel_resolution_z > 0.0,
            "stripe.voxel_resolution",
            "voxel edge lengths must be positive",
        )?;
        require(
            (0.0..=1.0).contains(&s.verticality_threshold),
            "stripe.verticality_threshold",
            "must lie in [0, 1]",
        )?;
        require(
            s.verticality.radius > 0.0,
            "stripe.verticality.radius",
            "must be positive",
        )?;
        require(s.density.eps > 0.0, "stripe.density.eps", "must be positive")?;
        require(
            s.density.min_pts >= 1,
            "stripe.density.min_pts",
            "must be at least 1",
        )?;
        require(s.iterations >= 1, "stripe.iterations", "must be at least 1")?;
        require(
            !s.denoise || s.denoise_resolution > 0.0,
            "stripe.denoise_resolution",
            "must be positive when denoising is enabled",
        )?;

        require(
            self.min_eigen_ratio > 0.0,
            "min_eigen_ratio",
            "must be positive",
        )?;
        require(
            self.assign.max_distance > 0.0,
            "assign.max_distance",
            "must be positive",
        )?;
        require(
            self.height.search_radius > 0.0 && self.height.resolution > 0.0,
            "height",
            "search radius and resolution must be positive",
        )?;

        let c = &self.sections;
        require(c.step > 0.0, "sections.step", "must be positive")?;
        require(c.thickness > 0.0, "sections.thickness", "must be positive")?;
        require(
            c.min_height <= c.max_height,
            "sections.min_height",
            "must not exceed sections.max_height",
        )?;
        require(c.min_points >= 3, "sections.min_points", "must be at least 3")?;
        require(
            c.sector_count >= 1,
            "sections.sector_count",
            "must be at least 1",
        )?;
        require(
            0.0 < c.min_radius && c.min_radius <= c.max_radius,
            "sections.min_radius",
            "must be positive and not exceed sections.max_radius",
        )?;
        require(
            (0.0..1.0).contains(&c.inner_radius_fraction),
            "sections.inner_radius_fraction",
            "must lie in [0, 1)",
        )?;
        require(c.retry_eps > 0.0, "sections.retry_eps", "must be positive")?;

        require(
            self.dbh.height_tolerance >= 0.0,
            "dbh.height_tolerance",
            "must be non-negative",
        )?;
        require(
            self.dbh.coherence_tolerance >= 0.0,
            "dbh.coherence_tolerance",
            "must be non-negative",
        )?;
        Ok(())
    }
}
