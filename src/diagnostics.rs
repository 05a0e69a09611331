//! Diagnostics data model exposed by the detector.
//!
//! `DetectionReport` is the main entry point returned by the detector,
//! bundling the plot result with a `PipelineTrace` describing every stage the
//! pipeline executed: input shape, per-stage counters, and a timing
//! breakdown. Everything serializes to JSON for offline inspection.

use crate::stripe::StripeIteration;
use crate::types::{PlotResult, SectionStatus};
use serde::Serialize;

/// Timing entry for a single pipeline stage.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Aggregated timing trace for the detector run.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }
}

/// Shape of the input cloud as the pipeline saw it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub points: usize,
    pub has_height_column: bool,
    pub stripe_points: usize,
}

/// Counters from the iterative stripe stage.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeStage {
    pub iterations: Vec<StripeIteration>,
    pub candidates: usize,
}

/// Counters from axis estimation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisStage {
    pub axes: usize,
    pub low_confidence: usize,
}

/// Counters from the global point-to-axis scan.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignStage {
    pub assigned: usize,
    pub unassigned: usize,
}

/// Counters from height estimation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightStage {
    pub measured: usize,
    pub missing: usize,
}

/// Counters from section measurement, over all trees.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStage {
    pub sections: usize,
    pub accepted: usize,
    pub retried: usize,
    pub rejected: usize,
    pub too_few_points: usize,
}

impl SectionStage {
    pub fn tally(&mut self, status: SectionStatus, retried: bool) {
        self.sections += 1;
        if retried {
            self.retried += 1;
        }
        match status {
            SectionStatus::Accepted | SectionStatus::AcceptedAfterRetry => self.accepted += 1,
            SectionStatus::Rejected => self.rejected += 1,
            SectionStatus::TooFewPoints => self.too_few_points += 1,
        }
    }
}

/// End-to-end trace describing the internal execution of the detector.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTrace {
    pub input: InputDescriptor,
    pub timings: TimingBreakdown,
    pub stripe: StripeStage,
    pub axes: AxisStage,
    pub assignment: AssignStage,
    pub heights: HeightStage,
    pub sections: SectionStage,
}

/// Result produced by [`TreeDetector::process_with_diagnostics`](crate::TreeDetector).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub plot: PlotResult,
    pub trace: PipelineTrace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_tally_buckets_statuses() {
        let mut stage = SectionStage::default();
        stage.tally(SectionStatus::Accepted, false);
        stage.tally(SectionStatus::AcceptedAfterRetry, true);
        stage.tally(SectionStatus::Rejected, true);
        stage.tally(SectionStatus::TooFewPoints, false);
        assert_eq!(stage.sections, 4);
        assert_eq!(stage.accepted, 2);
        assert_eq!(stage.retried, 2);
        assert_eq!(stage.rejected, 1);
        assert_eq!(stage.too_few_points, 1);
    }

    #[test]
    fn timing_breakdown_serializes_camel_case() {
        let mut t = TimingBreakdown::default();
        t.push("stripe", 1.5);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"totalMs\""));
        assert!(json.contains("\"elapsedMs\""));
        assert!(json.contains("\"stripe\""));
    }
}
