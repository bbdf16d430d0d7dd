// Segment breakdown with multiple-comparison control
//
// The sample is partitioned by a segment key and the Z-test is replayed in
// each partition at the Bonferroni level base_alpha / n_segments. Segments
// that are too small (or miss an arm) are reported as excluded and do not
// count towards n_segments. Holm step-down adjusted p-values are reported
// alongside as a less conservative reading of the same family.

use crate::dataset::{CleanRecord, CleanedSample, Group, SegmentKey};
use crate::error::{AnalysisError, Result};
use crate::inference::frequentist::{two_proportion_z_test, TestResult};
use crate::inference::summary::GroupSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one segment fared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentStatus {
    Tested {
        result: TestResult,
        holm_adjusted_p_value: f64,
    },
    Excluded {
        reason: String,
    },
}

/// One entry of the segment breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOutcome {
    pub label: String,
    pub n_users: u64,
    pub control: GroupSummary,
    pub treatment: GroupSummary,
    #[serde(flatten)]
    pub status: SegmentStatus,
}

impl SegmentOutcome {
    pub fn result(&self) -> Option<&TestResult> {
        match &self.status {
            SegmentStatus::Tested { result, .. } => Some(result),
            SegmentStatus::Excluded { .. } => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self.status, SegmentStatus::Excluded { .. })
    }
}

/// Full segment breakdown, ordered by label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub key: SegmentKey,
    pub base_alpha: f64,
    /// base_alpha / n_segments, or base_alpha when nothing was tested
    pub corrected_alpha: f64,
    /// Number of segments actually tested
    pub n_segments: usize,
    pub segments: Vec<SegmentOutcome>,
}

impl SegmentResult {
    pub fn tested(&self) -> impl Iterator<Item = &SegmentOutcome> {
        self.segments.iter().filter(|s| !s.is_excluded())
    }

    pub fn excluded(&self) -> impl Iterator<Item = &SegmentOutcome> {
        self.segments.iter().filter(|s| s.is_excluded())
    }

    /// Labels of segments significant at the corrected level
    pub fn significant_labels(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.result().is_some_and(|r| r.reject_null))
            .map(|s| s.label.as_str())
            .collect()
    }
}

/// Replays the Z-test per segment under Bonferroni correction
#[derive(Debug, Clone)]
pub struct SegmentAnalyzer {
    key: SegmentKey,
    base_alpha: f64,
    min_segment_n: u64,
}

impl SegmentAnalyzer {
    pub fn new(key: SegmentKey, base_alpha: f64, min_segment_n: u64) -> Result<Self> {
        if !(base_alpha > 0.0 && base_alpha < 1.0) {
            return Err(AnalysisError::invalid("alpha", base_alpha, "a value in (0, 1)"));
        }
        Ok(Self {
            key,
            base_alpha,
            min_segment_n,
        })
    }

    pub fn analyze(&self, sample: &CleanedSample) -> Result<SegmentResult> {
        let mut partitions: BTreeMap<String, Vec<&CleanRecord>> = BTreeMap::new();
        for record in sample.records() {
            partitions
                .entry(record.segment_label(self.key))
                .or_default()
                .push(record);
        }

        let mut eligible = Vec::new();
        let mut segments = Vec::with_capacity(partitions.len());
        for (label, records) in partitions {
            let control = GroupSummary::from_records(Group::Control, records.iter().copied());
            let treatment = GroupSummary::from_records(Group::Treatment, records.iter().copied());
            let n_users = records.len() as u64;

            let exclusion = if n_users < self.min_segment_n {
                Some(format!(
                    "{} users, below min_segment_n = {}",
                    n_users, self.min_segment_n
                ))
            } else if control.n == 0 || treatment.n == 0 {
                Some(format!(
                    "missing an arm (control n = {}, treatment n = {})",
                    control.n, treatment.n
                ))
            } else {
                eligible.push(segments.len());
                None
            };

            if let Some(reason) = &exclusion {
                tracing::warn!(segment = %label, "segment excluded from correction: {}", reason);
            }

            segments.push((label, n_users, control, treatment, exclusion));
        }

        let n_segments = eligible.len();
        let corrected_alpha = if n_segments == 0 {
            self.base_alpha
        } else {
            self.base_alpha / n_segments as f64
        };

        let mut tested = Vec::with_capacity(n_segments);
        for &idx in &eligible {
            let (_, _, control, treatment, _) = &segments[idx];
            tested.push(two_proportion_z_test(control, treatment, corrected_alpha)?);
        }
        let p_values: Vec<f64> = tested.iter().map(|r| r.p_value).collect();
        let holm = holm_adjusted(&p_values);

        let mut tested_by_index: BTreeMap<usize, (TestResult, f64)> = eligible
            .into_iter()
            .zip(tested.into_iter().zip(holm))
            .collect();

        let segments = segments
            .into_iter()
            .enumerate()
            .map(|(idx, (label, n_users, control, treatment, exclusion))| {
                let status = match (tested_by_index.remove(&idx), exclusion) {
                    (Some((result, holm_adjusted_p_value)), _) => SegmentStatus::Tested {
                        result,
                        holm_adjusted_p_value,
                    },
                    (None, reason) => SegmentStatus::Excluded {
                        reason: reason.unwrap_or_default(),
                    },
                };
                SegmentOutcome {
                    label,
                    n_users,
                    control,
                    treatment,
                    status,
                }
            })
            .collect();

        Ok(SegmentResult {
            key: self.key,
            base_alpha: self.base_alpha,
            corrected_alpha,
            n_segments,
            segments,
        })
    }
}

/// Holm step-down adjusted p-values, returned in input order
pub fn holm_adjusted(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![0.0; m];
    let mut running_max: f64 = 0.0;
    for (rank, &idx) in order.iter().enumerate() {
        let candidate = ((m - rank) as f64 * p_values[idx]).min(1.0);
        running_max = running_max.max(candidate);
        adjusted[idx] = running_max;
    }
    adjusted
}
