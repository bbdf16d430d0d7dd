// Sample ratio mismatch guardrail
//
// Chi-square goodness-of-fit of observed arm sizes against the intended
// allocation. A failure is a result, not an error: it flows into the
// decision policy, where it overrides everything else.

use crate::dataset::CleanedSample;
use crate::error::{AnalysisError, Result};
use crate::inference::distributions::chi_square_sf;
use serde::{Deserialize, Serialize};

/// Intended share of users per arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationRatio {
    pub control: f64,
    pub treatment: f64,
}

impl Default for AllocationRatio {
    fn default() -> Self {
        Self {
            control: 0.5,
            treatment: 0.5,
        }
    }
}

impl AllocationRatio {
    pub fn validate(&self) -> Result<()> {
        for (name, share) in [
            ("expected_allocation.control", self.control),
            ("expected_allocation.treatment", self.treatment),
        ] {
            if !(share.is_finite() && share > 0.0 && share < 1.0) {
                return Err(AnalysisError::invalid(name, share, "a share in (0, 1)"));
            }
        }
        let total = self.control + self.treatment;
        if (total - 1.0).abs() > 1e-9 {
            return Err(AnalysisError::invalid(
                "expected_allocation",
                format!("{} + {} = {}", self.control, self.treatment, total),
                "shares summing to 1",
            ));
        }
        Ok(())
    }
}

/// Outcome of the SRM check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrmResult {
    pub control_count: u64,
    pub treatment_count: u64,
    pub expected_control: f64,
    pub expected_treatment: f64,
    pub chi_square: f64,
    pub p_value: f64,
    pub srm_alpha: f64,
    pub passed: bool,
}

impl SrmResult {
    pub fn failed(&self) -> bool {
        !self.passed
    }
}

/// Checks observed arm sizes against the intended randomization ratio
#[derive(Debug, Clone)]
pub struct SrmGuard {
    expected: AllocationRatio,
    srm_alpha: f64,
}

impl SrmGuard {
    pub fn new(expected: AllocationRatio, srm_alpha: f64) -> Result<Self> {
        expected.validate()?;
        if !(srm_alpha > 0.0 && srm_alpha < 1.0) {
            return Err(AnalysisError::invalid("srm_alpha", srm_alpha, "a value in (0, 1)"));
        }
        Ok(Self {
            expected,
            srm_alpha,
        })
    }

    pub fn check(&self, sample: &CleanedSample) -> Result<SrmResult> {
        let (control, treatment) = sample.summaries();
        self.check_counts(control.n, treatment.n)
    }

    pub fn check_counts(&self, control_count: u64, treatment_count: u64) -> Result<SrmResult> {
        let total = (control_count + treatment_count) as f64;
        if total == 0.0 {
            return Err(AnalysisError::insufficient(
                "SRM check",
                "no users assigned to either group",
            ));
        }

        let expected_control = total * self.expected.control;
        let expected_treatment = total * self.expected.treatment;
        let chi_square = (control_count as f64 - expected_control).powi(2) / expected_control
            + (treatment_count as f64 - expected_treatment).powi(2) / expected_treatment;
        // two categories, one degree of freedom
        let p_value = chi_square_sf(chi_square, 1.0)?;
        let passed = p_value >= self.srm_alpha;

        if !passed {
            tracing::warn!(
                control_count,
                treatment_count,
                chi_square,
                p_value,
                "sample ratio mismatch detected"
            );
        }

        Ok(SrmResult {
            control_count,
            treatment_count,
            expected_control,
            expected_treatment,
            chi_square,
            p_value,
            srm_alpha: self.srm_alpha,
            passed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> SrmGuard {
        SrmGuard::new(AllocationRatio::default(), 0.001).unwrap()
    }

    #[test]
    fn test_balanced_split_passes() {
        let result = guard().check_counts(10_000, 10_000).unwrap();
        assert_eq!(result.chi_square, 0.0);
        assert!((result.p_value - 1.0).abs() < 1e-9);
        assert!(result.passed);
    }

    #[test]
    fn test_skewed_split_fails() {
        let result = guard().check_counts(9_000, 11_000).unwrap();
        assert!((result.chi_square - 200.0).abs() < 1e-9);
        assert!(result.p_value < 1e-10);
        assert!(result.failed());
    }

    #[test]
    fn test_unequal_allocation() {
        let guard = SrmGuard::new(
            AllocationRatio {
                control: 0.2,
                treatment: 0.8,
            },
            0.001,
        )
        .unwrap();
        let result = guard.check_counts(2_000, 8_000).unwrap();
        assert!(result.passed);
        assert!((result.expected_control - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_sample() {
        let err = guard().check_counts(0, 0).unwrap_err();
        assert!(err.is_procedure_local());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let bad = AllocationRatio {
            control: 0.6,
            treatment: 0.6,
        };
        assert!(SrmGuard::new(bad, 0.001).is_err());
        assert!(SrmGuard::new(AllocationRatio::default(), 0.0).is_err());
    }
}
