// Two-proportion Z-test
//
// The test statistic uses the pooled proportion (the null hypothesis says
// both arms share one rate). The confidence interval for the lift uses the
// unpooled standard error, because under the alternative the arms differ.
// Mixing the two up gives intervals that disagree with the p-value in
// exactly the borderline cases that matter.

use crate::error::{AnalysisError, Result};
use crate::inference::distributions::{two_sided_critical, two_sided_p_value};
use crate::inference::summary::GroupSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conventional Cohen's h bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn from_cohens_h(h: f64) -> Self {
        let h = h.abs();
        if h < 0.2 {
            EffectMagnitude::Negligible
        } else if h < 0.5 {
            EffectMagnitude::Small
        } else if h < 0.8 {
            EffectMagnitude::Medium
        } else {
            EffectMagnitude::Large
        }
    }
}

impl fmt::Display for EffectMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EffectMagnitude::Negligible => "negligible",
            EffectMagnitude::Small => "small",
            EffectMagnitude::Medium => "medium",
            EffectMagnitude::Large => "large",
        };
        f.write_str(label)
    }
}

/// Result of the treatment-vs-control Z-test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub control_rate: f64,
    pub treatment_rate: f64,
    /// treatment_rate - control_rate
    pub absolute_lift: f64,
    /// absolute_lift / control_rate; `None` when the control rate is 0
    pub relative_lift: Option<f64>,
    pub z_statistic: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub effect_size_h: f64,
    pub effect_magnitude: EffectMagnitude,
    pub alpha: f64,
    pub reject_null: bool,
}

impl TestResult {
    /// True when the confidence interval for the lift does not contain 0
    pub fn ci_excludes_zero(&self) -> bool {
        self.ci_low > 0.0 || self.ci_high < 0.0
    }

    pub fn confidence_level(&self) -> f64 {
        1.0 - self.alpha
    }
}

/// Cohen's h = 2·(asin √p_treatment − asin √p_control)
pub fn cohens_h(control_rate: f64, treatment_rate: f64) -> f64 {
    2.0 * (treatment_rate.sqrt().asin() - control_rate.sqrt().asin())
}

/// Pooled two-sided Z-test of treatment against control at level `alpha`
pub fn two_proportion_z_test(
    control: &GroupSummary,
    treatment: &GroupSummary,
    alpha: f64,
) -> Result<TestResult> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(AnalysisError::invalid("alpha", alpha, "a value in (0, 1)"));
    }
    for arm in [control, treatment] {
        if arm.n == 0 {
            return Err(AnalysisError::insufficient(
                "two-proportion z-test",
                format!("{} group has n = 0", arm.group),
            ));
        }
    }

    let (n_c, n_t) = (control.n as f64, treatment.n as f64);
    let (p_c, p_t) = (control.rate, treatment.rate);
    let diff = p_t - p_c;

    let pooled = (control.conversions + treatment.conversions) as f64 / (n_c + n_t);
    let se_pooled = (pooled * (1.0 - pooled) * (1.0 / n_c + 1.0 / n_t)).sqrt();
    // Zero pooled variance means both arms are all-0 or all-1, so diff is 0 too
    let (z_statistic, p_value) = if se_pooled > 0.0 {
        let z = diff / se_pooled;
        (z, two_sided_p_value(z)?)
    } else {
        (0.0, 1.0)
    };

    let se_unpooled = (p_c * (1.0 - p_c) / n_c + p_t * (1.0 - p_t) / n_t).sqrt();
    let margin = two_sided_critical(alpha)? * se_unpooled;

    let effect_size_h = cohens_h(p_c, p_t);

    Ok(TestResult {
        control_rate: p_c,
        treatment_rate: p_t,
        absolute_lift: diff,
        relative_lift: (p_c > 0.0).then(|| diff / p_c),
        z_statistic,
        p_value,
        ci_low: diff - margin,
        ci_high: diff + margin,
        effect_size_h,
        effect_magnitude: EffectMagnitude::from_cohens_h(effect_size_h),
        alpha,
        reject_null: p_value < alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Group;

    fn arms(n_c: u64, x_c: u64, n_t: u64, x_t: u64) -> (GroupSummary, GroupSummary) {
        (
            GroupSummary::new(Group::Control, n_c, x_c).unwrap(),
            GroupSummary::new(Group::Treatment, n_t, x_t).unwrap(),
        )
    }

    #[test]
    fn test_identical_groups() {
        let (c, t) = arms(500, 60, 500, 60);
        let result = two_proportion_z_test(&c, &t, 0.05).unwrap();
        assert_eq!(result.absolute_lift, 0.0);
        assert_eq!(result.z_statistic, 0.0);
        assert!(result.p_value > 0.99);
        assert!(!result.reject_null);
        assert_eq!(result.effect_magnitude, EffectMagnitude::Negligible);
    }

    #[test]
    fn test_known_statistic() {
        // pooled p = 0.125, se = sqrt(0.125 * 0.875 * 2 / 1000)
        let (c, t) = arms(1000, 120, 1000, 130);
        let result = two_proportion_z_test(&c, &t, 0.05).unwrap();
        let se = (0.125f64 * 0.875 * 0.002).sqrt();
        assert!((result.z_statistic - 0.01 / se).abs() < 1e-12);
        assert!((result.p_value - 0.4999).abs() < 0.01);
    }

    #[test]
    fn test_ci_uses_unpooled_standard_error() {
        let (c, t) = arms(2000, 200, 1000, 300);
        let result = two_proportion_z_test(&c, &t, 0.05).unwrap();
        let se_unpooled = (0.1f64 * 0.9 / 2000.0 + 0.3 * 0.7 / 1000.0).sqrt();
        let half_width = (result.ci_high - result.ci_low) / 2.0;
        assert!((half_width - 1.959964 * se_unpooled).abs() < 1e-6);
        assert!(result.ci_low <= result.absolute_lift && result.absolute_lift <= result.ci_high);
    }

    #[test]
    fn test_swapping_arms_flips_sign_only() {
        let (c, t) = arms(4000, 480, 4100, 530);
        let forward = two_proportion_z_test(&c, &t, 0.05).unwrap();
        let c_swapped = GroupSummary::new(Group::Control, 4100, 530).unwrap();
        let t_swapped = GroupSummary::new(Group::Treatment, 4000, 480).unwrap();
        let backward = two_proportion_z_test(&c_swapped, &t_swapped, 0.05).unwrap();
        assert!((forward.z_statistic + backward.z_statistic).abs() < 1e-12);
        assert!((forward.p_value - backward.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_rates_are_valid() {
        let (c, t) = arms(100, 0, 100, 0);
        let result = two_proportion_z_test(&c, &t, 0.05).unwrap();
        assert_eq!(result.p_value, 1.0);
        assert_eq!(result.relative_lift, None);
        assert_eq!(result.ci_low, 0.0);
        assert_eq!(result.ci_high, 0.0);
    }

    #[test]
    fn test_rate_of_one_is_valid() {
        let (c, t) = arms(50, 50, 50, 40);
        let result = two_proportion_z_test(&c, &t, 0.05).unwrap();
        assert!(result.z_statistic < 0.0);
        assert!(result.reject_null);
    }

    #[test]
    fn test_empty_group_is_insufficient() {
        let (c, t) = arms(0, 0, 100, 10);
        let err = two_proportion_z_test(&c, &t, 0.05).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
        assert!(err.to_string().contains("control"));
    }

    #[test]
    fn test_alpha_domain() {
        let (c, t) = arms(100, 10, 100, 12);
        assert!(two_proportion_z_test(&c, &t, 0.0).is_err());
        assert!(two_proportion_z_test(&c, &t, 1.0).is_err());
    }

    #[test]
    fn test_cohens_h_direction() {
        assert_eq!(cohens_h(0.5, 0.5), 0.0);
        assert!(cohens_h(0.4, 0.6) > 0.0);
        assert_eq!(EffectMagnitude::from_cohens_h(-0.9), EffectMagnitude::Large);
        assert_eq!(EffectMagnitude::from_cohens_h(0.3), EffectMagnitude::Small);
    }
}
