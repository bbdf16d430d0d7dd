// Rollout decision policy
//
// Fixed precedence, first match wins:
// 1. SRM failure                                   -> hold
// 2. CI excludes 0 and lift > practical threshold  -> ship
// 3. CI excludes 0 and lift < 0                    -> keep_current
// 4. otherwise (inconclusive or too small to matter) -> keep_current
//
// A pure function of its inputs. Bayesian and segment results only add
// rationale lines; they never change the recommendation.

use crate::inference::{
    BayesianResult, PowerStatus, SegmentResult, SrmResult, TestResult, UNDERPOWERED_BELOW,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rollout recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Roll the treatment out
    Ship,
    /// Stop and investigate before interpreting anything
    Hold,
    /// Keep the incumbent design
    KeepCurrent,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Recommendation::Ship => "ship",
            Recommendation::Hold => "hold",
            Recommendation::KeepCurrent => "keep_current",
        };
        f.write_str(label)
    }
}

/// Headline numbers the recommendation rests on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingResults {
    pub srm_passed: bool,
    pub srm_p_value: f64,
    pub absolute_lift: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// None when power could not be assessed
    pub achieved_power: Option<f64>,
    pub p_treatment_better: f64,
    pub significant_segments: Vec<String>,
}

/// Recommendation plus the ordered reasoning behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub recommendation: Recommendation,
    pub rationale: Vec<String>,
    /// Conditions that invalidate or weaken interpretation (SRM first)
    pub warnings: Vec<String>,
    pub supporting: SupportingResults,
}

/// Everything the policy looks at
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    pub srm: &'a SrmResult,
    pub test: &'a TestResult,
    pub power: &'a PowerStatus,
    pub bayesian: &'a BayesianResult,
    pub segments: &'a SegmentResult,
    pub practical_significance_threshold: f64,
}

fn pct(value: f64) -> String {
    format!("{:.4}%", value * 100.0)
}

pub fn decide(inputs: &DecisionInputs<'_>) -> Decision {
    let DecisionInputs {
        srm,
        test,
        power,
        bayesian,
        segments,
        practical_significance_threshold: threshold,
    } = *inputs;

    let mut rationale = Vec::new();
    let mut warnings = Vec::new();

    if srm.failed() {
        warnings.push(format!(
            "SAMPLE RATIO MISMATCH: observed {} control / {} treatment vs expected {:.0} / {:.0} \
             (chi2 = {:.3}, p = {:.3e} < {}); randomization may be broken",
            srm.control_count,
            srm.treatment_count,
            srm.expected_control,
            srm.expected_treatment,
            srm.chi_square,
            srm.p_value,
            srm.srm_alpha
        ));
    }

    let ci = format!(
        "{:.0}% CI for lift [{}, {}]",
        test.confidence_level() * 100.0,
        pct(test.ci_low),
        pct(test.ci_high)
    );

    let recommendation = if srm.failed() {
        rationale.push(
            "Sample ratio mismatch detected: group sizes deviate from the intended allocation, \
             so no effect estimate can be trusted until assignment is fixed"
                .to_string(),
        );
        Recommendation::Hold
    } else if test.ci_excludes_zero() && test.absolute_lift > threshold {
        rationale.push(format!(
            "Treatment lifts conversion by {} ({} excludes zero, p = {:.4})",
            pct(test.absolute_lift),
            ci,
            test.p_value
        ));
        rationale.push(format!(
            "Lift exceeds the practical significance threshold of {}",
            pct(threshold)
        ));
        Recommendation::Ship
    } else if test.ci_excludes_zero() && test.absolute_lift < 0.0 {
        rationale.push(format!(
            "Treatment lowers conversion by {} ({} excludes zero, p = {:.4})",
            pct(-test.absolute_lift),
            ci,
            test.p_value
        ));
        Recommendation::KeepCurrent
    } else {
        if test.ci_excludes_zero() {
            rationale.push(format!(
                "Lift of {} is statistically significant ({}) but below the practical \
                 significance threshold of {}",
                pct(test.absolute_lift),
                ci,
                pct(threshold)
            ));
        } else {
            rationale.push(format!(
                "Inconclusive: {} includes zero (observed lift {}, p = {:.4})",
                ci,
                pct(test.absolute_lift),
                test.p_value
            ));
            match power {
                PowerStatus::Computed { result } if result.is_underpowered() => {
                    rationale.push(format!(
                        "Test was underpowered for the observed effect: achieved power {:.1}% < {:.0}%",
                        result.achieved_power * 100.0,
                        UNDERPOWERED_BELOW * 100.0
                    ));
                    warnings.push(format!(
                        "Underpowered: {} users per group; {} per group needed to detect {}",
                        result.n_per_group,
                        result.required_n_per_group,
                        pct(result.mde_absolute)
                    ));
                }
                PowerStatus::Computed { .. } => {}
                PowerStatus::Unavailable { reason } => {
                    rationale.push(format!("Power could not be assessed: {}", reason));
                }
            }
        }
        Recommendation::KeepCurrent
    };

    rationale.push(format!(
        "Bayesian: P(treatment better) = {:.1}%, expected loss if shipping {}, if keeping {}",
        bayesian.p_treatment_better * 100.0,
        pct(bayesian.expected_loss_treatment),
        pct(bayesian.expected_loss_control)
    ));

    let significant = segments.significant_labels();
    if segments.n_segments > 0 {
        if significant.is_empty() {
            rationale.push(format!(
                "No {} segment is significant at the Bonferroni level {:.4} ({} tested)",
                segments.key, segments.corrected_alpha, segments.n_segments
            ));
        } else {
            rationale.push(format!(
                "Significant {} segments at Bonferroni level {:.4}: {}",
                segments.key,
                segments.corrected_alpha,
                significant.join(", ")
            ));
        }
    }
    let excluded = segments.excluded().count();
    if excluded > 0 {
        warnings.push(format!(
            "{} {} segment(s) excluded from the breakdown (too small or missing an arm)",
            excluded, segments.key
        ));
    }

    let supporting = SupportingResults {
        srm_passed: srm.passed,
        srm_p_value: srm.p_value,
        absolute_lift: test.absolute_lift,
        p_value: test.p_value,
        ci_low: test.ci_low,
        ci_high: test.ci_high,
        achieved_power: power.result().map(|r| r.achieved_power),
        p_treatment_better: bayesian.p_treatment_better,
        significant_segments: significant.iter().map(|label| label.to_string()).collect(),
    };

    Decision {
        recommendation,
        rationale,
        warnings,
        supporting,
    }
}
