// Power and sample-size analysis for the two-sided two-proportion test
//
// Normal approximation with the null variance taken at the average rate and
// the alternative variance taken per arm:
//
//   n = ((z_{1-α/2} · √(2·p̄(1-p̄)) + z_{power} · √(p1(1-p1) + p2(1-p2))) / δ)²
//
// The three operations are kept separate: "what N do I need for δ?",
// "how much power does N give for δ?" and "what δ can N detect?".

use crate::error::{AnalysisError, Result};
use crate::inference::distributions::{normal_cdf, normal_quantile, two_sided_critical};
use serde::{Deserialize, Serialize};

const MDE_SEARCH_ITERATIONS: usize = 200;

/// Achieved power below this counts as underpowered, whatever the planning target
pub const UNDERPOWERED_BELOW: f64 = 0.80;

/// Slack for `baseline + effect` landing a rounding step outside [0, 1]
const RATE_TOLERANCE: f64 = 1e-12;

/// Power analysis summary for one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerResult {
    pub baseline_rate: f64,
    /// Per-arm sample size the experiment actually has
    pub n_per_group: u64,
    /// Target effect the experiment was planned around
    pub mde_absolute: f64,
    /// Per-arm sample size needed to detect `mde_absolute`
    pub required_n_per_group: u64,
    /// Smallest positive effect detectable at `n_per_group`
    pub detectable_mde: Option<f64>,
    pub observed_effect: f64,
    /// Power at `n_per_group` for `observed_effect`
    pub achieved_power: f64,
    pub power_target: f64,
}

impl PowerResult {
    pub fn is_underpowered(&self) -> bool {
        self.achieved_power < UNDERPOWERED_BELOW
    }
}

/// Power analysis outcome for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PowerStatus {
    Computed { result: PowerResult },
    /// The observed data admit no baseline to plan around
    Unavailable { reason: String },
}

impl PowerStatus {
    pub fn result(&self) -> Option<&PowerResult> {
        match self {
            PowerStatus::Computed { result } => Some(result),
            PowerStatus::Unavailable { .. } => None,
        }
    }
}

fn validate_baseline(baseline_rate: f64) -> Result<()> {
    if !(baseline_rate > 0.0 && baseline_rate < 1.0) {
        return Err(AnalysisError::invalid(
            "baseline_rate",
            baseline_rate,
            "a rate in (0, 1)",
        ));
    }
    Ok(())
}

fn validate_probability(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(AnalysisError::invalid(name, value, "a value in (0, 1)"));
    }
    Ok(())
}

/// Standard deviations (null, alternative) of a single-user difference
fn unit_deviations(baseline_rate: f64, effect: f64) -> Result<(f64, f64)> {
    let p2 = baseline_rate + effect;
    if !(-RATE_TOLERANCE..=1.0 + RATE_TOLERANCE).contains(&p2) {
        return Err(AnalysisError::invalid(
            "mde_absolute",
            effect,
            format!(
                "an effect keeping baseline + effect in [0, 1] (baseline = {})",
                baseline_rate
            ),
        ));
    }
    let p2 = p2.clamp(0.0, 1.0);
    let p_avg = (baseline_rate + p2) / 2.0;
    let sd_null = (2.0 * p_avg * (1.0 - p_avg)).sqrt();
    let sd_alt = (baseline_rate * (1.0 - baseline_rate) + p2 * (1.0 - p2)).sqrt();
    Ok((sd_null, sd_alt))
}

fn continuous_sample_size(baseline_rate: f64, effect: f64, z_alpha: f64, z_beta: f64) -> Result<f64> {
    let (sd_null, sd_alt) = unit_deviations(baseline_rate, effect)?;
    Ok(((z_alpha * sd_null + z_beta * sd_alt) / effect).powi(2))
}

/// Per-arm sample size needed to detect `mde` at level `alpha` with `power`
pub fn required_sample_size(baseline_rate: f64, mde: f64, alpha: f64, power: f64) -> Result<u64> {
    validate_baseline(baseline_rate)?;
    validate_probability("alpha", alpha)?;
    validate_probability("power", power)?;
    if mde == 0.0 || !mde.is_finite() {
        return Err(AnalysisError::invalid("mde_absolute", mde, "a finite non-zero effect"));
    }

    let z_alpha = two_sided_critical(alpha)?;
    let z_beta = normal_quantile(power)?;
    let n = continuous_sample_size(baseline_rate, mde, z_alpha, z_beta)?;
    Ok(n.ceil() as u64)
}

/// Power of the two-sided test with `n_per_group` users per arm for `effect`
///
/// Both rejection tails are counted, so a zero effect yields exactly `alpha`.
pub fn achieved_power(baseline_rate: f64, effect: f64, n_per_group: u64, alpha: f64) -> Result<f64> {
    validate_baseline(baseline_rate)?;
    validate_probability("alpha", alpha)?;
    if n_per_group == 0 {
        return Err(AnalysisError::insufficient(
            "power analysis",
            "n_per_group is 0",
        ));
    }

    let (sd_null, sd_alt) = unit_deviations(baseline_rate, effect)?;
    let z_alpha = two_sided_critical(alpha)?;
    let shift = effect.abs() * (n_per_group as f64).sqrt();
    // sd_alt > 0 because the baseline lies strictly inside (0, 1)
    let upper = normal_cdf((shift - z_alpha * sd_null) / sd_alt)?;
    let lower = normal_cdf((-shift - z_alpha * sd_null) / sd_alt)?;
    Ok((upper + lower).min(1.0))
}

/// Smallest positive absolute effect detectable with `n_per_group` per arm
///
/// Bisection over (0, 1 - baseline). Fails with `InsufficientData` when even
/// the largest admissible effect needs more users than available.
pub fn minimum_detectable_effect(
    baseline_rate: f64,
    n_per_group: u64,
    alpha: f64,
    power: f64,
) -> Result<f64> {
    validate_baseline(baseline_rate)?;
    validate_probability("alpha", alpha)?;
    validate_probability("power", power)?;
    if n_per_group == 0 {
        return Err(AnalysisError::invalid("n_per_group", 0, ">= 1"));
    }

    let z_alpha = two_sided_critical(alpha)?;
    let z_beta = normal_quantile(power)?;
    let target = n_per_group as f64;

    let mut lo = 0.0;
    let mut hi = 1.0 - baseline_rate;
    if continuous_sample_size(baseline_rate, hi, z_alpha, z_beta)? > target {
        return Err(AnalysisError::insufficient(
            "minimum detectable effect",
            format!(
                "{} users per group cannot detect any lift from baseline {} at power {}",
                n_per_group, baseline_rate, power
            ),
        ));
    }

    for _ in 0..MDE_SEARCH_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if mid <= lo || mid >= hi {
            break;
        }
        if continuous_sample_size(baseline_rate, mid, z_alpha, z_beta)? > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(hi)
}

/// Full power summary for an experiment with the given per-arm size
pub fn analyze_power(
    baseline_rate: f64,
    observed_effect: f64,
    n_per_group: u64,
    mde_absolute: f64,
    alpha: f64,
    power_target: f64,
) -> Result<PowerResult> {
    let required_n_per_group = required_sample_size(baseline_rate, mde_absolute, alpha, power_target)?;
    let achieved = achieved_power(baseline_rate, observed_effect, n_per_group, alpha)?;
    let detectable_mde = match minimum_detectable_effect(baseline_rate, n_per_group, alpha, power_target) {
        Ok(mde) => Some(mde),
        Err(e) if e.is_procedure_local() => {
            tracing::debug!("no detectable effect: {}", e);
            None
        }
        Err(e) => return Err(e),
    };

    Ok(PowerResult {
        baseline_rate,
        n_per_group,
        mde_absolute,
        required_n_per_group,
        detectable_mde,
        observed_effect,
        achieved_power: achieved,
        power_target,
    })
}

/// Power analysis around an observed control rate
///
/// A control rate of exactly 0 or 1, a planned effect pushing the baseline
/// outside [0, 1], or an empty arm leave the analysis `Unavailable` with the
/// reason logged. Every other failure is returned as is.
pub fn assess_power(
    baseline_rate: f64,
    observed_effect: f64,
    n_per_group: u64,
    mde_absolute: f64,
    alpha: f64,
    power_target: f64,
) -> Result<PowerStatus> {
    let reason = if !(baseline_rate > 0.0 && baseline_rate < 1.0) {
        Some(format!(
            "control conversion rate is {}, so there is no baseline variance to plan around",
            baseline_rate
        ))
    } else if !(0.0..=1.0).contains(&(baseline_rate + mde_absolute)) {
        Some(format!(
            "planned effect {} moves the control rate {} outside [0, 1]",
            mde_absolute, baseline_rate
        ))
    } else if n_per_group == 0 {
        Some("an arm has no users".to_string())
    } else {
        None
    };

    if let Some(reason) = reason {
        tracing::warn!(baseline_rate, mde_absolute, n_per_group, "power analysis unavailable: {}", reason);
        return Ok(PowerStatus::Unavailable { reason });
    }

    analyze_power(
        baseline_rate,
        observed_effect,
        n_per_group,
        mde_absolute,
        alpha,
        power_target,
    )
    .map(|result| PowerStatus::Computed { result })
}
