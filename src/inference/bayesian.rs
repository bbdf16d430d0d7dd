// Beta-Binomial posterior comparison
//
// Each arm's conversion rate gets a Beta prior; with binomial data the
// posterior is Beta(α + conversions, β + failures). Comparing the two
// posteriors is delegated to a `PosteriorComparator` so the seeded Monte
// Carlo sampler and the closed-form approximation are interchangeable.

use crate::error::{AnalysisError, Result};
use crate::inference::distributions::{normal_cdf, normal_pdf, two_sided_critical};
use crate::inference::summary::GroupSummary;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

/// Two-sided mass outside the reported credible interval for the lift
const CREDIBLE_MASS_OUTSIDE: f64 = 0.05;

/// Beta prior hyperparameters shared by both arms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for BetaPrior {
    /// Uniform Beta(1, 1)
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

impl BetaPrior {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("bayesian_prior.alpha", self.alpha),
            ("bayesian_prior.beta", self.beta),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnalysisError::invalid(name, value, "a finite value > 0"));
            }
        }
        Ok(())
    }

    /// Conjugate update with one arm's counts
    pub fn update(&self, arm: &GroupSummary) -> BetaPosterior {
        BetaPosterior {
            alpha: self.alpha + arm.conversions as f64,
            beta: self.beta + arm.failures() as f64,
        }
    }
}

/// Beta(α, β) posterior over one arm's conversion rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let total = self.alpha + self.beta;
        self.alpha * self.beta / (total * total * (total + 1.0))
    }
}

/// Posterior summary of treatment rate minus control rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosteriorComparison {
    pub p_treatment_better: f64,
    /// E[max(control - treatment, 0)]
    pub expected_loss_treatment: f64,
    /// E[max(treatment - control, 0)]
    pub expected_loss_control: f64,
    pub expected_lift: f64,
    pub lift_ci_low: f64,
    pub lift_ci_high: f64,
}

/// Strategy for comparing two Beta posteriors
pub trait PosteriorComparator {
    fn compare(&self, control: &BetaPosterior, treatment: &BetaPosterior) -> Result<PosteriorComparison>;

    fn method(&self) -> BayesianMethod;
}

/// Which comparator produced a `BayesianResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BayesianMethod {
    #[default]
    MonteCarlo,
    NormalApproximation,
}

/// Seeded Monte Carlo comparator; the same seed always gives the same result
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloComparator {
    samples: usize,
    seed: u64,
}

impl MonteCarloComparator {
    pub fn new(samples: usize, seed: u64) -> Result<Self> {
        if samples == 0 {
            return Err(AnalysisError::invalid("bayesian_sample_count", samples, ">= 1"));
        }
        Ok(Self { samples, seed })
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

impl PosteriorComparator for MonteCarloComparator {
    fn compare(&self, control: &BetaPosterior, treatment: &BetaPosterior) -> Result<PosteriorComparison> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        sample_comparison(&mut rng, control, treatment, self.samples)
    }

    fn method(&self) -> BayesianMethod {
        BayesianMethod::MonteCarlo
    }
}

/// Draw `samples` paired rates from both posteriors using `rng`
pub fn sample_comparison<R: Rng + ?Sized>(
    rng: &mut R,
    control: &BetaPosterior,
    treatment: &BetaPosterior,
    samples: usize,
) -> Result<PosteriorComparison> {
    if samples == 0 {
        return Err(AnalysisError::invalid("bayesian_sample_count", samples, ">= 1"));
    }
    let control_dist = beta_distribution("control posterior", control)?;
    let treatment_dist = beta_distribution("treatment posterior", treatment)?;

    let mut diffs = Vec::with_capacity(samples);
    let mut wins = 0usize;
    let mut loss_treatment = 0.0;
    let mut loss_control = 0.0;
    let mut lift_total = 0.0;

    for _ in 0..samples {
        let c = control_dist.sample(rng);
        let t = treatment_dist.sample(rng);
        let diff = t - c;
        if diff > 0.0 {
            wins += 1;
            loss_control += diff;
        } else {
            loss_treatment -= diff;
        }
        lift_total += diff;
        diffs.push(diff);
    }

    diffs.sort_by(f64::total_cmp);
    let n = samples as f64;
    Ok(PosteriorComparison {
        p_treatment_better: wins as f64 / n,
        expected_loss_treatment: loss_treatment / n,
        expected_loss_control: loss_control / n,
        expected_lift: lift_total / n,
        lift_ci_low: percentile(&diffs, CREDIBLE_MASS_OUTSIDE / 2.0),
        lift_ci_high: percentile(&diffs, 1.0 - CREDIBLE_MASS_OUTSIDE / 2.0),
    })
}

fn beta_distribution(name: &str, posterior: &BetaPosterior) -> Result<Beta<f64>> {
    Beta::new(posterior.alpha, posterior.beta).map_err(|e| {
        AnalysisError::invalid(
            name,
            format!("Beta({}, {})", posterior.alpha, posterior.beta),
            format!("positive finite shape parameters ({})", e),
        )
    })
}

/// Linear-interpolated quantile of sorted data
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Closed-form comparator treating the rate difference as normal
///
/// Accurate once both posteriors have a few dozen successes and failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalApproximation;

impl PosteriorComparator for NormalApproximation {
    fn compare(&self, control: &BetaPosterior, treatment: &BetaPosterior) -> Result<PosteriorComparison> {
        let mu = treatment.mean() - control.mean();
        let sigma = (treatment.variance() + control.variance()).sqrt();
        let ratio = mu / sigma;
        let density = normal_pdf(ratio)?;
        let half_width = two_sided_critical(CREDIBLE_MASS_OUTSIDE)? * sigma;

        Ok(PosteriorComparison {
            p_treatment_better: normal_cdf(ratio)?,
            expected_loss_treatment: (sigma * density - mu * normal_cdf(-ratio)?).max(0.0),
            expected_loss_control: (sigma * density + mu * normal_cdf(ratio)?).max(0.0),
            expected_lift: mu,
            lift_ci_low: mu - half_width,
            lift_ci_high: mu + half_width,
        })
    }

    fn method(&self) -> BayesianMethod {
        BayesianMethod::NormalApproximation
    }
}

/// Posterior estimate for treatment vs control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianResult {
    pub method: BayesianMethod,
    pub prior: BetaPrior,
    pub posterior_control: BetaPosterior,
    pub posterior_treatment: BetaPosterior,
    pub p_treatment_better: f64,
    pub p_control_better: f64,
    pub expected_loss_treatment: f64,
    pub expected_loss_control: f64,
    pub expected_lift: f64,
    pub lift_credible_interval: (f64, f64),
}

/// Update both arms with `prior` and compare the posteriors
pub fn estimate_posterior(
    control: &GroupSummary,
    treatment: &GroupSummary,
    prior: &BetaPrior,
    comparator: &dyn PosteriorComparator,
) -> Result<BayesianResult> {
    prior.validate()?;
    let posterior_control = prior.update(control);
    let posterior_treatment = prior.update(treatment);
    let comparison = comparator.compare(&posterior_control, &posterior_treatment)?;

    Ok(BayesianResult {
        method: comparator.method(),
        prior: *prior,
        posterior_control,
        posterior_treatment,
        p_treatment_better: comparison.p_treatment_better,
        p_control_better: 1.0 - comparison.p_treatment_better,
        expected_loss_treatment: comparison.expected_loss_treatment,
        expected_loss_control: comparison.expected_loss_control,
        expected_lift: comparison.expected_lift,
        lift_credible_interval: (comparison.lift_ci_low, comparison.lift_ci_high),
    })
}
