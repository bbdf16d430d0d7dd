// Analysis configuration
//
// One immutable structure threaded into every procedure. No process-wide
// defaults: what a run uses is exactly what this struct says, and it is
// validated once before any computation starts.

use crate::dataset::SegmentKey;
use crate::error::{AnalysisError, Result};
use crate::impact::ImpactScenario;
use crate::inference::{AllocationRatio, BayesianMethod, BetaPrior};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of one analysis run
///
/// # Example
/// ```
/// use veredicto::config::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.alpha, 0.05);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Significance level of the primary Z-test
    pub alpha: f64,

    /// Desired power (1 - β) for sample-size planning
    pub power_target: f64,

    /// Absolute lift the experiment was planned to detect
    pub mde_absolute: f64,

    /// Significance level of the sample ratio mismatch check
    ///
    /// Deliberately strict (0.001): an SRM alarm halts the rollout, so false
    /// alarms are expensive.
    pub srm_alpha: f64,

    /// Intended randomization split
    pub expected_allocation: AllocationRatio,

    /// Beta prior applied to both arms
    pub bayesian_prior: BetaPrior,

    /// Monte Carlo draws per arm
    pub bayesian_sample_count: usize,

    pub bayesian_method: BayesianMethod,

    /// Seed of the Monte Carlo stream
    pub random_seed: u64,

    /// Minimum users left after cleaning for the run to proceed
    pub min_sample_size: usize,

    /// Segments smaller than this are flagged and excluded from correction
    pub min_segment_n: u64,

    pub segment_key: SegmentKey,

    /// Smallest absolute lift worth shipping
    pub practical_significance_threshold: f64,

    /// Run the independent analyses on scoped threads
    pub parallel: bool,

    /// Revenue projections of the measured lift
    pub scenarios: Vec<ImpactScenario>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            power_target: 0.80,
            mde_absolute: 0.01,
            srm_alpha: 0.001,
            expected_allocation: AllocationRatio::default(),
            bayesian_prior: BetaPrior::default(),
            bayesian_sample_count: 100_000,
            bayesian_method: BayesianMethod::MonteCarlo,
            random_seed: 42,
            min_sample_size: 100,
            min_segment_n: 100,
            segment_key: SegmentKey::Country,
            practical_significance_threshold: 0.001,
            parallel: false,
            scenarios: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example TOML
    /// ```toml
    /// alpha = 0.05
    /// srm_alpha = 0.001
    /// random_seed = 7
    ///
    /// [bayesian_prior]
    /// alpha = 1.0
    /// beta = 1.0
    ///
    /// [[scenarios]]
    /// name = "full rollout"
    /// monthly_visitors = 250000
    /// revenue_per_conversion = 40.0
    /// rollout_percentage = 1.0
    /// ```
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            AnalysisError::invalid("config", e.message(), "a valid analysis configuration")
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option against its domain
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alpha", self.alpha),
            ("power_target", self.power_target),
            ("srm_alpha", self.srm_alpha),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(AnalysisError::invalid(name, value, "a value in (0, 1)"));
            }
        }

        if !self.mde_absolute.is_finite() || self.mde_absolute == 0.0 {
            return Err(AnalysisError::invalid(
                "mde_absolute",
                self.mde_absolute,
                "a finite non-zero lift",
            ));
        }

        self.expected_allocation.validate()?;
        self.bayesian_prior.validate()?;

        if self.bayesian_sample_count == 0 {
            return Err(AnalysisError::invalid(
                "bayesian_sample_count",
                self.bayesian_sample_count,
                ">= 1",
            ));
        }

        if self.min_sample_size < 2 {
            return Err(AnalysisError::invalid(
                "min_sample_size",
                self.min_sample_size,
                ">= 2",
            ));
        }

        if self.min_segment_n < 2 {
            return Err(AnalysisError::invalid("min_segment_n", self.min_segment_n, ">= 2"));
        }

        if !(self.practical_significance_threshold.is_finite()
            && self.practical_significance_threshold >= 0.0)
        {
            return Err(AnalysisError::invalid(
                "practical_significance_threshold",
                self.practical_significance_threshold,
                "a finite value >= 0",
            ));
        }

        for scenario in &self.scenarios {
            scenario.validate()?;
        }

        Ok(())
    }
}
