// Statistical decision engine
//
// Every procedure takes the already-cleaned sample (or per-arm summaries
// derived from it) and returns an immutable result struct. The procedures
// are independent of each other; only the decision policy combines them.
//
// Procedures:
// - SRM guard: chi-square goodness-of-fit on arm sizes
// - Two-proportion Z-test with unpooled confidence interval and Cohen's h
// - Power: required sample size, achieved power, minimum detectable effect
// - Beta-Binomial posteriors compared by seeded Monte Carlo or closed form
// - Segment breakdown with Bonferroni level and Holm adjusted p-values
//
// Distribution functions come from statrs; Beta sampling from rand_distr on
// a ChaCha8 stream so results are reproducible from the seed alone.

mod bayesian;
pub mod distributions;
mod frequentist;
mod power;
mod segment;
mod srm;
mod summary;

pub use bayesian::{
    estimate_posterior, sample_comparison, BayesianMethod, BayesianResult, BetaPosterior,
    BetaPrior, MonteCarloComparator, NormalApproximation, PosteriorComparator,
    PosteriorComparison,
};
pub use frequentist::{cohens_h, two_proportion_z_test, EffectMagnitude, TestResult};
pub use power::{
    achieved_power, analyze_power, assess_power, minimum_detectable_effect, required_sample_size,
    PowerResult, PowerStatus, UNDERPOWERED_BELOW,
};
pub use segment::{holm_adjusted, SegmentAnalyzer, SegmentOutcome, SegmentResult, SegmentStatus};
pub use srm::{AllocationRatio, SrmGuard, SrmResult};
pub use summary::GroupSummary;
