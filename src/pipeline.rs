//! End-to-end analysis run
//!
//! (events, countries, config) → clean → {SRM, Z-test, power, Bayesian,
//! segments} → decision → `AnalysisReport`.
//!
//! The five analyses only read the cleaned sample, so with `parallel = true`
//! they run on crossbeam scoped threads. Results are identical either way:
//! each analysis is deterministic and owns its own RNG stream.

use crate::config::AnalysisConfig;
use crate::dataset::{CleanedSample, CleaningSummary, DataCleaner, RawCountry, RawEvent};
use crate::decision::{decide, Decision, DecisionInputs};
use crate::error::Result;
use crate::impact::{estimate_impact, ImpactEstimate};
use crate::inference::{
    assess_power, estimate_posterior, two_proportion_z_test, BayesianMethod, BayesianResult,
    GroupSummary, MonteCarloComparator, NormalApproximation, PosteriorComparator, PowerStatus,
    SegmentAnalyzer, SegmentResult, SrmGuard, SrmResult, TestResult,
};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Complete, serializable output of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub cleaning: CleaningSummary,
    pub sample_size: usize,
    /// FNV-1a digest of the cleaned sample
    pub sample_fingerprint: String,
    pub control: GroupSummary,
    pub treatment: GroupSummary,
    pub srm: SrmResult,
    pub test: TestResult,
    pub power: PowerStatus,
    pub bayesian: BayesianResult,
    pub segments: SegmentResult,
    pub impact: Vec<ImpactEstimate>,
    pub decision: Decision,
    pub config: AnalysisConfig,
}

/// Results of the independent analyses
struct Analyses {
    srm: SrmResult,
    test: TestResult,
    power: PowerStatus,
    bayesian: BayesianResult,
    segments: SegmentResult,
}

/// Clean the raw tables and analyze the resulting sample
pub fn analyze(
    events: &[RawEvent],
    countries: &[RawCountry],
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    config.validate()?;
    let sample = DataCleaner::new(config.min_sample_size).clean(events, countries)?;
    analyze_sample(&sample, config)
}

/// Analyze an already-cleaned sample
pub fn analyze_sample(sample: &CleanedSample, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;

    let (control, treatment) = sample.summaries();
    tracing::debug!(
        control_n = control.n,
        control_conversions = control.conversions,
        treatment_n = treatment.n,
        treatment_conversions = treatment.conversions,
        "group summaries"
    );

    let guard = SrmGuard::new(config.expected_allocation, config.srm_alpha)?;
    let segmenter = SegmentAnalyzer::new(config.segment_key, config.alpha, config.min_segment_n)?;
    let comparator = comparator_for(config)?;
    let stage = Stage {
        sample,
        config,
        control: &control,
        treatment: &treatment,
        guard: &guard,
        segmenter: &segmenter,
        comparator: comparator.as_ref(),
    };

    let analyses = if config.parallel {
        stage.run_parallel()?
    } else {
        stage.run_sequential()?
    };

    let decision = decide(&DecisionInputs {
        srm: &analyses.srm,
        test: &analyses.test,
        power: &analyses.power,
        bayesian: &analyses.bayesian,
        segments: &analyses.segments,
        practical_significance_threshold: config.practical_significance_threshold,
    });
    tracing::info!(
        recommendation = %decision.recommendation,
        p_value = analyses.test.p_value,
        srm_passed = analyses.srm.passed,
        "analysis complete"
    );

    let impact = config
        .scenarios
        .iter()
        .map(|scenario| estimate_impact(analyses.test.absolute_lift, scenario))
        .collect();

    Ok(AnalysisReport {
        cleaning: sample.summary().clone(),
        sample_size: sample.len(),
        sample_fingerprint: fingerprint(sample),
        control,
        treatment,
        srm: analyses.srm,
        test: analyses.test,
        power: analyses.power,
        bayesian: analyses.bayesian,
        segments: analyses.segments,
        impact,
        decision,
        config: config.clone(),
    })
}

fn comparator_for(config: &AnalysisConfig) -> Result<Box<dyn PosteriorComparator + Sync>> {
    let comparator: Box<dyn PosteriorComparator + Sync> = match config.bayesian_method {
        BayesianMethod::MonteCarlo => Box::new(MonteCarloComparator::new(
            config.bayesian_sample_count,
            config.random_seed,
        )?),
        BayesianMethod::NormalApproximation => Box::new(NormalApproximation),
    };
    Ok(comparator)
}

/// Shared read-only inputs of the analysis stage
struct Stage<'a> {
    sample: &'a CleanedSample,
    config: &'a AnalysisConfig,
    control: &'a GroupSummary,
    treatment: &'a GroupSummary,
    guard: &'a SrmGuard,
    segmenter: &'a SegmentAnalyzer,
    comparator: &'a (dyn PosteriorComparator + Sync),
}

impl Stage<'_> {
    fn srm(&self) -> Result<SrmResult> {
        self.guard.check(self.sample)
    }

    fn test(&self) -> Result<TestResult> {
        two_proportion_z_test(self.control, self.treatment, self.config.alpha)
    }

    fn power(&self) -> Result<PowerStatus> {
        assess_power(
            self.control.rate,
            self.treatment.rate - self.control.rate,
            self.control.n.min(self.treatment.n),
            self.config.mde_absolute,
            self.config.alpha,
            self.config.power_target,
        )
    }

    fn bayesian(&self) -> Result<BayesianResult> {
        estimate_posterior(
            self.control,
            self.treatment,
            &self.config.bayesian_prior,
            self.comparator,
        )
    }

    fn segments(&self) -> Result<SegmentResult> {
        self.segmenter.analyze(self.sample)
    }

    fn run_sequential(&self) -> Result<Analyses> {
        Ok(Analyses {
            srm: self.srm()?,
            test: self.test()?,
            power: self.power()?,
            bayesian: self.bayesian()?,
            segments: self.segments()?,
        })
    }

    fn run_parallel(&self) -> Result<Analyses> {
        crossbeam::scope(|s| {
            let srm = s.spawn(|_| self.srm());
            let test = s.spawn(|_| self.test());
            let power = s.spawn(|_| self.power());
            let bayesian = s.spawn(|_| self.bayesian());
            let segments = s.spawn(|_| self.segments());

            // Joined in sequential order so the first error matches run_sequential
            Ok(Analyses {
                srm: rethrow(srm.join())?,
                test: rethrow(test.join())?,
                power: rethrow(power.join())?,
                bayesian: rethrow(bayesian.join())?,
                segments: rethrow(segments.join())?,
            })
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

fn rethrow<T>(joined: std::thread::Result<T>) -> T {
    joined.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// FNV-1a digest over every field of every cleaned record, in sample order
pub fn fingerprint(sample: &CleanedSample) -> String {
    let mut hasher = FnvHasher::default();
    for record in sample.records() {
        hasher.write(record.user_id.as_bytes());
        hasher.write(b"\x1f");
        hasher.write(record.timestamp.to_string().as_bytes());
        hasher.write(b"\x1f");
        hasher.write(record.group.as_str().as_bytes());
        hasher.write(record.landing_page.as_str().as_bytes());
        hasher.write(&[u8::from(record.converted)]);
        hasher.write(record.country.as_bytes());
        hasher.write(b"\x1e");
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Group, LandingPage};
    use crate::decision::Recommendation;
    use chrono::NaiveDate;

    /// 4 countries, 600 users per arm per country; treatment converts better
    fn tables(control_rate_pct: u64, treatment_rate_pct: u64) -> (Vec<RawEvent>, Vec<RawCountry>) {
        let ts = NaiveDate::from_ymd_opt(2017, 1, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut events = Vec::new();
        let mut countries = Vec::new();
        let mut id = 0u64;
        for country in ["US", "UK", "CA", "DE"] {
            for (group, page, rate) in [
                (Group::Control, LandingPage::OldPage, control_rate_pct),
                (Group::Treatment, LandingPage::NewPage, treatment_rate_pct),
            ] {
                for i in 0..600u64 {
                    id += 1;
                    let converted = i % 100 < rate;
                    events.push(RawEvent::new(id.to_string(), ts, group, page, converted));
                    countries.push(RawCountry::new(id.to_string(), country));
                }
            }
        }
        (events, countries)
    }

    #[test]
    fn test_pipeline_ships_clear_winner() {
        let (events, countries) = tables(10, 16);
        let report = analyze(&events, &countries, &AnalysisConfig::default()).unwrap();

        assert_eq!(report.sample_size, 4_800);
        assert_eq!(report.control.n + report.treatment.n, report.sample_size as u64);
        assert!(report.srm.passed);
        assert!(report.test.reject_null);
        assert_eq!(report.decision.recommendation, Recommendation::Ship);
        assert_eq!(report.segments.n_segments, 4);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let (events, countries) = tables(12, 13);
        let config = AnalysisConfig::default();
        let first = analyze(&events, &countries, &config).unwrap();
        let second = analyze(&events, &countries, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (events, countries) = tables(12, 14);
        let sequential = AnalysisConfig::default();
        let parallel = AnalysisConfig {
            parallel: true,
            ..AnalysisConfig::default()
        };
        let a = analyze(&events, &countries, &sequential).unwrap();
        let b = analyze(&events, &countries, &parallel).unwrap();
        assert_eq!(a.test, b.test);
        assert_eq!(a.bayesian, b.bayesian);
        assert_eq!(a.segments, b.segments);
        assert_eq!(a.decision, b.decision);
    }

    #[test]
    fn test_invalid_config_fails_before_cleaning() {
        let config = AnalysisConfig {
            alpha: 0.0,
            ..AnalysisConfig::default()
        };
        let err = analyze(&[], &[], &config).unwrap_err();
        assert!(err.to_string().contains("alpha"));
    }

    #[test]
    fn test_fingerprint_changes_with_data() {
        let (events, countries) = tables(10, 12);
        let cleaner = DataCleaner::new(2);
        let a = cleaner.clean(&events, &countries).unwrap();
        let b = cleaner.clean(&events[1..], &countries).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 16);
    }

    #[test]
    fn test_degenerate_control_rate_still_decides() {
        let (events, countries) = tables(0, 8);
        let report = analyze(&events, &countries, &AnalysisConfig::default()).unwrap();
        assert!(report.power.result().is_none());
        assert_eq!(report.decision.recommendation, Recommendation::Ship);
    }
}
