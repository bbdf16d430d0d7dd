//! Property-based tests for the statistical engine
//!
//! Core properties covered:
//! 1. Cleaning yields one record per user and conserves group counts
//! 2. Z-test symmetry and CI / point-estimate consistency
//! 3. Power monotonicity in sample size
//! 4. Bonferroni and Holm corrections
//! 5. Posterior comparison bounds
//! 6. Delimited-text splitting never panics

use chrono::NaiveDate;
use proptest::prelude::*;
use veredicto::dataset::{split_record, DataCleaner, Group, LandingPage, RawCountry, RawEvent};
use veredicto::inference::{
    achieved_power, holm_adjusted, two_proportion_z_test, BetaPrior, GroupSummary,
    NormalApproximation, PosteriorComparator,
};

fn arm(group: Group, n: u64, conversions: u64) -> GroupSummary {
    GroupSummary::new(group, n, conversions).unwrap()
}

/// (n, conversions) with conversions <= n
fn arm_counts() -> impl Strategy<Value = (u64, u64)> {
    (1u64..5_000).prop_flat_map(|n| (Just(n), 0..=n))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_cleaned_sample_one_record_per_user(
        rows in prop::collection::vec((0u32..60, any::<bool>(), 0u32..5_000, any::<bool>()), 2..300)
    ) {
        let day = NaiveDate::from_ymd_opt(2017, 1, 2).unwrap();
        let events: Vec<RawEvent> = rows
            .iter()
            .map(|(user, treated, seconds, converted)| {
                let ts = day.and_hms_opt(0, 0, 0).unwrap() + chrono::Duration::seconds(i64::from(*seconds));
                let (group, page) = if *treated {
                    (Group::Treatment, LandingPage::NewPage)
                } else {
                    (Group::Control, LandingPage::OldPage)
                };
                RawEvent::new(user.to_string(), ts, group, page, *converted)
            })
            .collect();
        let countries: Vec<RawCountry> = (0u32..60)
            .map(|user| RawCountry::new(user.to_string(), if user % 2 == 0 { "US" } else { "CA" }))
            .collect();

        if let Ok(sample) = DataCleaner::new(2).clean(&events, &countries) {
            let mut ids: Vec<&str> = sample.records().iter().map(|r| r.user_id.as_str()).collect();
            let total = ids.len();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), total);

            let (control, treatment) = sample.summaries();
            prop_assert_eq!(control.n + treatment.n, sample.len() as u64);
            prop_assert_eq!(
                sample.summary().clean_records + sample.summary().duplicates_removed,
                events.len()
            );
        }
    }

    #[test]
    fn prop_z_test_swapping_arms_negates(
        (n_c, x_c) in arm_counts(),
        (n_t, x_t) in arm_counts(),
    ) {
        let forward = two_proportion_z_test(
            &arm(Group::Control, n_c, x_c),
            &arm(Group::Treatment, n_t, x_t),
            0.05,
        ).unwrap();
        let swapped = two_proportion_z_test(
            &arm(Group::Control, n_t, x_t),
            &arm(Group::Treatment, n_c, x_c),
            0.05,
        ).unwrap();

        prop_assert!((forward.z_statistic + swapped.z_statistic).abs() < 1e-9);
        prop_assert!((forward.p_value - swapped.p_value).abs() < 1e-9);
        prop_assert!((forward.effect_size_h + swapped.effect_size_h).abs() < 1e-9);
    }

    #[test]
    fn prop_ci_contains_point_estimate(
        (n_c, x_c) in arm_counts(),
        (n_t, x_t) in arm_counts(),
        alpha in 0.001f64..0.2,
    ) {
        let result = two_proportion_z_test(
            &arm(Group::Control, n_c, x_c),
            &arm(Group::Treatment, n_t, x_t),
            alpha,
        ).unwrap();

        prop_assert!(result.ci_low <= result.absolute_lift + 1e-12);
        prop_assert!(result.absolute_lift <= result.ci_high + 1e-12);
        prop_assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn prop_power_grows_with_sample_size(
        baseline in 0.02f64..0.5,
        effect in 0.005f64..0.05,
        n in 100u64..50_000,
    ) {
        let small = achieved_power(baseline, effect, n, 0.05).unwrap();
        let large = achieved_power(baseline, effect, n * 2, 0.05).unwrap();
        prop_assert!(large >= small - 1e-12);
        prop_assert!((0.0..=1.0).contains(&small));
    }

    #[test]
    fn prop_holm_adjustment_bounds(p_values in prop::collection::vec(0.0f64..=1.0, 1..12)) {
        let adjusted = holm_adjusted(&p_values);
        let m = p_values.len() as f64;
        prop_assert_eq!(adjusted.len(), p_values.len());
        for (raw, adj) in p_values.iter().zip(&adjusted) {
            // At least the raw p, at most the Bonferroni-adjusted p
            prop_assert!(*adj >= *raw - 1e-12);
            prop_assert!(*adj <= (raw * m).min(1.0) + 1e-12);
        }
    }

    #[test]
    fn prop_posterior_probabilities_bounded(
        (n_c, x_c) in arm_counts(),
        (n_t, x_t) in arm_counts(),
    ) {
        let prior = BetaPrior::default();
        let control = prior.update(&arm(Group::Control, n_c, x_c));
        let treatment = prior.update(&arm(Group::Treatment, n_t, x_t));
        let comparison = NormalApproximation.compare(&control, &treatment).unwrap();

        prop_assert!((0.0..=1.0).contains(&comparison.p_treatment_better));
        prop_assert!(comparison.expected_loss_treatment >= 0.0);
        prop_assert!(comparison.expected_loss_control >= 0.0);
        prop_assert!(comparison.lift_ci_low <= comparison.lift_ci_high);
    }

    #[test]
    fn prop_split_record_never_panics(line in ".*", delimiter in prop::sample::select(vec![',', ';', '\t', '|'])) {
        if let Ok(fields) = split_record(&line, delimiter) {
            prop_assert!(!fields.is_empty());
        }
    }

    #[test]
    fn prop_split_record_plain_fields(fields in prop::collection::vec("[a-zA-Z0-9_ .-]{0,12}", 1..8)) {
        let line = fields.join(",");
        let parsed = split_record(&line, ',').unwrap();
        prop_assert_eq!(parsed, fields);
    }
}
