/// Posterior comparison and full-pipeline benchmarks
///
/// Measures the Monte Carlo comparator against the closed-form
/// approximation, and one end-to-end analysis run.
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use veredicto::config::AnalysisConfig;
use veredicto::dataset::{Group, LandingPage, RawCountry, RawEvent};
use veredicto::inference::{
    sample_comparison, BetaPrior, GroupSummary, MonteCarloComparator, NormalApproximation,
    PosteriorComparator,
};
use veredicto::pipeline::analyze;

fn posteriors() -> (veredicto::inference::BetaPosterior, veredicto::inference::BetaPosterior) {
    let prior = BetaPrior::default();
    let control = GroupSummary::new(Group::Control, 145_000, 17_458).unwrap();
    let treatment = GroupSummary::new(Group::Treatment, 145_000, 17_226).unwrap();
    (prior.update(&control), prior.update(&treatment))
}

fn bench_monte_carlo(c: &mut Criterion) {
    let (control, treatment) = posteriors();
    let mut group = c.benchmark_group("monte_carlo_comparator");

    for samples in [1_000usize, 10_000, 100_000] {
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &samples, |b, &samples| {
            let comparator = MonteCarloComparator::new(samples, 42).unwrap();
            b.iter(|| comparator.compare(black_box(&control), black_box(&treatment)))
        });
    }

    group.finish();
}

fn bench_sampling_stream(c: &mut Criterion) {
    let (control, treatment) = posteriors();
    c.bench_function("sample_comparison_10k_shared_rng", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        b.iter(|| sample_comparison(&mut rng, black_box(&control), black_box(&treatment), 10_000))
    });
}

fn bench_normal_approximation(c: &mut Criterion) {
    let (control, treatment) = posteriors();
    c.bench_function("normal_approximation", |b| {
        b.iter(|| NormalApproximation.compare(black_box(&control), black_box(&treatment)))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let ts = NaiveDate::from_ymd_opt(2017, 1, 9)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let mut events = Vec::new();
    let mut countries = Vec::new();
    for i in 0..20_000u32 {
        let (group, page) = if i % 2 == 0 {
            (Group::Control, LandingPage::OldPage)
        } else {
            (Group::Treatment, LandingPage::NewPage)
        };
        events.push(RawEvent::new(i.to_string(), ts, group, page, i % 9 == 0));
        countries.push(RawCountry::new(i.to_string(), ["US", "UK", "CA"][(i % 3) as usize]));
    }

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    for parallel in [false, true] {
        let config = AnalysisConfig {
            bayesian_sample_count: 20_000,
            parallel,
            ..AnalysisConfig::default()
        };
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(label, |b| {
            b.iter(|| analyze(black_box(&events), black_box(&countries), &config))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_monte_carlo,
    bench_sampling_stream,
    bench_normal_approximation,
    bench_pipeline
);
criterion_main!(benches);
