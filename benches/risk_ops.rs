//! Benchmarks for risk-engine operations.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use furha::config::{ForestConfig, RiskRules};
use furha::risk::encoder::LabelEncoder;
use furha::risk::forest::{RandomForest, Sample};
use furha::risk::{labels, FeatureVector};
use furha::synth::synthetic_cohort;

fn cohort_features(n: usize) -> Vec<FeatureVector> {
    let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    synthetic_cohort(n, 0, today)
        .iter()
        .map(FeatureVector::from_mother)
        .collect()
}

fn training_data(n: usize) -> (Vec<Sample>, Vec<usize>, usize) {
    let features = cohort_features(n);
    let levels = labels::label_batch(&features, &RiskRules::default());
    let encoder = LabelEncoder::fit(&levels);
    let y = encoder.encode_all(&levels).unwrap();
    let x = features.iter().map(FeatureVector::as_array).collect();
    (x, y, encoder.len())
}

fn bench_label_batch(c: &mut Criterion) {
    let features = cohort_features(10_000);
    let rules = RiskRules::default();

    c.bench_function("label_batch_10k", |bench| {
        bench.iter(|| black_box(labels::label_batch(&features, &rules)))
    });
}

fn bench_fit(c: &mut Criterion) {
    let (x, y, n_classes) = training_data(1_000);
    let config = ForestConfig::default();

    c.bench_function("forest_fit_1k_100_trees", |bench| {
        bench.iter(|| black_box(RandomForest::fit(&x, &y, n_classes, &config).unwrap()))
    });
}

fn bench_predict(c: &mut Criterion) {
    let (x, y, n_classes) = training_data(1_000);
    let forest = RandomForest::fit(&x, &y, n_classes, &ForestConfig::default()).unwrap();

    c.bench_function("forest_predict_single", |bench| {
        bench.iter(|| black_box(forest.predict(&x[0])))
    });
    c.bench_function("forest_predict_batch_1k", |bench| {
        bench.iter(|| black_box(forest.predict_batch(&x)))
    });
}

criterion_group!(benches, bench_label_batch, bench_fit, bench_predict);
criterion_main!(benches);
