use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use regressor_selection::selection::{ModelTrainer, TrainerConfig};
use regressor_selection::training::{Estimator, Regressor};

fn create_regression_data(n_rows: usize, n_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // Target is the feature sum plus a little noise
    let y: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();

    concatenate(Axis(1), &[x.view(), y.insert_axis(Axis(1)).view()]).unwrap()
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_and_persist");
    group.sample_size(10);

    let dir = tempfile::TempDir::new().unwrap();
    for n_rows in [100, 300].iter() {
        let train = create_regression_data(*n_rows, 4, 1);
        let test = create_regression_data(*n_rows / 4, 4, 2);
        let trainer = ModelTrainer::new(
            TrainerConfig::new().with_artifact_dir(dir.path().join(n_rows.to_string())),
        );

        group.bench_with_input(
            BenchmarkId::new("default_catalog", n_rows),
            &(train, test),
            |b, (train, test)| {
                b.iter(|| trainer.select_and_persist(black_box(train), black_box(test)).unwrap())
            },
        );
    }

    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    let data = create_regression_data(1000, 8, 3);
    let x = data.slice(ndarray::s![.., ..8]).to_owned();
    let y = data.column(8).to_owned();

    for family in ["DecisionTree", "RandomForest", "GradientBoost", "XGBoost", "CatBoost"] {
        group.bench_with_input(BenchmarkId::new(family, 1000), &family, |b, family| {
            b.iter(|| {
                let mut model = Estimator::from_family(family).unwrap();
                model.fit(black_box(&x), black_box(&y)).unwrap();
                model
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_selection, bench_fit);
criterion_main!(benches);
