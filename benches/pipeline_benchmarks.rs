//! Benchmarks for the per-frame pipeline and the calibration fit

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gaze_cursor::{
    calibration::Calibrator,
    gaze_estimation::{GazeEstimator, GazeFeatureVector},
    geometry::ScreenPoint,
    landmarks::synthetic::SyntheticFace,
    smoothing::Smoother,
};

const TARGET_GAZE: [(f64, f64); 5] = [(0.0, 0.0), (-0.6, -0.48), (0.6, -0.48), (-0.6, 0.48), (0.6, 0.48)];

fn benchmark_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaze_estimation");
    let estimator = GazeEstimator::default();

    for (name, face) in [
        ("frontal", SyntheticFace::default()),
        ("turned", SyntheticFace::default().with_head_pose(0.15, -0.05).with_roll(0.2)),
    ] {
        let landmarks = face.with_gaze(0.3, -0.2).build();
        group.bench_with_input(BenchmarkId::new("estimate", name), &landmarks, |b, landmarks| {
            b.iter(|| black_box(estimator.estimate(black_box(landmarks))));
        });
    }

    group.finish();
}

fn benchmark_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");
    let calibrator = Calibrator::default();

    // Fixation noise as seen from a real detector
    let gaze: Vec<GazeFeatureVector> = TARGET_GAZE
        .iter()
        .map(|&(x, y)| {
            GazeFeatureVector::new(
                x + 0.01 * (rand::random::<f64>() - 0.5),
                y + 0.01 * (rand::random::<f64>() - 0.5),
            )
        })
        .collect();

    let mut session = calibrator.start_calibration(1920, 1080);
    for (index, vector) in gaze.iter().enumerate() {
        calibrator
            .add_sample_at(&mut session, index, *vector)
            .expect("valid sample");
    }

    group.bench_function("fit", |b| {
        b.iter(|| black_box(calibrator.finish(black_box(&session))));
    });

    let model = calibrator.finish(&session).expect("well-conditioned fit");
    let gaze = GazeFeatureVector::new(0.21, -0.13);
    group.bench_function("apply", |b| {
        b.iter(|| black_box(model.apply(black_box(&gaze))));
    });

    group.finish();
}

fn benchmark_smoother(c: &mut Criterion) {
    let mut group = c.benchmark_group("smoothing");

    let raw: Vec<ScreenPoint> = (0..300)
        .map(|i| {
            let t = f64::from(i) * 0.05;
            ScreenPoint::new(
                960.0 + 400.0 * t.sin() + 8.0 * rand::random::<f64>(),
                540.0 + 250.0 * t.cos() + 8.0 * rand::random::<f64>(),
            )
        })
        .collect();

    group.bench_function("single_frame", |b| {
        let mut smoother = Smoother::default();
        smoother.set_bounds(1920, 1080);
        let mut timestamp = 0.0;
        b.iter(|| {
            timestamp += 1.0 / 30.0;
            black_box(smoother.filter(black_box(raw[0]), timestamp))
        });
    });

    group.bench_function("sequence_300", |b| {
        b.iter(|| {
            let mut smoother = Smoother::default();
            smoother.set_bounds(1920, 1080);
            for (i, point) in raw.iter().enumerate() {
                black_box(smoother.filter(*point, i as f64 / 30.0));
            }
        });
    });

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let estimator = GazeEstimator::default();
    let calibrator = Calibrator::default();
    let mut session = calibrator.start_calibration(1920, 1080);
    for (index, &(x, y)) in TARGET_GAZE.iter().enumerate() {
        calibrator
            .add_sample_at(&mut session, index, GazeFeatureVector::new(x, y))
            .expect("valid sample");
    }
    let model = calibrator.finish(&session).expect("well-conditioned fit");
    let landmarks = SyntheticFace::default().with_gaze(0.2, 0.1).build();

    c.bench_function("landmarks_to_command", |b| {
        let mut smoother = Smoother::default();
        smoother.set_bounds(1920, 1080);
        let mut timestamp = 0.0;
        b.iter(|| {
            timestamp += 1.0 / 30.0;
            if let gaze_cursor::gaze_estimation::GazeEstimate::Gaze(gaze) = estimator.estimate(black_box(&landmarks)) {
                black_box(smoother.filter(model.apply(&gaze), timestamp));
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_estimator,
    benchmark_calibration,
    benchmark_smoother,
    benchmark_pipeline
);
criterion_main!(benches);
