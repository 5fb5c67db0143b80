use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::NaiveDate;
use stockcast_core::{DemandPoint, DemandSeries, ProductKey, ProviderName};
use stockcast_forecast::{
    ArimaProvider, BlendEngine, ForecastProvider, ForecastSet, GradientBoostedProvider,
    ProviderRegistry, SequenceProvider,
};

fn synthetic_series(len: usize) -> DemandSeries {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let points = (0..len)
        .map(|t| DemandPoint {
            date: start + chrono::Days::new(t as u64),
            quantity: 20.0 + 6.0 * ((t % 7) as f64) + ((t * 13) % 5) as f64,
        })
        .collect();
    DemandSeries::new("BENCH".parse().unwrap(), points).unwrap()
}

fn bench_blend(c: &mut Criterion) {
    let mut group = c.benchmark_group("blend");
    let key: ProductKey = "BENCH".parse().unwrap();
    let engine = BlendEngine::default();

    for horizon in [7usize, 28, 90].iter() {
        let set = ForecastSet::new(*horizon)
            .with_forecast(ProviderName::ARIMA, vec![10.0; *horizon])
            .with_forecast(ProviderName::LSTM, vec![12.0; *horizon])
            .with_forecast(ProviderName::XGB, vec![11.0; *horizon]);
        let actuals: Vec<f64> = (0..28).map(|t| 10.0 + (t % 3) as f64).collect();

        group.throughput(Throughput::Elements(*horizon as u64));
        group.bench_with_input(BenchmarkId::from_parameter(horizon), horizon, |b, _| {
            b.iter(|| {
                engine
                    .blend(black_box(&key), black_box(&set), black_box(&actuals), 28)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_providers(c: &mut Criterion) {
    let mut group = c.benchmark_group("provider_forecast");
    group.sample_size(20);
    let series = synthetic_series(180);

    let providers: Vec<Box<dyn ForecastProvider>> = vec![
        Box::new(ArimaProvider::default()),
        Box::new(SequenceProvider::default()),
        Box::new(GradientBoostedProvider::default()),
    ];
    for p in &providers {
        group.bench_function(p.name().as_str(), |b| {
            b.iter(|| p.forecast(black_box(&series), 14).unwrap());
        });
    }
    group.finish();
}

fn bench_registry_with_backtests(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_forecast");
    group.sample_size(10);
    let registry = ProviderRegistry::standard();

    for len in [60usize, 365].iter() {
        let series = synthetic_series(*len);
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| registry.forecast(black_box(&series), 14, 28));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_blend,
    bench_providers,
    bench_registry_with_backtests
);
criterion_main!(benches);
