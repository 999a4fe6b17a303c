use std::hint::black_box;
use std::io::Cursor;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ndstat::parallel::{Batch, PartialAggregate};
use ndstat::parsers::{JsonlParser, RecordParser};
use ndstat::{CancelToken, ParallelConfig, ParallelProcessor};

const RECORDS: usize = 50_000;

fn sample_input(n: usize) -> Vec<u8> {
    let mut out = String::with_capacity(n * 64);
    for i in 0..n {
        let auth = if i % 3 == 0 { "Logged Out" } else { "Logged In" };
        out.push_str(&format!(
            "{{\"auth\":\"{}\",\"length\":{}.5,\"song\":\"track-{}\"}}\n",
            auth,
            i % 400,
            i
        ));
    }
    out.into_bytes()
}

fn bench_parse_line(c: &mut Criterion) {
    let parser = JsonlParser::new();
    let line = r#"{"auth":"Logged In","length":231.5,"song":"Intro","level":"paid"}"#;
    c.bench_function("parse_line", |b| {
        b.iter(|| {
            black_box(parser.parse(black_box(line)).ok());
        });
    });
}

fn bench_fold_batch(c: &mut Criterion) {
    let parser = JsonlParser::new();
    let input = sample_input(10_000);
    let records = String::from_utf8_lossy(&input)
        .lines()
        .filter_map(|line| parser.parse(line).ok())
        .collect();
    let batch = Batch {
        id: 0,
        start_line: 1,
        records,
    };

    let mut group = c.benchmark_group("fold_batch");
    group.throughput(Throughput::Elements(batch.len() as u64));
    group.bench_function("10k", |b| {
        b.iter(|| black_box(PartialAggregate::from_batch(black_box(&batch))));
    });
    group.finish();
}

fn bench_pipeline_workers(c: &mut Criterion) {
    let input = sample_input(RECORDS);
    let mut group = c.benchmark_group("pipeline_workers");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.sample_size(20);

    for workers in [1usize, 2, 4, 8] {
        let processor = ParallelProcessor::new(ParallelConfig {
            num_workers: workers,
            batch_size: 1_000,
            ..Default::default()
        });
        group.bench_with_input(BenchmarkId::from_parameter(workers), &input, |b, input| {
            b.iter(|| {
                let outcome = processor
                    .run_reader(Cursor::new(input.clone()), &CancelToken::new())
                    .unwrap();
                black_box(outcome.snapshot)
            });
        });
    }
    group.finish();
}

fn bench_pipeline_batch_size(c: &mut Criterion) {
    let input = sample_input(RECORDS);
    let mut group = c.benchmark_group("pipeline_batch_size");
    group.throughput(Throughput::Elements(RECORDS as u64));
    group.sample_size(20);

    for batch_size in [10usize, 100, 1_000, 10_000] {
        let processor = ParallelProcessor::new(ParallelConfig {
            num_workers: 4,
            batch_size,
            ..Default::default()
        });
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &input, |b, input| {
            b.iter(|| {
                let outcome = processor
                    .run_reader(Cursor::new(input.clone()), &CancelToken::new())
                    .unwrap();
                black_box(outcome.snapshot)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_line,
    bench_fold_batch,
    bench_pipeline_workers,
    bench_pipeline_batch_size
);
criterion_main!(benches);
