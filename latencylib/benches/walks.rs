use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use latencylib::buffer::BufferKind;
use latencylib::measurer::walk;
use latencylib::pattern::AccessPattern;
use latencylib::sweep::{element_count, generate_sizes};

/// One walk per layout, at sizes inside and outside the usual cache levels
pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Walks");

    for size in generate_sizes(16 * 1024, 16 * 1024 * 1024).into_iter().step_by(4) {
        let count = element_count(size).unwrap();
        let pattern = AccessPattern::from_stride_bytes(64, count);
        for kind in BufferKind::ALL {
            let buffer = kind.build(count).unwrap();
            group.bench_with_input(BenchmarkId::new(kind.name(), size), &buffer, |bench, buffer| {
                bench.iter(|| walk(buffer, &pattern));
            });
        }
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = criterion_benchmark
);
criterion_main!(benches);
