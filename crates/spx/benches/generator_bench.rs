//! 🏎️ How fast can we make things up? Generators and document serialization,
//! the two hot loops that run once per sample, 23 billion times.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use spx::common::{BulkOperation, Sample};
use spx::generators::{GeneratorKind, GeneratorSpec, ValueGenerator};

fn bench_value_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_generator_sample");
    let kinds = [
        GeneratorKind::Unique,
        GeneratorKind::Low,
        GeneratorKind::Medium,
        GeneratorKind::High,
        GeneratorKind::Point,
    ];

    for kind in kinds {
        let spec = GeneratorSpec {
            kind,
            string_length: 64,
            pool_limit: kind.pool_limit(&[20, 100, 1000]),
        };
        group.bench_with_input(BenchmarkId::from_parameter(format!("{kind:?}")), &spec, |b, spec| {
            let mut rng = StdRng::seed_from_u64(42);
            let mut generator = ValueGenerator::new(*spec);
            b.iter(|| black_box(generator.sample(&mut rng)));
        });
    }

    group.finish();
}

fn bench_bulk_operation(c: &mut Criterion) {
    let sample = Sample::new("qzabcd-1234", 1, "wxyz-9876", "v".repeat(128));
    c.bench_function("bulk_operation_from_sample", |b| {
        b.iter(|| BulkOperation::from_sample(black_box(&sample)))
    });
}

criterion_group!(benches, bench_value_generators, bench_bulk_operation);
criterion_main!(benches);
