use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use urlindex_core::dictionary::build_full;
use urlindex_core::mphf::{build, resolve};

#[allow(non_snake_case)]
fn bench__resolve__hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/hit");
    for size in [100, 10_000, 1_000_000] {
        let domains = make_domains(size);
        let dict = build_full(domains.clone());
        let table = build(&dict);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &domains, |b, domains| {
            let mut i = 0usize;
            b.iter(|| {
                i = (i + 1) % domains.len();
                resolve(&table, &dict, &domains[i])
            });
        });
    }
    group.finish();
}

#[allow(non_snake_case)]
fn bench__resolve__miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/miss");
    for size in [100, 10_000, 1_000_000] {
        let domains = make_domains(size);
        let dict = build_full(domains);
        let table = build(&dict);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| resolve(&table, &dict, "definitely-not-present.example.net"));
        });
    }
    group.finish();
}

fn make_domains(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("domain-{i}.example.com")).collect()
}

criterion_group!(benches, bench__resolve__hit, bench__resolve__miss);
criterion_main!(benches);
